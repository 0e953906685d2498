//! Reading and writing whole messages on a byte stream.
//!
//! Each receive performs two sized reads: one for the fixed header, one for
//! the payload the header declares. Nothing past the end of the message is
//! consumed, so the next receive starts exactly on the following boundary.

use crate::error::ProtocolError;
use crate::frame::{self, Message, MessageKind, LENGTH_SIZE, REGULAR_HEADER_SIZE};
use crate::MAX_MESSAGE_SIZE;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads one startup message (no type byte).
pub async fn receive_startup<R>(stream: &mut R) -> Result<Message, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_message(stream, MessageKind::Startup).await
}

/// Reads one regular message (type byte + length).
pub async fn receive<R>(stream: &mut R) -> Result<Message, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_message(stream, MessageKind::Regular).await
}

/// Writes an encoded message and flushes the stream.
pub async fn send<W>(stream: &mut W, message: &[u8]) -> Result<usize, ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    stream.write_all(message).await?;
    stream.flush().await?;
    Ok(message.len())
}

async fn read_message<R>(stream: &mut R, kind: MessageKind) -> Result<Message, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let header_size = kind.header_size();
    let mut header = [0u8; REGULAR_HEADER_SIZE];
    read_full(stream, &mut header[..header_size]).await?;

    let at = header_size - LENGTH_SIZE;
    let declared = u32::from_be_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]]);
    if declared > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: declared,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let payload_len = frame::payload_len(declared);
    let mut buf = BytesMut::with_capacity(header_size + payload_len);
    buf.put_slice(&header[..header_size]);
    buf.resize(header_size + payload_len, 0);
    read_full(stream, &mut buf[header_size..]).await?;

    tracing::trace!(?kind, declared, total = buf.len(), "received message");
    Ok(Message::from_parts(kind, buf.freeze()))
}

/// Fills `buf` completely, reporting how far it got if the stream ends first.
async fn read_full<R>(stream: &mut R, buf: &mut [u8]) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let expected = buf.len();
    let mut read = 0;

    while read < expected {
        match stream.read(&mut buf[read..]).await {
            Ok(0) => return Err(ProtocolError::IncompleteRead { read, expected }),
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(read, expected, "read failed: {}", e);
                return Err(ProtocolError::ReadFailed {
                    read,
                    expected,
                    source: e,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ssl_request, STARTUP_HEADER_SIZE};
    use crate::SSL_REQUEST_CODE;
    use proptest::prelude::*;
    use std::io;

    #[tokio::test]
    async fn test_receive_regular() {
        let wire = Message::regular(b'Z', b"I").unwrap();
        let mut stream: &[u8] = wire.as_bytes();

        let msg = receive(&mut stream).await.unwrap();
        assert_eq!(msg.tag(), Some(b'Z'));
        assert_eq!(msg.declared_len(), 5);
        assert_eq!(msg.len(), 6);
        assert_eq!(msg.payload(), b"I");
        assert!(stream.is_empty());
    }

    #[tokio::test]
    async fn test_receive_startup() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&196608u32.to_be_bytes());
        payload.extend_from_slice(b"user\0alice\0\0");
        let wire = Message::startup(&payload).unwrap();
        let mut stream: &[u8] = wire.as_bytes();

        let msg = receive_startup(&mut stream).await.unwrap();
        assert_eq!(msg.kind(), MessageKind::Startup);
        assert_eq!(msg.len(), msg.declared_len() as usize);
        assert_eq!(msg.payload(), &payload[..]);
    }

    #[tokio::test]
    async fn test_ssl_request_parses_as_startup() {
        let request = ssl_request();
        let mut stream: &[u8] = &request;

        let msg = receive_startup(&mut stream).await.unwrap();
        assert_eq!(msg.len(), 8);
        assert_eq!(msg.payload(), &SSL_REQUEST_CODE.to_be_bytes());
    }

    #[tokio::test]
    async fn test_back_to_back_messages() {
        let first = Message::regular(b'C', b"SELECT 1\0").unwrap();
        let second = Message::regular(b'Z', b"I").unwrap();
        let mut wire = first.as_bytes().to_vec();
        wire.extend_from_slice(second.as_bytes());
        let mut stream: &[u8] = &wire;

        assert_eq!(receive(&mut stream).await.unwrap(), first);
        assert_eq!(receive(&mut stream).await.unwrap(), second);
        assert!(stream.is_empty());
    }

    #[tokio::test]
    async fn test_zero_length_payload() {
        let mut stream: &[u8] = &[b'1', 0, 0, 0, 4];
        let msg = receive(&mut stream).await.unwrap();
        assert_eq!(msg.len(), REGULAR_HEADER_SIZE);
        assert!(msg.payload().is_empty());

        let mut stream: &[u8] = &[0, 0, 0, 4];
        let msg = receive_startup(&mut stream).await.unwrap();
        assert_eq!(msg.len(), STARTUP_HEADER_SIZE);
        assert!(msg.payload().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_length_reads_no_payload() {
        // Declared length 2 is below the size of the length field.
        let mut stream: &[u8] = &[b'X', 0, 0, 0, 2, 0xAA];
        let msg = receive(&mut stream).await.unwrap();
        assert_eq!(msg.len(), REGULAR_HEADER_SIZE);
        assert!(msg.payload().is_empty());
        assert_eq!(stream, &[0xAAu8][..]);

        let mut stream: &[u8] = &[0, 0, 0, 0];
        let msg = receive_startup(&mut stream).await.unwrap();
        assert_eq!(msg.len(), STARTUP_HEADER_SIZE);
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let mut stream: &[u8] = &[b'D', 0, 0, 0, 14, 1, 2, 3];
        let err = receive(&mut stream).await.unwrap_err();
        match err {
            ProtocolError::IncompleteRead { read, expected } => {
                assert_eq!(read, 3);
                assert_eq!(expected, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_header_only_then_eof() {
        let mut stream: &[u8] = &[b'D', 0, 0, 0, 14];
        let err = receive(&mut stream).await.unwrap_err();
        match err {
            ProtocolError::IncompleteRead { read, expected } => {
                assert_eq!(read, 0);
                assert_eq!(expected, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_truncated_header() {
        let mut stream: &[u8] = &[0, 0];
        let err = receive_startup(&mut stream).await.unwrap_err();
        assert_eq!(err.partial_read(), Some(2));

        let mut stream: &[u8] = &[];
        let err = receive(&mut stream).await.unwrap_err();
        assert_eq!(err.partial_read(), Some(0));
    }

    #[tokio::test]
    async fn test_payload_split_across_reads() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[b'T', 0, 0, 0, 10])
            .read(&[1, 2])
            .read(&[3, 4, 5])
            .read(&[6])
            .build();

        let msg = receive(&mut stream).await.unwrap();
        assert_eq!(msg.payload(), &[1u8, 2, 3, 4, 5, 6][..]);
    }

    #[tokio::test]
    async fn test_io_error_reports_partial_payload() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[b'T', 0, 0, 0, 10])
            .read(&[1, 2, 3])
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let err = receive(&mut stream).await.unwrap_err();
        match err {
            ProtocolError::ReadFailed {
                read,
                expected,
                ref source,
            } => {
                assert_eq!(read, 3);
                assert_eq!(expected, 6);
                assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
            }
            ref other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.partial_read(), Some(3));
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn test_io_error_in_header() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0, 0])
            .read_error(io::Error::new(io::ErrorKind::ConnectionAborted, "aborted"))
            .build();

        let err = receive_startup(&mut stream).await.unwrap_err();
        assert_eq!(err.partial_read(), Some(2));
    }

    #[tokio::test]
    async fn test_declared_length_too_large() {
        let mut stream: &[u8] = &[b'D', 0xFF, 0xFF, 0xFF, 0xFF];
        let err = receive(&mut stream).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MessageTooLarge { size: u32::MAX, .. }
        ));
    }

    #[tokio::test]
    async fn test_send_writes_whole_message() {
        let msg = Message::regular(b'X', &[]).unwrap();
        let mut stream = tokio_test::io::Builder::new()
            .write(&[b'X', 0, 0, 0, 4])
            .build();

        let n = send(&mut stream, msg.as_bytes()).await.unwrap();
        assert_eq!(n, 5);
    }

    #[tokio::test]
    async fn test_send_then_receive_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let msg = Message::regular(b'Q', b"select now()\0").unwrap();

        send(&mut client, msg.as_bytes()).await.unwrap();
        let received = receive(&mut server).await.unwrap();
        assert_eq!(received, msg);
    }

    proptest! {
        #[test]
        fn prop_regular_lengths(tag in any::<u8>(), payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let wire = Message::regular(tag, &payload).unwrap();
            let mut stream: &[u8] = wire.as_bytes();
            let msg = tokio_test::block_on(receive(&mut stream)).unwrap();

            let declared = msg.declared_len() as usize;
            prop_assert_eq!(msg.payload().len(), declared - 4);
            prop_assert_eq!(msg.len(), 5 + (declared - 4));
            prop_assert_eq!(msg.tag(), Some(tag));
        }

        #[test]
        fn prop_startup_lengths(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let wire = Message::startup(&payload).unwrap();
            let mut stream: &[u8] = wire.as_bytes();
            let msg = tokio_test::block_on(receive_startup(&mut stream)).unwrap();

            prop_assert_eq!(msg.len(), msg.declared_len() as usize);
            prop_assert_eq!(msg.payload(), &payload[..]);
        }

        #[test]
        fn prop_short_lengths_never_underflow(declared in 0u32..4) {
            let mut wire = vec![b'E'];
            wire.extend_from_slice(&declared.to_be_bytes());
            let mut stream: &[u8] = &wire;
            let msg = tokio_test::block_on(receive(&mut stream)).unwrap();

            prop_assert_eq!(msg.len(), REGULAR_HEADER_SIZE);
        }
    }
}
