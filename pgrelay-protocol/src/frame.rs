//! FE/BE message layouts.
//!
//! ```text
//! startup:  +-----------+-------------------------+
//!           | length    | payload                 |
//!           | 4 bytes   | length - 4 bytes        |
//!           +-----------+-------------------------+
//!
//! regular:  +--------+-----------+-------------------------+
//!           | type   | length    | payload                 |
//!           | 1 byte | 4 bytes   | length - 4 bytes        |
//!           +--------+-----------+-------------------------+
//! ```
//!
//! `length` is big-endian and counts its own four bytes but never the type byte.

use crate::error::ProtocolError;
use crate::{MAX_MESSAGE_SIZE, SSL_REQUEST_CODE};
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the length field.
pub const LENGTH_SIZE: usize = 4;

/// Header size of a startup message (length only).
pub const STARTUP_HEADER_SIZE: usize = LENGTH_SIZE;

/// Header size of a regular message (type byte + length).
pub const REGULAR_HEADER_SIZE: usize = 1 + LENGTH_SIZE;

/// Total size of the SSL-request message.
pub const SSL_REQUEST_SIZE: usize = 8;

/// Which header layout a message uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// No type byte; first message on a connection and the SSL request.
    Startup,
    /// Type byte followed by the length; all other traffic.
    Regular,
}

impl MessageKind {
    pub fn header_size(&self) -> usize {
        match self {
            MessageKind::Startup => STARTUP_HEADER_SIZE,
            MessageKind::Regular => REGULAR_HEADER_SIZE,
        }
    }
}

/// One complete FE/BE message, header included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    data: Bytes,
}

impl Message {
    /// Wraps bytes already known to hold a full header for `kind`.
    pub(crate) fn from_parts(kind: MessageKind, data: Bytes) -> Self {
        debug_assert!(data.len() >= kind.header_size());
        Self { kind, data }
    }

    /// Encodes a startup message around `payload`.
    pub fn startup(payload: &[u8]) -> Result<Self, ProtocolError> {
        let length = encoded_length(payload.len())?;
        let mut buf = BytesMut::with_capacity(STARTUP_HEADER_SIZE + payload.len());
        buf.put_u32(length);
        buf.put_slice(payload);
        Ok(Self::from_parts(MessageKind::Startup, buf.freeze()))
    }

    /// Encodes a regular message with type byte `tag` around `payload`.
    pub fn regular(tag: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        let length = encoded_length(payload.len())?;
        let mut buf = BytesMut::with_capacity(REGULAR_HEADER_SIZE + payload.len());
        buf.put_u8(tag);
        buf.put_u32(length);
        buf.put_slice(payload);
        Ok(Self::from_parts(MessageKind::Regular, buf.freeze()))
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns the type byte of a regular message.
    pub fn tag(&self) -> Option<u8> {
        match self.kind {
            MessageKind::Startup => None,
            MessageKind::Regular => Some(self.data[0]),
        }
    }

    /// Returns the value of the length field as it appeared on the wire.
    pub fn declared_len(&self) -> u32 {
        let at = self.kind.header_size() - LENGTH_SIZE;
        u32::from_be_bytes([
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ])
    }

    /// Total number of bytes, header included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: every message carries its header.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[self.kind.header_size()..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Number of payload bytes that follow a header declaring `declared`.
///
/// Lengths below the size of the length field itself yield zero.
pub fn payload_len(declared: u32) -> usize {
    declared.saturating_sub(LENGTH_SIZE as u32) as usize
}

/// Encodes the SSL-request pseudo-message: length 8 followed by the request code.
pub fn ssl_request() -> Bytes {
    let mut buf = BytesMut::with_capacity(SSL_REQUEST_SIZE);
    buf.put_u32(SSL_REQUEST_SIZE as u32);
    buf.put_u32(SSL_REQUEST_CODE);
    buf.freeze()
}

fn encoded_length(payload_len: usize) -> Result<u32, ProtocolError> {
    let total = payload_len.saturating_add(LENGTH_SIZE);
    match u32::try_from(total) {
        Ok(length) if length <= MAX_MESSAGE_SIZE => Ok(length),
        _ => Err(ProtocolError::MessageTooLarge {
            size: u32::try_from(total).unwrap_or(u32::MAX),
            max: MAX_MESSAGE_SIZE,
        }),
    }
}
