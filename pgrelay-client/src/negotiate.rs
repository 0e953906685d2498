//! SSL negotiation on a freshly dialed plaintext stream.
//!
//! The client sends the 8-byte SSL request before any other traffic and
//! reads the backend's reply. Only the first byte matters: `'S'` means the
//! backend will speak TLS on this socket, anything else means it will not.

use crate::error::ClientError;
use pgrelay_protocol::{ssl_request, SSL_ALLOWED};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on the reply read after the SSL request.
pub const SSL_RESPONSE_BUFFER_SIZE: usize = 4096;

/// Result of a completed negotiation.
#[derive(Debug)]
pub enum SslOutcome<S> {
    /// The backend accepted; the stream is handed back for the TLS handshake.
    Allowed(S),
    /// The backend declined; the stream has been shut down and dropped.
    Rejected,
}

impl<S> SslOutcome<S> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, SslOutcome::Allowed(_))
    }
}

/// Owns a plaintext stream until the backend has answered the SSL request.
///
/// [`negotiate`](SslNegotiator::negotiate) consumes the negotiator, so a
/// decision is reached at most once per stream.
pub struct SslNegotiator<S> {
    stream: S,
}

impl<S> SslNegotiator<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Sends the SSL request and decides on the backend's first reply byte.
    ///
    /// Write and read failures are returned as errors. A declined request is
    /// not an error here; the caller chooses the policy for it.
    pub async fn negotiate(mut self) -> Result<SslOutcome<S>, ClientError> {
        let request = ssl_request();
        tracing::debug!("Sending SSL request to backend ({} bytes)", request.len());

        if let Err(e) = pgrelay_protocol::send(&mut self.stream, &request).await {
            tracing::error!("Error sending SSL request to backend: {}", e);
            return Err(e.into());
        }

        let mut response = vec![0u8; SSL_RESPONSE_BUFFER_SIZE];
        let n = match self.stream.read(&mut response).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("Error receiving SSL response from backend: {}", e);
                return Err(ClientError::Connection(e));
            }
        };

        match response[..n].first() {
            Some(&SSL_ALLOWED) => {
                tracing::debug!("SSL connections are allowed by the backend");
                Ok(SslOutcome::Allowed(self.stream))
            }
            first => {
                tracing::error!(response = ?first, "The backend does not allow SSL connections");
                if let Err(e) = self.stream.shutdown().await {
                    tracing::debug!("Shutdown after SSL rejection failed: {}", e);
                }
                Ok(SslOutcome::Rejected)
            }
        }
    }
}
