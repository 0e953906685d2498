//! Client error types.

use pgrelay_protocol::ProtocolError;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Connection(#[source] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[source] ProtocolError),

    #[error("connect timeout")]
    Timeout,

    /// The backend answered the SSL request with something other than `'S'`.
    #[error("backend does not allow SSL connections")]
    NegotiationRejected,

    #[error("TLS upgrade failed: {0}")]
    UpgradeFailed(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
}

impl ClientError {
    /// Returns whether an external retry policy may try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Connection(_) => true,
            ClientError::Timeout => true,
            ClientError::Protocol(e) => e.is_disconnect(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Connection(e)
    }
}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Io(e) => ClientError::Connection(e),
            // Keep the partial count of interrupted reads visible.
            other => ClientError::Protocol(other),
        }
    }
}
