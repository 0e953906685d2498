//! Protocol error types.

use thiserror::Error;

/// Errors raised while reading or writing FE/BE messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Transport-level failure (reset, refused, broken pipe).
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream closed before the declared number of bytes arrived.
    #[error("incomplete read: got {read} of {expected} bytes")]
    IncompleteRead { read: usize, expected: usize },

    /// A transport failure interrupted a sized read after `read` bytes.
    #[error("read failed after {read} of {expected} bytes: {source}")]
    ReadFailed {
        read: usize,
        expected: usize,
        #[source]
        source: std::io::Error,
    },

    /// The declared length exceeds what a backend will ever send.
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: u32, max: u32 },
}

impl ProtocolError {
    /// Returns the number of bytes delivered before a failed sized read, if any.
    pub fn partial_read(&self) -> Option<usize> {
        match self {
            ProtocolError::IncompleteRead { read, .. } | ProtocolError::ReadFailed { read, .. } => {
                Some(*read)
            }
            _ => None,
        }
    }

    /// Returns whether the peer went away mid-message.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ProtocolError::IncompleteRead { .. } => true,
            ProtocolError::Io(e) | ProtocolError::ReadFailed { source: e, .. } => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            ProtocolError::MessageTooLarge { .. } => false,
        }
    }
}
