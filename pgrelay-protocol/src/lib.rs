//! # pgrelay-protocol
//!
//! FE/BE wire framing for pgrelay.
//!
//! This crate provides:
//! - Startup and regular message layouts with self-inclusive big-endian lengths
//! - Async receive functions that read exactly one message off a stream
//! - The SSL-request pseudo-message and its single-byte response codes

pub mod codec;
pub mod error;
pub mod frame;

pub use codec::{receive, receive_startup, send};
pub use error::ProtocolError;
pub use frame::{
    ssl_request, Message, MessageKind, REGULAR_HEADER_SIZE, SSL_REQUEST_SIZE, STARTUP_HEADER_SIZE,
};

/// Code carried by the SSL-request startup message (1234 << 16 | 5679).
pub const SSL_REQUEST_CODE: u32 = 80877103;

/// Backend response byte accepting an SSL request.
pub const SSL_ALLOWED: u8 = b'S';

/// Backend response byte declining an SSL request.
pub const SSL_DENIED: u8 = b'N';

/// Default backend port.
pub const DEFAULT_PORT: u16 = 5432;

/// Largest declared message length accepted by the framer (1 GiB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024 * 1024;
