//! # pgrelay-client
//!
//! Backend connector for pgrelay.
//!
//! This crate provides:
//! - TCP dial to a single backend target
//! - SSL-request negotiation on the plaintext stream
//! - In-place TLS upgrade through a pluggable [`StreamUpgrader`]
//! - YAML/env configuration for the backend and its TLS settings

pub mod config;
pub mod connection;
pub mod error;
pub mod negotiate;
pub mod stream;
pub mod tls;

pub use config::{Config, ConfigError};
pub use connection::{connect, ConnectionConfig, Connector, TlsClientConfig};
pub use error::ClientError;
pub use negotiate::{SslNegotiator, SslOutcome};
pub use stream::ClientStream;
pub use tls::{RustlsUpgrader, StreamUpgrader};
