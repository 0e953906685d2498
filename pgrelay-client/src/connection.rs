//! Backend connection establishment.

use crate::error::ClientError;
use crate::negotiate::{SslNegotiator, SslOutcome};
use crate::stream::ClientStream;
use crate::tls::{RustlsUpgrader, StreamUpgrader};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;

/// Default dial timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS settings used once the backend has accepted an SSL request.
#[derive(Debug, Clone, Default)]
pub struct TlsClientConfig {
    /// Path to PEM-encoded CA certificate(s) for server verification.
    /// If None, the webpki roots are used.
    pub ca_cert_path: Option<PathBuf>,
    /// Path to PEM-encoded client certificate (for mTLS).
    pub client_cert_path: Option<PathBuf>,
    /// Path to PEM-encoded client private key (for mTLS).
    pub client_key_path: Option<PathBuf>,
    /// Skip server certificate verification (INSECURE - development only).
    pub insecure: bool,
    /// Server name for SNI (defaults to the host part of the target).
    pub server_name: Option<String>,
}

impl TlsClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    pub fn with_client_cert(
        mut self,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        self.client_cert_path = Some(cert_path.into());
        self.client_key_path = Some(key_path.into());
        self
    }

    pub fn with_insecure(mut self) -> Self {
        self.insecure = true;
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }
}

/// Everything one connection attempt needs, resolved up front.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Backend target as `host:port`.
    pub addr: String,
    /// Bound on the TCP dial only. `None` waits as long as the OS does.
    pub connect_timeout: Option<Duration>,
    /// Send an SSL request and upgrade to TLS before returning.
    pub require_ssl: bool,
    pub tls: TlsClientConfig,
}

impl ConnectionConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            require_ssl: false,
            tls: TlsClientConfig::default(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_require_ssl(mut self, require: bool) -> Self {
        self.require_ssl = require;
        self
    }

    pub fn with_tls(mut self, tls_config: TlsClientConfig) -> Self {
        self.tls = tls_config;
        self
    }

    /// Host part of `addr`, used for SNI.
    pub fn host(&self) -> &str {
        host_of(&self.addr)
    }
}

/// Dials one backend and, when required, negotiates TLS on it.
///
/// A single attempt against a single target; retries belong to the caller.
pub struct Connector<U = RustlsUpgrader> {
    config: ConnectionConfig,
    upgrader: U,
}

impl Connector<RustlsUpgrader> {
    /// Creates a connector that upgrades with rustls using `config.tls`.
    pub fn new(config: ConnectionConfig) -> Self {
        let upgrader = RustlsUpgrader::new(config.tls.clone());
        Self { config, upgrader }
    }
}

impl<U: StreamUpgrader> Connector<U> {
    pub fn with_upgrader(config: ConnectionConfig, upgrader: U) -> Self {
        Self { config, upgrader }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Opens the connection.
    ///
    /// When SSL is required and the backend declines, the socket is closed and
    /// [`ClientError::NegotiationRejected`] is returned; there is no fallback
    /// to plaintext.
    pub async fn connect(&self) -> Result<ClientStream, ClientError> {
        let tcp_stream = self.dial().await?;

        if !self.config.require_ssl {
            return Ok(ClientStream::Plain { stream: tcp_stream });
        }

        tracing::info!("SSL connections are enabled");
        match SslNegotiator::new(tcp_stream).negotiate().await? {
            SslOutcome::Allowed(tcp_stream) => {
                tracing::debug!("Attempting to upgrade connection");
                let stream = self
                    .upgrader
                    .upgrade(self.config.host(), tcp_stream)
                    .await
                    .inspect_err(|e| tracing::error!("Connection upgrade failed: {}", e))?;
                tracing::debug!("Connection successfully upgraded");
                Ok(stream)
            }
            SslOutcome::Rejected => Err(ClientError::NegotiationRejected),
        }
    }

    async fn dial(&self) -> Result<TcpStream, ClientError> {
        let addr = self.config.addr.as_str();
        tracing::debug!("Connecting to {}...", addr);

        let connecting = TcpStream::connect(addr);
        let result = match self.config.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connecting)
                .await
                .map_err(|_| {
                    tracing::debug!("Connection timeout");
                    ClientError::Timeout
                })?,
            None => connecting.await,
        };

        let tcp_stream = result.map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Connection(e)
        })?;

        tcp_stream.set_nodelay(true).ok();
        tracing::debug!("TCP connected to {}", addr);
        Ok(tcp_stream)
    }
}

/// Connects with the rustls upgrader.
pub async fn connect(config: ConnectionConfig) -> Result<ClientStream, ClientError> {
    Connector::new(config).connect().await
}

/// Strips the port from `host:port`, and the brackets from `[v6]:port`.
fn host_of(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => addr,
    }
}
