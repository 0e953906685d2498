//! Backend connection configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via PGRELAY_CONFIG)
//! 3. Environment variables
//!
//! The result is turned into a [`ConnectionConfig`] once per connection
//! attempt; nothing below reads global state at connect time.

use crate::connection::{ConnectionConfig, TlsClientConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Proxy-side configuration for the backend connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend target.
    pub backend: BackendConfig,
    /// Credentials used towards the backend.
    pub credentials: CredentialsConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("PGRELAY_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::ParseError(_, msg) => ConfigError::ParseError(path.to_path_buf(), msg),
            other => other,
        })
    }

    /// Parses configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ParseError(PathBuf::from("<inline>"), e.to_string()))
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.backend.apply_env_overrides();
        self.credentials.ssl.apply_env_overrides();
    }

    /// Validates the combination of settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.addr.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.addr must not be empty".to_string(),
            ));
        }
        self.credentials.ssl.validate()
    }

    /// Resolves the settings for one connection attempt.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.backend.addr.clone())
            .with_connect_timeout(self.backend.connect_timeout())
            .with_require_ssl(self.credentials.ssl.enable)
            .with_tls(self.credentials.ssl.tls_client_config())
    }
}

/// Backend target configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend address as `host:port`.
    pub addr: String,
    /// Dial timeout in seconds (0 = no timeout).
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            addr: format!("127.0.0.1:{}", pgrelay_protocol::DEFAULT_PORT),
            connect_timeout_secs: 10,
        }
    }
}

impl BackendConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("PGRELAY_BACKEND_ADDR") {
            if !addr.is_empty() {
                self.addr = addr;
            }
        }

        if let Ok(timeout) = std::env::var("PGRELAY_CONNECT_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.connect_timeout_secs = secs;
            }
        }
    }

    /// Returns the dial timeout, if any.
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Credential settings towards the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub ssl: SslConfig,
}

/// SSL settings for the backend connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SslConfig {
    /// Send an SSL request and require the backend to accept it.
    pub enable: bool,
    /// Path to PEM-encoded CA certificate(s) for verifying the backend.
    pub ca_cert_path: Option<PathBuf>,
    /// Path to PEM-encoded client certificate (for mTLS).
    pub client_cert_path: Option<PathBuf>,
    /// Path to PEM-encoded client private key (for mTLS).
    pub client_key_path: Option<PathBuf>,
    /// Skip certificate verification (development only).
    pub insecure: bool,
    /// SNI override.
    pub server_name: Option<String>,
}

impl SslConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("PGRELAY_SSL_ENABLE") {
            self.enable = enabled == "1" || enabled.to_lowercase() == "true";
        }
        if let Ok(path) = std::env::var("PGRELAY_SSL_CA") {
            self.ca_cert_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("PGRELAY_SSL_CERT") {
            self.client_cert_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("PGRELAY_SSL_KEY") {
            self.client_key_path = Some(PathBuf::from(path));
        }
        if let Ok(insecure) = std::env::var("PGRELAY_SSL_INSECURE") {
            self.insecure = insecure == "1" || insecure.to_lowercase() == "true";
        }
        if let Ok(name) = std::env::var("PGRELAY_SSL_SERVER_NAME") {
            self.server_name = Some(name);
        }
    }

    /// Validates SSL configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enable {
            return Ok(());
        }

        match (&self.client_cert_path, &self.client_key_path) {
            (Some(_), None) => Err(ConfigError::ValidationError(
                "client_cert_path set but client_key_path not set".to_string(),
            )),
            (None, Some(_)) => Err(ConfigError::ValidationError(
                "client_key_path set but client_cert_path not set".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn tls_client_config(&self) -> TlsClientConfig {
        TlsClientConfig {
            ca_cert_path: self.ca_cert_path.clone(),
            client_cert_path: self.client_cert_path.clone(),
            client_key_path: self.client_key_path.clone(),
            insecure: self.insecure,
            server_name: self.server_name.clone(),
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    ParseError(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}
