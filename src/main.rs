//! pgrelay - backend connection check
//!
//! Dials the configured backend once, negotiating SSL when enabled, and
//! reports whether the resulting stream is encrypted.

use pgrelay_client::{Config, Connector};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if PGRELAY_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };
    match std::env::var("PGRELAY_CONFIG") {
        Ok(path) => tracing::info!("Loaded config from {}", path),
        Err(_) => tracing::info!("Using default configuration"),
    }

    if let Err(e) = config.validate() {
        tracing::error!("Configuration error: {}", e);
        return Err(e.into());
    }

    let connection_config = config.connection_config();
    tracing::info!("Backend: {}", connection_config.addr);
    if connection_config.require_ssl {
        tracing::info!("  SSL: required");
        if connection_config.tls.insecure {
            tracing::warn!("  Certificate verification: disabled");
        }
    } else {
        tracing::info!("  SSL: disabled");
    }

    let connector = Connector::new(connection_config);
    let mut stream = match connector.connect().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("Failed to connect to backend: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!(
        "Connected to {} ({})",
        stream.peer_addr()?,
        if stream.is_tls() { "TLS" } else { "plaintext" }
    );

    stream.shutdown().await.ok();
    Ok(())
}
