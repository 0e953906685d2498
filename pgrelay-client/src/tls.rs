//! TLS stream upgrade.

use crate::connection::TlsClientConfig;
use crate::error::ClientError;
use crate::stream::ClientStream;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::RootCertStore;
use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// Performs the security handshake on a socket the backend agreed to encrypt.
pub trait StreamUpgrader {
    /// Consumes the plaintext socket and returns the upgraded stream.
    fn upgrade(
        &self,
        host: &str,
        stream: TcpStream,
    ) -> impl Future<Output = Result<ClientStream, ClientError>> + Send;
}

/// Upgrades backend sockets with rustls.
#[derive(Debug, Clone)]
pub struct RustlsUpgrader {
    config: TlsClientConfig,
}

impl RustlsUpgrader {
    pub fn new(config: TlsClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TlsClientConfig {
        &self.config
    }
}

impl StreamUpgrader for RustlsUpgrader {
    async fn upgrade(&self, host: &str, stream: TcpStream) -> Result<ClientStream, ClientError> {
        let (connector, server_name) = if self.config.insecure {
            tracing::warn!("Using insecure TLS (certificate verification disabled)");
            create_insecure_tls_connector(&self.config, host)?
        } else {
            create_tls_connector(&self.config, host)?
        };

        tracing::debug!("Performing TLS handshake...");
        let tls_stream = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| ClientError::UpgradeFailed(e.to_string()))?;

        tracing::debug!("TLS handshake complete");
        Ok(ClientStream::Tls { stream: tls_stream })
    }
}

/// Creates a TLS connector from client configuration.
pub fn create_tls_connector(
    config: &TlsClientConfig,
    server_host: &str,
) -> Result<(TlsConnector, ServerName<'static>), ClientError> {
    let root_store = if let Some(ref ca_path) = config.ca_cert_path {
        let certs = load_certs(ca_path)?;
        let mut store = RootCertStore::empty();
        for cert in certs {
            store
                .add(cert)
                .map_err(|e| ClientError::TlsConfig(format!("invalid CA cert: {}", e)))?;
        }
        store
    } else {
        let mut store = RootCertStore::empty();
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        store
    };

    let builder = rustls::ClientConfig::builder().with_root_certificates(root_store);

    let client_config = match (&config.client_cert_path, &config.client_key_path) {
        (Some(cert_path), Some(key_path)) => {
            let certs = load_certs(cert_path)?;
            let key = load_private_key(key_path)?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| ClientError::TlsConfig(format!("invalid client cert/key: {}", e)))?
        }
        (None, None) => builder.with_no_client_auth(),
        _ => {
            return Err(ClientError::TlsConfig(
                "client certificate and key must be set together".to_string(),
            ))
        }
    };

    let connector = TlsConnector::from(Arc::new(client_config));
    Ok((connector, server_name(config, server_host)?))
}

/// Creates an insecure TLS connector that skips certificate verification.
/// WARNING: Only use for development/testing.
pub fn create_insecure_tls_connector(
    config: &TlsClientConfig,
    server_host: &str,
) -> Result<(TlsConnector, ServerName<'static>), ClientError> {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::UnixTime;
    use rustls::DigitallySignedStruct;

    #[derive(Debug)]
    struct AcceptAnyCert;

    impl ServerCertVerifier for AcceptAnyCert {
        fn verify_server_cert(
            &self,
            _: &CertificateDer<'_>,
            _: &[CertificateDer<'_>],
            _: &ServerName<'_>,
            _: &[u8],
            _: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _: &[u8],
            _: &CertificateDer<'_>,
            _: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _: &[u8],
            _: &CertificateDer<'_>,
            _: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
            use rustls::SignatureScheme::*;
            vec![
                RSA_PKCS1_SHA256,
                RSA_PKCS1_SHA384,
                RSA_PKCS1_SHA512,
                ECDSA_NISTP256_SHA256,
                ECDSA_NISTP384_SHA384,
                ECDSA_NISTP521_SHA512,
                RSA_PSS_SHA256,
                RSA_PSS_SHA384,
                RSA_PSS_SHA512,
                ED25519,
            ]
        }
    }

    let client_config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();

    let connector = TlsConnector::from(Arc::new(client_config));
    Ok((connector, server_name(config, server_host)?))
}

/// SNI name: the configured override, else the host the socket was dialed with.
fn server_name(
    config: &TlsClientConfig,
    server_host: &str,
) -> Result<ServerName<'static>, ClientError> {
    let name = config.server_name.as_deref().unwrap_or(server_host);
    ServerName::try_from(name.to_string())
        .map_err(|_| ClientError::TlsConfig(format!("invalid server name: {}", name)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ClientError> {
    let file = File::open(path)
        .map_err(|e| ClientError::TlsConfig(format!("cannot open cert file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ClientError::TlsConfig(format!("invalid cert file {:?}: {}", path, e)))
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ClientError> {
    let file = File::open(path)
        .map_err(|e| ClientError::TlsConfig(format!("cannot open key file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    loop {
        match rustls_pemfile::read_one(&mut reader)
            .map_err(|e| ClientError::TlsConfig(format!("invalid key file {:?}: {}", path, e)))?
        {
            Some(rustls_pemfile::Item::Pkcs1Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Pkcs8Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Sec1Key(key)) => return Ok(key.into()),
            None => {
                return Err(ClientError::TlsConfig(format!(
                    "no private key found in {:?}",
                    path
                )))
            }
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_invalid_cert_path() {
        let result = load_certs(Path::new("/nonexistent/cert.pem"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot open"));
    }

    #[test]
    fn test_load_invalid_key_path() {
        let result = load_private_key(Path::new("/nonexistent/key.pem"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot open"));
    }

    #[test]
    fn test_load_empty_key_file() {
        let mut key_file = NamedTempFile::new().unwrap();
        key_file.write_all(b"not a valid key").unwrap();

        let result = load_private_key(key_file.path());
        assert!(result.unwrap_err().to_string().contains("no private key"));
    }

    #[test]
    fn test_server_name_override() {
        let config = TlsClientConfig::new().with_server_name("db.internal");
        let name = server_name(&config, "10.0.0.5").unwrap();
        assert_eq!(name, ServerName::try_from("db.internal").unwrap());

        let name = server_name(&TlsClientConfig::new(), "10.0.0.5").unwrap();
        assert_eq!(name, ServerName::try_from("10.0.0.5").unwrap());
    }

    #[test]
    fn test_invalid_server_name() {
        let result = server_name(&TlsClientConfig::new(), "not a host name");
        assert!(matches!(result, Err(ClientError::TlsConfig(_))));
    }

    #[test]
    fn test_client_cert_without_key() {
        let config = TlsClientConfig {
            client_cert_path: Some("/some/cert.pem".into()),
            ..TlsClientConfig::default()
        };

        match create_tls_connector(&config, "localhost") {
            Err(e) => assert!(e.to_string().contains("must be set together")),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_missing_ca_file() {
        let config = TlsClientConfig::new().with_ca_cert("/nonexistent/ca.pem");
        match create_tls_connector(&config, "localhost") {
            Err(e) => assert!(e.to_string().contains("cannot open cert file")),
            Ok(_) => panic!("expected error"),
        }
    }
}
