//! TLS support using rustls
//!
//! Provides HTTPS with:
//! - TLS 1.2/1.3 only, ring crypto provider
//! - Certificate chain and key loaded from PEM files
//! - ALPN negotiation (HTTP/1.1, optionally HTTP/2)

use crate::{Error, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// TLS configuration
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Offer h2 through ALPN
    pub http2: bool,
}

impl TlsConfig {
    /// Create a new TLS config
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            http2: true,
        }
    }

    pub fn http2(mut self, enabled: bool) -> Self {
        self.http2 = enabled;
        self
    }

    /// ALPN protocols advertised to clients
    pub fn alpn_protocols(&self) -> Vec<Vec<u8>> {
        if self.http2 {
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        } else {
            vec![b"http/1.1".to_vec()]
        }
    }

    /// Build rustls ServerConfig
    pub fn build_server_config(&self) -> Result<Arc<rustls::ServerConfig>> {
        let certs = load_certs(&self.cert_path)?;
        let key = load_private_key(&self.key_path)?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| Error::Tls(e.to_string()))?;

        config.alpn_protocols = self.alpn_protocols();

        Ok(Arc::new(config))
    }

    /// Build an acceptor for the accept loop
    pub fn build_acceptor(&self) -> Result<TlsAcceptor> {
        Ok(TlsAcceptor::from(self.build_server_config()?))
    }
}

/// Load certificates from PEM file
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| Error::Tls(format!("Failed to open cert file {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("Failed to parse certs: {}", e)))?;

    if certs.is_empty() {
        return Err(Error::Tls(format!("No certificates found in {}", path.display())));
    }

    Ok(certs)
}

/// Load the first private key (PKCS#1, PKCS#8 or SEC1) from PEM file
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .map_err(|e| Error::Tls(format!("Failed to open key file {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::Tls(format!("Failed to parse key: {}", e)))?
        .ok_or_else(|| Error::Tls(format!("No private key found in {}", path.display())))
}
