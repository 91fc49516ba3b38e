//! Command-line configuration

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use steer_core::telemetry::LOG_LEVELS;
use steer_core::{ServerConfig, TlsConfig};

/// Echo/info API server
#[derive(Parser, Debug, Clone)]
#[command(name = "steer-apiserver")]
#[command(version)]
#[command(about = "Returns the server time and hostname, and echoes posted JSON", long_about = None)]
pub struct ApiServerArgs {
    /// Listen address
    #[arg(short = 'H', long, env = "STEER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(short, long, env = "STEER_PORT", default_value_t = 5000)]
    pub port: u16,

    /// PEM certificate chain; enables HTTPS together with --tls-key
    #[arg(long, env = "STEER_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "STEER_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// Only offer HTTP/1.1 over TLS
    #[arg(long, env = "STEER_HTTP1_ONLY", default_value_t = false)]
    pub http1_only: bool,

    /// Largest accepted request body in bytes
    #[arg(long, env = "STEER_MAX_BODY", default_value_t = 10 * 1024 * 1024)]
    pub max_body_bytes: usize,

    /// Seconds to wait for open connections on shutdown
    #[arg(long, env = "STEER_DRAIN_TIMEOUT", default_value_t = 10)]
    pub drain_timeout: u64,

    /// Log level, overridden by RUST_LOG
    #[arg(short = 'l', long, env = "STEER_LOG", default_value = "info", value_parser = LOG_LEVELS)]
    pub log_level: String,
}

impl ApiServerArgs {
    pub fn tls_config(&self) -> Option<TlsConfig> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => {
                Some(TlsConfig::new(cert.clone(), key.clone()).http2(!self.http1_only))
            }
            _ => None,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        let config = ServerConfig::new(self.host.clone(), self.port)
            .max_body_bytes(self.max_body_bytes)
            .drain_timeout(Duration::from_secs(self.drain_timeout));

        match self.tls_config() {
            Some(tls) => config.tls(tls),
            None => config,
        }
    }
}
