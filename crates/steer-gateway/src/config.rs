//! Command-line configuration

use clap::Parser;
use std::time::Duration;
use steer_core::telemetry::LOG_LEVELS;
use steer_core::ServerConfig;

/// Rule-steering gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "steer-gateway")]
#[command(version)]
#[command(about = "Authorizes, validates and rewrites requests, then steers them to the upstream named by their rule", long_about = None)]
pub struct GatewayArgs {
    /// Listen address
    #[arg(short = 'H', long, env = "STEER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(short, long, env = "STEER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Base URL of the keystore
    #[arg(short, long, env = "STEER_BACKEND", default_value = "http://127.0.0.1:5000")]
    pub backend: String,

    /// JWKS location [default: <backend>/jwks.json]
    #[arg(long, env = "STEER_JWKS_URL")]
    pub jwks_url: Option<String>,

    /// JWT claim holding the caller's roles
    #[arg(long, env = "STEER_ROLES_CLAIM", default_value = "roles")]
    pub roles_claim: String,

    /// Seconds of clock skew tolerated on exp/nbf
    #[arg(long, env = "STEER_JWT_LEEWAY", default_value_t = 0)]
    pub jwt_leeway: u64,

    /// Verify upstream and keystore TLS certificates
    #[arg(long, env = "STEER_VERIFY_UPSTREAM_TLS", default_value_t = false)]
    pub verify_upstream_tls: bool,

    /// Timeout in seconds for keystore and upstream requests
    #[arg(long, env = "STEER_UPSTREAM_TIMEOUT", default_value_t = 30)]
    pub upstream_timeout: u64,

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

impl GatewayArgs {
    pub fn jwks_url(&self) -> String {
        match &self.jwks_url {
            Some(url) => url.clone(),
            None => format!("{}/jwks.json", self.backend.trim_end_matches('/')),
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.host.clone(), self.port)
            .max_body_bytes(self.max_body_bytes)
            .drain_timeout(Duration::from_secs(self.drain_timeout))
    }
}
