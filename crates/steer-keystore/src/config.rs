//! Command-line configuration

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use steer_core::telemetry::LOG_LEVELS;
use steer_core::ServerConfig;

/// Key-lookup backend
#[derive(Parser, Debug, Clone)]
#[command(name = "steer-keystore")]
#[command(version)]
#[command(about = "Serves steering rules and the JWKS used to verify gateway tokens", long_about = None)]
pub struct KeystoreArgs {
    /// Listen address
    #[arg(short = 'H', long, env = "STEER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(short, long, env = "STEER_PORT", default_value_t = 5000)]
    pub port: u16,

    /// JSON array of steering rules
    #[arg(short, long, env = "STEER_RULES", default_value = "db.json")]
    pub rules: PathBuf,

    /// Seconds to wait for open connections on shutdown
    #[arg(long, env = "STEER_DRAIN_TIMEOUT", default_value_t = 10)]
    pub drain_timeout: u64,

    /// Log level, overridden by RUST_LOG
    #[arg(short = 'l', long, env = "STEER_LOG", default_value = "info", value_parser = LOG_LEVELS)]
    pub log_level: String,
}

impl KeystoreArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.host.clone(), self.port)
            .drain_timeout(Duration::from_secs(self.drain_timeout))
    }
}
