//! Logging setup shared by the service binaries

use tracing_subscriber::EnvFilter;

/// Log levels accepted on the command line
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Install the global fmt subscriber
///
/// `RUST_LOG` takes precedence over `level`. Calling this twice is a no-op.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
