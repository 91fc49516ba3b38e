//! Error types for steer-gateway

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Startup failures
///
/// Per-request failures never surface here; the steering pipeline maps
/// them straight to a status code.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to fetch JWKS from {url}: {source}")]
    JwksFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("JWKS contains no usable HMAC key")]
    NoKeys,

    #[error(transparent)]
    Server(#[from] steer_core::Error),
}
