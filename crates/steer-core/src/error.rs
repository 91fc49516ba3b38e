//! Error types for steer-core

use thiserror::Error;

/// Result type alias for steer-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the steer HTTP plumbing
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Route registration failed
    #[error("Invalid route: {0}")]
    Route(#[from] steer_router::RouteError),

    /// Invalid listen address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Body too large
    #[error("Body too large: exceeds limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error
    #[cfg(feature = "tls")]
    #[error("TLS error: {0}")]
    Tls(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
