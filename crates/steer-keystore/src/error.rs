//! Error types for steer-keystore

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeystoreError>;

#[derive(Debug, Error)]
pub enum KeystoreError {
    /// Rules file could not be read
    #[error("failed to read rules file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rules file is not valid JSON
    #[error("rules file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rules file parsed but the top-level value is not an array
    #[error("rules file must contain a JSON array, found {0}")]
    NotAnArray(&'static str),

    /// HTTP server setup or serving failed
    #[error(transparent)]
    Server(#[from] steer_core::Error),
}
