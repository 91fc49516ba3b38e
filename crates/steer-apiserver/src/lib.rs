//! steer-apiserver: echo/info API server
//!
//! `GET /get_data` reports the local time and hostname; `POST /echo_data`
//! echoes the posted JSON body with the same metadata attached.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod host;
pub mod service;

pub use config::ApiServerArgs;
pub use service::{build_state, EchoResponse, InfoResponse};

use steer_core::Server;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiServerError {
    #[error(transparent)]
    Server(#[from] steer_core::Error),
}

pub type Result<T> = std::result::Result<T, ApiServerError>;

/// Bind and serve until a shutdown signal
pub async fn run(args: ApiServerArgs) -> Result<()> {
    let config = args.server_config();
    if config.tls.is_none() {
        tracing::warn!("no certificate configured, serving plain HTTP");
    }

    let server = Server::bind(config, build_state()?).await?;
    server.serve().await?;
    Ok(())
}
