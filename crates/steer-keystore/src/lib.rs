//! steer-keystore: key-lookup backend
//!
//! Loads a JSON array of steering rules once at startup and serves them by
//! uri, together with the static JWKS the gateway verifies tokens against.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod jwks;
pub mod rules;
pub mod service;

pub use config::KeystoreArgs;
pub use error::{KeystoreError, Result};
pub use jwks::{static_jwks, Jwk, Jwks};
pub use rules::RuleSet;
pub use service::build_state;

use std::sync::Arc;
use steer_core::Server;

/// Load rules, bind and serve until a shutdown signal
pub async fn run(args: KeystoreArgs) -> Result<()> {
    let rules = Arc::new(RuleSet::load(&args.rules)?);
    let state = build_state(rules)?;
    let server = Server::bind(args.server_config(), state).await?;
    server.serve().await?;
    Ok(())
}
