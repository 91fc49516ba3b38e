//! steer-gateway: rule-steering gateway
//!
//! Looks every request up in the keystore by path, checks the caller's JWT
//! roles and the payload against the rule, rewrites JSON in both
//! directions and proxies to the rule's upstream.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod jwks;
pub mod jwt;
pub mod rule;
pub mod steer;
pub mod template;
pub mod transform;

pub use client::{build_http_client, fetch_jwks, SteerClient, UpstreamResponse};
pub use config::GatewayArgs;
pub use error::{GatewayError, Result};
pub use jwks::{HmacKey, Jwk, Jwks, KeySet};
pub use jwt::{Algorithm, Claims, JwtError, Verifier};
pub use rule::SteeringRule;
pub use steer::{build_state, Gateway};
pub use transform::JsonTransform;

use std::sync::Arc;
use steer_core::Server;

/// Assemble the gateway from its configuration
///
/// The JWKS is fetched here, once.
pub async fn connect(args: &GatewayArgs) -> Result<Gateway> {
    if !args.backend.starts_with("http://") && !args.backend.starts_with("https://") {
        return Err(GatewayError::Config(format!(
            "backend must be an http(s) URL, got {:?}",
            args.backend
        )));
    }

    let http = build_http_client(args.upstream_timeout(), args.verify_upstream_tls)?;

    let jwks_url = args.jwks_url();
    let keys = KeySet::from_jwks(&fetch_jwks(&http, &jwks_url).await?)?;
    tracing::info!(url = %jwks_url, keys = keys.len(), "loaded JWKS");

    let verifier = Verifier::new(keys).leeway(args.jwt_leeway);
    let client = SteerClient::new(http, args.backend.clone());
    Ok(Gateway::new(verifier, client, args.roles_claim.clone()))
}

/// Fetch keys, bind and serve until a shutdown signal
pub async fn run(args: GatewayArgs) -> Result<()> {
    let gateway = connect(&args).await?;
    if !args.verify_upstream_tls {
        tracing::warn!("upstream TLS certificates are not verified");
    }

    let server = Server::bind(args.server_config(), build_state(Arc::new(gateway))).await?;
    server.serve().await?;
    Ok(())
}
