//! steer-core: HTTP plumbing shared by the steer services
//!
//! Request/response types, a frozen route table over `steer-router`,
//! and a hyper accept loop with graceful shutdown.
//!
//! ## Features
//! - `tls` - HTTPS via rustls

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod shutdown;
pub mod telemetry;

#[cfg(feature = "tls")]
pub mod tls;

// Re-exports
pub use error::{Error, Result};
pub use request::{percent_decode_path, Method, Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, StatusCode};

pub use middleware::{AccessLog, AccessLogConfig, Middleware, MiddlewareChain};

pub use server::{
    create_optimized_socket, from_hyper_parts, handler, to_hyper_response, ConnectionTracker,
    DynamicHandler, HandlerFuture, Server, ServerConfig, ServerState,
};

#[cfg(feature = "tls")]
pub use tls::{load_certs, load_private_key, TlsConfig};
