//! Request ID and access logging middleware
//!
//! Assigns every request an ID (reusing the caller's header when present),
//! echoes it back on the response, and emits one `tracing` event per
//! completed request.

use super::Middleware;
use crate::{Request, Response};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Access log configuration
#[derive(Clone)]
pub struct AccessLogConfig {
    /// Header name for request ID
    pub header_name: String,
    /// Trust an incoming request ID header
    pub trust_incoming: bool,
    /// Length of generated IDs
    pub id_length: usize,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            header_name: "x-request-id".to_string(),
            trust_incoming: true,
            id_length: 21,
        }
    }
}

impl AccessLogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn trust_incoming(mut self, trust: bool) -> Self {
        self.trust_incoming = trust;
        self
    }
}

/// Generate a random alphanumeric request ID
pub fn generate_request_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Access log middleware
pub struct AccessLog {
    config: AccessLogConfig,
}

impl AccessLog {
    pub fn new(config: AccessLogConfig) -> Self {
        Self { config }
    }
}

impl Default for AccessLog {
    fn default() -> Self {
        Self::new(AccessLogConfig::default())
    }
}

impl Middleware for AccessLog {
    fn before(&self, req: &mut Request) -> Option<Response> {
        let incoming = if self.config.trust_incoming {
            req.header(&self.config.header_name)
                .filter(|id| !id.is_empty() && id.len() <= 128)
                .map(str::to_string)
        } else {
            None
        };
        let id = incoming.unwrap_or_else(|| generate_request_id(self.config.id_length));

        tracing::debug!(
            request_id = %id,
            method = %req.method,
            path = %req.path,
            "request received"
        );
        req.request_id = Some(id);
        None
    }

    fn after(&self, req: &Request, res: &mut Response) {
        if let Some(id) = &req.request_id {
            res.set_header(self.config.header_name.clone(), id.clone());
        }

        let elapsed_ms = req.received_at.elapsed().as_secs_f64() * 1000.0;
        let request_id = req.request_id.as_deref().unwrap_or("-");
        let remote = req
            .remote_addr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());

        if res.status.is_server_error() {
            tracing::warn!(
                request_id,
                remote = %remote,
                method = %req.method,
                target = %req.target(),
                status = res.status.as_u16(),
                elapsed_ms,
                "request failed"
            );
        } else {
            tracing::info!(
                request_id,
                remote = %remote,
                method = %req.method,
                target = %req.target(),
                status = res.status.as_u16(),
                elapsed_ms,
                "request completed"
            );
        }
    }
}
