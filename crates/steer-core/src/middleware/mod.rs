//! Middleware
//!
//! Middlewares see every request before routing and every response on
//! the way out. `before` may short-circuit with its own response.

pub mod access_log;

pub use access_log::{generate_request_id, AccessLog, AccessLogConfig};

use crate::{Request, Response};

/// Middleware trait - process request/response
pub trait Middleware: Send + Sync {
    /// Process request before handler
    fn before(&self, req: &mut Request) -> Option<Response>;

    /// Process response after handler
    fn after(&self, req: &Request, res: &mut Response);
}

/// Middleware chain
#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run before middlewares, return early response if any
    pub fn run_before(&self, req: &mut Request) -> Option<Response> {
        self.middlewares.iter().find_map(|m| m.before(req))
    }

    /// Run after middlewares in reverse order
    pub fn run_after(&self, req: &Request, res: &mut Response) {
        for m in self.middlewares.iter().rev() {
            m.after(req, res);
        }
    }
}
