//! Native HTTP server
//!
//! hyper on a multi-threaded tokio runtime with:
//! - Route table resolved through handler IDs, frozen before serving
//! - One task per connection, HTTP/1.1 or HTTP/2 (ALPN over TLS)
//! - Connection tracking and graceful shutdown with a drain timeout

use crate::middleware::{Middleware, MiddlewareChain};
use crate::{Error, Method, Request, Response, Result, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::{http1, http2};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use steer_router::Router;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;

#[cfg(feature = "tls")]
use crate::tls::TlsConfig;
#[cfg(feature = "tls")]
use tokio::net::TcpStream;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest request body accepted before answering 413
    pub max_body_bytes: usize,
    /// How long shutdown waits for open connections to finish
    pub drain_timeout: Duration,
    #[cfg(feature = "tls")]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_body_bytes: 10 * 1024 * 1024,
            drain_timeout: Duration::from_secs(10),
            #[cfg(feature = "tls")]
            tls: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    #[cfg(feature = "tls")]
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// Boxed response future returned by handlers
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Dynamic route handler type
pub type DynamicHandler = Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure into a [`DynamicHandler`]
pub fn handler<F, Fut>(f: F) -> DynamicHandler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Route table and request pipeline shared across all connections
///
/// Built once before the listener starts and never mutated afterwards, so
/// connections share it through an `Arc` without locking.
pub struct ServerState {
    router: Router,
    /// Handlers indexed by handler ID
    handlers: Vec<DynamicHandler>,
    /// Called for any request no route matches
    fallback: Option<DynamicHandler>,
    /// Response for unmatched paths when there is no fallback
    not_found: Response,
    middleware: MiddlewareChain,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            handlers: Vec::new(),
            fallback: None,
            not_found: Response::not_found(),
            middleware: MiddlewareChain::new(),
        }
    }

    /// Add a dynamic route
    pub fn add_dynamic(&mut self, method: Method, path: &str, handler: DynamicHandler) -> Result<()> {
        let handler_id = u32::try_from(self.handlers.len())
            .map_err(|_| Error::Internal("too many routes".to_string()))?;
        self.router.insert(method.as_str(), path, handler_id)?;
        self.handlers.push(handler);
        Ok(())
    }

    /// Add a route from an async closure
    pub fn route<F, Fut>(&mut self, method: Method, path: &str, f: F) -> Result<()>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.add_dynamic(method, path, handler(f))
    }

    /// Handle every unmatched request with `handler`
    pub fn set_fallback(&mut self, handler: DynamicHandler) {
        self.fallback = Some(handler);
    }

    /// Replace the default plain-text 404
    pub fn set_not_found(&mut self, response: Response) {
        self.not_found = response;
    }

    /// Append a middleware
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middleware.add(middleware);
    }

    /// Number of registered routes
    pub fn route_count(&self) -> usize {
        self.router.len()
    }

    /// Run middleware, route and handle a request
    pub async fn handle(&self, mut req: Request) -> Response {
        if let Some(mut res) = self.middleware.run_before(&mut req) {
            self.middleware.run_after(&req, &mut res);
            return res;
        }

        if self.middleware.is_empty() {
            return self.dispatch(req).await;
        }

        let head = req.clone();
        let mut res = self.dispatch(req).await;
        self.middleware.run_after(&head, &mut res);
        res
    }

    async fn dispatch(&self, mut req: Request) -> Response {
        let is_head = req.method == Method::Head;
        let matched = self
            .router
            .find(req.method.as_str(), &req.path)
            .or_else(|| {
                // HEAD falls back to the GET route
                if is_head {
                    self.router.find(Method::Get.as_str(), &req.path)
                } else {
                    None
                }
            });

        if let Some(matched) = matched {
            if let Some(handler) = self.handlers.get(matched.handler_id as usize) {
                req.params = matched.params.into_iter().collect();
                let mut res = handler(req).await;
                if is_head {
                    res.body = Bytes::new();
                }
                return res;
            }
        }

        if let Some(fallback) = &self.fallback {
            return fallback(req).await;
        }

        let allowed = self.router.allowed_methods(&req.path);
        if !allowed.is_empty() {
            return Response::method_not_allowed(&allowed);
        }

        self.not_found.clone()
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a listening TCP socket with SO_REUSEADDR and TCP_NODELAY
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket)
}

/// Convert hyper request parts plus a buffered body into our Request type
pub fn from_hyper_parts(
    parts: &http::request::Parts,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
) -> Result<Request> {
    let method: Method = parts.method.as_str().parse()?;

    let mut request = Request::new(method, parts.uri.path());
    request.query = parts.uri.query().map(|s| s.to_string());
    request.body = body;
    request.remote_addr = remote_addr;

    for (name, value) in &parts.headers {
        if let Ok(v) = value.to_str() {
            request.headers.push((name.to_string(), v.to_string()));
        }
    }

    Ok(request)
}

/// Convert our Response to hyper Response
pub fn to_hyper_response(res: Response) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(res.status.as_u16());

    for (name, value) in &res.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    match builder.body(Full::new(res.body)) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "handler produced an invalid response");
            let mut response = hyper::Response::new(Full::new(Bytes::from_static(
                StatusCode::INTERNAL_SERVER_ERROR.reason_phrase().as_bytes(),
            )));
            *response.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

async fn serve_request(
    state: Arc<ServerState>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
    max_body_bytes: usize,
) -> hyper::Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            let err = Error::BodyTooLarge { limit: max_body_bytes };
            tracing::debug!(remote = %remote_addr, error = %err, "rejecting request body");
            return to_hyper_response(Response::status_text(StatusCode::PAYLOAD_TOO_LARGE));
        }
        Err(e) => {
            tracing::debug!(remote = %remote_addr, error = %e, "failed to read request body");
            return to_hyper_response(Response::bad_request("Invalid request body"));
        }
    };

    match from_hyper_parts(&parts, body, Some(remote_addr)) {
        Ok(request) => to_hyper_response(state.handle(request).await),
        Err(e) => {
            tracing::debug!(remote = %remote_addr, error = %e, "unsupported request");
            to_hyper_response(Response::status_text(StatusCode::METHOD_NOT_ALLOWED))
        }
    }
}

// ============================================================================
// Connection Tracking for Graceful Shutdown
// ============================================================================

/// Tracks active connections for graceful shutdown
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicU64,
    shutting_down: AtomicBool,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new connection until the returned guard is dropped
    pub fn track(self: &Arc<Self>) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Get current active connection count
    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Signal that shutdown is in progress
    pub fn start_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Wait until no connection is active, or `timeout` elapses
    ///
    /// Returns true if all connections drained.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.count() == 0 {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Decrements the active count on drop
#[derive(Debug)]
pub struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Server
// ============================================================================

/// A bound, not yet serving, HTTP server
pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
    tracker: Arc<ConnectionTracker>,
    config: ServerConfig,
    #[cfg(feature = "tls")]
    acceptor: Option<tokio_rustls::TlsAcceptor>,
}

impl Server {
    /// Resolve the configured address and bind the listener
    ///
    /// TLS material is loaded here too, so misconfiguration fails before
    /// any connection is accepted.
    pub async fn bind(config: ServerConfig, state: ServerState) -> Result<Self> {
        let addr = tokio::net::lookup_host((config.host.as_str(), config.port))
            .await?
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("{}:{}", config.host, config.port)))?;

        let socket = create_optimized_socket(&addr)?;
        let listener = TcpListener::from_std(socket.into())?;

        #[cfg(feature = "tls")]
        let acceptor = match &config.tls {
            Some(tls) => Some(tls.build_acceptor()?),
            None => None,
        };

        Ok(Self {
            listener,
            state: Arc::new(state),
            tracker: Arc::new(ConnectionTracker::new()),
            config,
            #[cfg(feature = "tls")]
            acceptor,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn tracker(&self) -> Arc<ConnectionTracker> {
        Arc::clone(&self.tracker)
    }

    fn is_tls(&self) -> bool {
        #[cfg(feature = "tls")]
        {
            self.acceptor.is_some()
        }
        #[cfg(not(feature = "tls"))]
        {
            false
        }
    }

    /// Serve until Ctrl-C or SIGTERM
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(crate::shutdown::signal()).await
    }

    /// Serve until `shutdown` resolves, then drain open connections
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = self.local_addr()?;
        tracing::info!(
            address = %local_addr,
            tls = self.is_tls(),
            routes = self.state.route_count(),
            "listening"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    if self.tracker.is_shutting_down() {
                        drop(stream);
                        continue;
                    }

                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
                    }

                    let conn = Connection {
                        state: Arc::clone(&self.state),
                        remote_addr,
                        max_body_bytes: self.config.max_body_bytes,
                        shutdown: shutdown_rx.clone(),
                        _guard: self.tracker.track(),
                    };

                    #[cfg(feature = "tls")]
                    let acceptor = self.acceptor.clone();

                    tokio::spawn(async move {
                        #[cfg(feature = "tls")]
                        {
                            if let Some(acceptor) = acceptor {
                                conn.serve_tls(stream, acceptor).await;
                                return;
                            }
                        }
                        conn.serve(TokioIo::new(stream), false).await;
                    });
                }
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting connections");
                    self.tracker.start_shutdown();
                    break;
                }
            }
        }

        // Ask keep-alive connections to close after their current request
        let _ = shutdown_tx.send(true);
        drop(self.listener);

        let open = self.tracker.count();
        if open > 0 {
            tracing::info!(open, "waiting for connections to drain");
        }
        if self.tracker.wait_for_drain(self.config.drain_timeout).await {
            tracing::info!("server stopped");
        } else {
            tracing::warn!(
                open = self.tracker.count(),
                "drain timeout reached, dropping remaining connections"
            );
        }

        Ok(())
    }
}

/// Per-connection context
struct Connection {
    state: Arc<ServerState>,
    remote_addr: SocketAddr,
    max_body_bytes: usize,
    shutdown: watch::Receiver<bool>,
    _guard: ConnectionGuard,
}

impl Connection {
    #[cfg(feature = "tls")]
    async fn serve_tls(self, stream: TcpStream, acceptor: tokio_rustls::TlsAcceptor) {
        let tls_stream = match acceptor.accept(stream).await {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(remote = %self.remote_addr, error = %e, "TLS handshake failed");
                return;
            }
        };

        let http2 = tls_stream.get_ref().1.alpn_protocol() == Some(b"h2".as_slice());
        self.serve(TokioIo::new(tls_stream), http2).await;
    }

    async fn serve<S>(mut self, io: TokioIo<S>, http2: bool)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let remote_addr = self.remote_addr;
        let max_body_bytes = self.max_body_bytes;
        let service = service_fn(move |req| {
            let state = Arc::clone(&state);
            async move {
                Ok::<_, Infallible>(serve_request(state, req, remote_addr, max_body_bytes).await)
            }
        });

        let result = if http2 {
            let conn = http2::Builder::new(TokioExecutor::new()).serve_connection(io, service);
            tokio::pin!(conn);
            tokio::select! {
                res = conn.as_mut() => res,
                _ = self.shutdown.changed() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            }
        } else {
            let conn = http1::Builder::new().serve_connection(io, service);
            tokio::pin!(conn);
            tokio::select! {
                res = conn.as_mut() => res,
                _ = self.shutdown.changed() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            }
        };

        if let Err(e) = result {
            // Clients hanging up mid-request are routine
            if e.is_incomplete_message() || e.is_canceled() {
                tracing::debug!(remote = %self.remote_addr, error = %e, "connection closed early");
            } else {
                tracing::warn!(remote = %self.remote_addr, error = %e, "connection error");
            }
        }
    }
}
