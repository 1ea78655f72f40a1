//! HTTP server and graceful shutdown.
//!
//! Each accepted connection gets its own task; hyper drives the requests on
//! it and hands each one to the shared [`Executor`]. Request bodies are
//! read completely (up to `max_body_bytes`) before routing, so handlers see
//! a plain [`Bytes`](bytes::Bytes) body.
//!
//! # Scheduling
//!
//! [`Server::run`] uses a single-threaded tokio runtime. Every connection and
//! every request is a future on that one thread; a handler that awaits (a
//! timer, a socket, a lock) yields the thread to the others. Only CPU-bound
//! work between awaits holds everyone else up.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server stops calling `accept`, lets every
//! in-flight connection task finish, and only then returns. Under an
//! orchestrator, give the process a grace period longer than the slowest
//! request.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::executor::Executor;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    name: String,
    timeout: Option<Duration>,
    max_body_bytes: usize,
}

struct Shared {
    executor: Executor,
    max_body_bytes: usize,
}

impl Server {
    /// A server on `addr` with every other setting at its default.
    ///
    /// ```rust,no_run
    /// use switchyard::Server;
    /// let server = Server::bind(([0, 0, 0, 0], 3000).into());
    /// ```
    pub fn bind(addr: SocketAddr) -> Self {
        Self::from_config(&ServerConfig { bind: addr, ..ServerConfig::default() })
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            addr: config.bind,
            name: config.name.clone(),
            timeout: config.handler_timeout(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// `None` disables the per-request timeout.
    pub fn handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Blocks the calling thread on a fresh single-threaded runtime until
    /// shutdown completes.
    pub fn run(self, router: Router) -> Result<(), Error> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        runtime.block_on(self.serve(router))
    }

    /// Serves until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    pub async fn serve_with_shutdown(
        self,
        router: Router,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_listener(listener, router, shutdown).await
    }

    /// Serves on an already-bound listener, ignoring the configured address.
    /// Binding port 0 and reading `listener.local_addr()` is the way to get
    /// an ephemeral port.
    pub async fn serve_listener(
        self,
        listener: TcpListener,
        router: Router,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let routes = router.build()?;
        let route_count = routes.len();
        let shared = Arc::new(Shared {
            executor: Executor::new(routes).timeout(self.timeout),
            max_body_bytes: self.max_body_bytes,
        });

        let addr = listener.local_addr()?;
        info!(name = %self.name, %addr, routes = route_count, "listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown is checked first so queued connections are not
                // accepted after the signal.
                biased;

                () = &mut shutdown => {
                    info!(name = %self.name, in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };
                    debug!(%peer, "connection accepted");

                    let shared = Arc::clone(&shared);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let shared = Arc::clone(&shared);
                            async move { Ok::<_, Infallible>(handle(&shared, req).await.into_http()) }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(%peer, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!(name = %self.name, "stopped");
        Ok(())
    }
}

/// Buffers the body, then runs the request. Always produces a response.
async fn handle(shared: &Shared, req: hyper::Request<Incoming>) -> Response {
    let (parts, body) = req.into_parts();
    let body = match Limited::new(body, shared.max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            debug!(limit = shared.max_body_bytes, "request body too large");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
        Err(e) => {
            debug!("failed to read request body: {e}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let req = Request::from_http(http::Request::from_parts(parts, body));
    shared.executor.execute(req).await
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM or SIGINT (Ctrl-C). On Windows only Ctrl-C exists.
///
/// A signal source that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;

    async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn serves_until_shutdown_and_enforces_body_limit() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();

        let router = Router::new().post("/echo", |req: Request| async move {
            String::from_utf8_lossy(req.body()).into_owned()
        });
        let server = Server::bind(addr).max_body_bytes(8);
        let handle = tokio::spawn(server.serve_listener(listener, router, async {
            let _ = stopped.await;
        }));

        let ok = roundtrip(
            addr,
            "POST /echo HTTP/1.1\r\nhost: x\r\nconnection: close\r\ncontent-length: 5\r\n\r\nhello",
        )
        .await;
        assert!(ok.starts_with("HTTP/1.1 200"), "{ok}");
        assert!(ok.ends_with("hello"), "{ok}");

        let big = roundtrip(
            addr,
            "POST /echo HTTP/1.1\r\nhost: x\r\nconnection: close\r\ncontent-length: 20\r\n\r\n01234567890123456789",
        )
        .await;
        assert!(big.starts_with("HTTP/1.1 413"), "{big}");

        stop.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn invalid_routes_fail_before_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let router = Router::new().get("missing-slash", |_req: Request| async {});
        let err = Server::bind(([127, 0, 0, 1], 0).into())
            .serve_listener(listener, router, std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }), "{err}");
    }
}
