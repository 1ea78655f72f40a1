//! Per-request execution: route, run the chain, bound the wait.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tracing::{debug, warn};

use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::Routes;

/// Runs requests against a frozen route table.
///
/// The server owns one of these and shares it between connection tasks, but
/// it is equally usable on its own to drive an application in-process:
///
/// ```rust
/// # use bytes::Bytes;
/// # use switchyard::{Executor, Request, Router};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let routes = Router::new().get("/ping", |_req: Request| async { "pong" }).build().unwrap();
/// let executor = Executor::new(routes);
///
/// let req = http::Request::get("/ping").body(Bytes::new()).unwrap();
/// let res = executor.execute(Request::from_http(req)).await;
/// assert_eq!(res.body().as_ref(), b"pong");
/// # }
/// ```
#[derive(Clone)]
pub struct Executor {
    routes: Arc<Routes>,
    timeout: Option<Duration>,
}

impl Executor {
    pub fn new(routes: Routes) -> Self {
        Self { routes: Arc::new(routes), timeout: None }
    }

    /// Upper bound on how long one request may take, middleware included.
    /// `None` waits indefinitely.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Produces exactly one response for `req`. Never fails: routing misses
    /// become `404`/`405` and an expired timeout becomes `500`.
    pub async fn execute(&self, req: Request) -> Response {
        let fut = match self.routes.dispatch(req.method(), req.path()) {
            Ok(matched) => matched.run(req),
            Err(e) => {
                debug!(method = %req.method(), path = req.path(), error = ?e, "no route");
                return e.into_response();
            }
        };

        let Some(limit) = self.timeout else {
            return fut.await;
        };
        match tokio::time::timeout(limit, fut).await {
            Ok(res) => res,
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "handler timed out");
                (StatusCode::INTERNAL_SERVER_ERROR, "handler timed out").into_response()
            }
        }
    }
}
