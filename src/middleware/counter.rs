//! Threshold-gated shared counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use http::{HeaderName, StatusCode};

use super::{Middleware, Next, Rejection};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::IntoResponse;

/// Adds a per-request increment to a counter shared by every route the
/// middleware is attached to, and rejects requests that would push the
/// running total past `limit`.
///
/// The increment is read from a request header (`x-add-value` by default)
/// as an unsigned integer; when the header is missing or unparseable the
/// configured default increment (0 unless set) is used. A rejected
/// increment is not added to the total.
///
/// ```rust
/// use switchyard::middleware::CounterLimit;
/// use switchyard::{Group, Request};
///
/// let counter = CounterLimit::new(50);
/// let group = Group::new("/counter_protected")
///     .layer(counter.clone())
///     .post("/echo", |_req: Request| async { "ok" })
///     .post("/json", |_req: Request| async { "ok" });
/// // `counter.total()` now reflects traffic to both routes.
/// ```
#[derive(Clone)]
pub struct CounterLimit {
    total: Arc<AtomicU64>,
    limit: u64,
    default_increment: u64,
    header: HeaderName,
    rejection: Rejection,
}

impl CounterLimit {
    pub const DEFAULT_HEADER: HeaderName = HeaderName::from_static("x-add-value");

    pub fn new(limit: u64) -> Self {
        Self {
            total: Arc::new(AtomicU64::new(0)),
            limit,
            default_increment: 0,
            header: Self::DEFAULT_HEADER,
            rejection: Rejection::error(StatusCode::TOO_MANY_REQUESTS, "Counter limit exceeded"),
        }
    }

    pub fn default_increment(mut self, increment: u64) -> Self {
        self.default_increment = increment;
        self
    }

    pub fn header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    pub fn rejection(mut self, rejection: Rejection) -> Self {
        self.rejection = rejection;
        self
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    fn increment_for(&self, req: &Request) -> u64 {
        req.headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(self.default_increment)
    }

    /// Commits `increment` if the new total stays within the limit.
    fn try_add(&self, increment: u64) -> Result<u64, u64> {
        let limit = self.limit;
        self.total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(increment).filter(|next| *next <= limit)
            })
            .map(|previous| previous + increment)
    }
}

impl Middleware for CounterLimit {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let increment = self.increment_for(&req);
        match self.try_add(increment) {
            Ok(total) => {
                tracing::trace!(increment, total, "counter incremented");
                next.run(req)
            }
            Err(total) => {
                tracing::debug!(increment, total, limit = self.limit, "counter limit exceeded");
                let response = self.rejection.clone().into_response();
                Box::pin(async move { response })
            }
        }
    }
}
