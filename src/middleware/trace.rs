//! Per-request tracing span.

use std::time::Instant;

use tracing::Instrument;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

/// Opens an `info` span carrying method and path for the rest of the chain
/// and logs status and latency when the response comes back.
///
/// Put it first so the span covers every other middleware.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let span = tracing::info_span!("request", method = %req.method(), path = %req.path());
        let started = Instant::now();
        Box::pin(
            async move {
                let res = next.run(req).await;
                tracing::info!(
                    status = res.status_code().as_u16(),
                    latency_ms = started.elapsed().as_millis() as u64,
                    "request completed",
                );
                res
            }
            .instrument(span),
        )
    }
}
