//! Middleware layer.
//!
//! A middleware wraps everything nested inside it. For a chain
//! `[m1, m2, …, mk]` around handler `h`, `m1` sees the request first and
//! calls [`Next::run`] to hand it to `m2`, and so on down to `h`. Responses
//! travel back out in reverse order, so every middleware can rewrite the
//! response produced by the ones nested inside it. A middleware may also
//! answer on its own without calling `next` at all.
//!
//! # Grouping
//!
//! Middleware can be bundled into a named [`Stack`], and stacks can nest.
//! Grouping is authoring sugar only: when routes are built every stack is
//! flattened depth-first, so
//!
//! ```text
//! [x, Stack("auth")[a, b], y]   ≡   [x, a, b, y]
//! ```
//!
//! and the request path walks one flat slice by index.
//!
//! # Writing middleware
//!
//! For one-offs, wrap an async closure with [`from_fn`]:
//!
//! ```rust
//! use switchyard::middleware::{self, Next};
//! use switchyard::{Request, Router};
//!
//! async fn stamp(req: Request, next: Next) -> switchyard::Response {
//!     let mut res = next.run(req).await;
//!     res.headers_mut().insert("x-stamped", http::HeaderValue::from_static("1"));
//!     res
//! }
//!
//! let app = Router::new()
//!     .layer(middleware::from_fn(stamp))
//!     .get("/", |_req: Request| async { "ok" });
//! ```
//!
//! Reusable middleware implements [`Middleware`] directly; see
//! [`CounterLimit`], [`HeaderGuard`], [`SetResponseHeaders`],
//! [`RequireAuth`] and [`Trace`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use http::StatusCode;
use serde_json::{json, Value};

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

mod auth;
mod counter;
mod header;
mod set_header;
mod trace;

pub use auth::{Identity, IdentityProvider, RequireAuth, StaticTokens};
pub use counter::CounterLimit;
pub use header::{HeaderGuard, Policy};
pub use set_header::SetResponseHeaders;
pub use trace::Trace;

// ── Middleware trait ──────────────────────────────────────────────────────────

/// An interceptor around the rest of the chain.
///
/// Work done before the returned future is first polled runs without any
/// suspension point, which is where shared state should be read and updated.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// Adapts an `async fn(Request, Next) -> impl IntoResponse` into a [`Middleware`].
pub fn from_fn<F, Fut, R>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    FromFn(f)
}

/// See [`from_fn`].
#[derive(Clone)]
pub struct FromFn<F>(F);

impl<F, Fut, R> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let fut = (self.0)(req, next);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Chain / Next ──────────────────────────────────────────────────────────────

/// A route's flattened middleware list plus its terminal handler.
pub(crate) struct Chain {
    layers: Box<[BoxedMiddleware]>,
    handler: BoxedHandler,
}

impl Chain {
    pub(crate) fn new(layers: Vec<BoxedMiddleware>, handler: BoxedHandler) -> Self {
        Self { layers: layers.into_boxed_slice(), handler }
    }

    pub(crate) fn len(&self) -> usize {
        self.layers.len()
    }

    /// Entry point: the outermost middleware, or the handler if there is none.
    pub(crate) fn start(self: &Arc<Self>) -> Next {
        Next { chain: Arc::clone(self), index: 0 }
    }
}

/// The remainder of the chain after the current middleware.
pub struct Next {
    chain: Arc<Chain>,
    index: usize,
}

impl Next {
    /// Passes the request inward and resolves to the inner response.
    pub fn run(self, req: Request) -> BoxFuture {
        match self.chain.layers.get(self.index) {
            Some(layer) => {
                let layer = Arc::clone(layer);
                let next = Next { chain: self.chain, index: self.index + 1 };
                layer.call(req, next)
            }
            None => self.chain.handler.call(req),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("remaining", &(self.chain.layers.len() - self.index))
            .finish()
    }
}

// ── Stack ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Node {
    Leaf(BoxedMiddleware),
    Group(Stack),
}

/// An ordered, optionally named group of middleware and nested stacks.
///
/// Cloning a stack shares the middleware instances inside it, including any
/// state they hold.
#[derive(Clone, Default)]
pub struct Stack {
    name: Option<String>,
    nodes: Vec<Node>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), nodes: Vec::new() }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Appends a middleware. Earlier entries wrap later ones.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.nodes.push(Node::Leaf(Arc::new(middleware)));
        self
    }

    /// Appends a nested stack.
    pub fn stack(mut self, stack: Stack) -> Self {
        self.nodes.push(Node::Group(stack));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(|node| match node {
            Node::Leaf(_) => false,
            Node::Group(stack) => stack.is_empty(),
        })
    }

    pub(crate) fn push_layer(&mut self, middleware: BoxedMiddleware) {
        self.nodes.push(Node::Leaf(middleware));
    }

    pub(crate) fn push_stack(&mut self, stack: Stack) {
        self.nodes.push(Node::Group(stack));
    }

    /// Depth-first list of the leaf middleware.
    pub(crate) fn flatten(&self) -> Vec<BoxedMiddleware> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<BoxedMiddleware>) {
        for node in &self.nodes {
            match node {
                Node::Leaf(middleware) => out.push(Arc::clone(middleware)),
                Node::Group(stack) => stack.flatten_into(out),
            }
        }
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("name", &self.name)
            .field("layers", &self.flatten().len())
            .finish()
    }
}

// ── Rejection ─────────────────────────────────────────────────────────────────

/// A short-circuit response configured on a middleware instance.
///
/// The body shape is part of the configuration: the built-ins default to
/// `{"error": …}` except [`RequireAuth`], which uses `{"detail": …}`.
#[derive(Clone, Debug, PartialEq)]
pub struct Rejection {
    status: StatusCode,
    body: Value,
}

impl Rejection {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// `{"error": message}`
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::new(status, json!({ "error": message }))
    }

    /// `{"detail": message}`
    pub fn detail(status: StatusCode, message: &str) -> Self {
        Self::new(status, json!({ "detail": message }))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        Response::builder().status(self.status).json(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::handler::Handler;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records entry and exit, and tags the response with its name.
    fn recorder(name: &'static str, log: &Log) -> impl Middleware {
        let log = Arc::clone(log);
        from_fn(move |req: Request, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name}:in"));
                let mut res = next.run(req).await;
                log.lock().unwrap().push(format!("{name}:out"));
                res.headers_mut().append("x-trail", name.parse().unwrap());
                res
            }
        })
    }

    fn chain(stack: &Stack, log: &Log) -> Arc<Chain> {
        let log = Arc::clone(log);
        let handler = move |_req: Request| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("handler".to_owned());
                "done"
            }
        };
        Arc::new(Chain::new(stack.flatten(), handler.into_boxed_handler()))
    }

    fn request() -> Request {
        Request::from_http(http::Request::new(Bytes::new()))
    }

    fn trail(res: &Response) -> Vec<&str> {
        res.headers().get_all("x-trail").iter().map(|v| v.to_str().unwrap()).collect()
    }

    #[tokio::test]
    async fn requests_go_in_order_and_responses_come_back_reversed() {
        let log = Log::default();
        let stack = Stack::new().layer(recorder("a", &log)).layer(recorder("b", &log));

        let res = chain(&stack, &log).start().run(request()).await;

        assert_eq!(*log.lock().unwrap(), ["a:in", "b:in", "handler", "b:out", "a:out"]);
        assert_eq!(trail(&res), ["b", "a"]);
        assert_eq!(res.body().as_ref(), b"done");
    }

    #[tokio::test]
    async fn short_circuit_skips_the_rest() {
        let log = Log::default();
        let deny = from_fn(|_req: Request, _next: Next| async {
            Rejection::error(StatusCode::FORBIDDEN, "nope")
        });
        let stack = Stack::new().layer(recorder("a", &log)).layer(deny).layer(recorder("b", &log));

        let res = chain(&stack, &log).start().run(request()).await;

        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(res.body().as_ref(), br#"{"error":"nope"}"#);
        assert_eq!(*log.lock().unwrap(), ["a:in", "a:out"]);
    }

    #[tokio::test]
    async fn nested_stacks_behave_like_their_flattening() {
        let nested_log = Log::default();
        let nested = Stack::new()
            .layer(recorder("x", &nested_log))
            .stack(
                Stack::named("pair")
                    .layer(recorder("a", &nested_log))
                    .stack(Stack::named("inner").layer(recorder("b", &nested_log))),
            )
            .layer(recorder("y", &nested_log));

        let flat_log = Log::default();
        let flat = Stack::new()
            .layer(recorder("x", &flat_log))
            .layer(recorder("a", &flat_log))
            .layer(recorder("b", &flat_log))
            .layer(recorder("y", &flat_log));

        let nested_res = chain(&nested, &nested_log).start().run(request()).await;
        let flat_res = chain(&flat, &flat_log).start().run(request()).await;

        assert_eq!(*nested_log.lock().unwrap(), *flat_log.lock().unwrap());
        assert_eq!(trail(&nested_res), trail(&flat_res));
        assert_eq!(nested.flatten().len(), 4);
    }

    #[test]
    fn empty_nested_stacks_count_as_empty() {
        assert!(Stack::new().stack(Stack::named("nothing")).is_empty());
        assert!(!Stack::new().layer(Trace).is_empty());
    }
}
