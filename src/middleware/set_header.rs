//! Response-phase header writes.

use http::HeaderMap;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Override,
    IfNotPresent,
}

/// Writes a fixed set of headers onto every response passing outward.
///
/// - [`overriding`](Self::overriding) replaces whatever the inner chain set
///   for the same names.
/// - [`if_not_present`](Self::if_not_present) only fills names the inner
///   chain left unset, acting as a default.
#[derive(Clone, Debug)]
pub struct SetResponseHeaders {
    headers: HeaderMap,
    mode: Mode,
}

impl SetResponseHeaders {
    pub fn overriding(headers: HeaderMap) -> Self {
        Self { headers, mode: Mode::Override }
    }

    pub fn if_not_present(headers: HeaderMap) -> Self {
        Self { headers, mode: Mode::IfNotPresent }
    }
}

impl Middleware for SetResponseHeaders {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let headers = self.headers.clone();
        let mode = self.mode;
        Box::pin(async move {
            let mut res = next.run(req).await;
            let target = res.headers_mut();
            for name in headers.keys() {
                if mode == Mode::IfNotPresent && target.contains_key(name) {
                    continue;
                }
                target.remove(name);
                for value in headers.get_all(name) {
                    target.append(name.clone(), value.clone());
                }
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use http::HeaderValue;

    use super::*;
    use crate::handler::Handler;
    use crate::middleware::{Chain, Stack};
    use crate::response::Response;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }

    async fn run(stack: Stack) -> Response {
        let handler = |_req: Request| async {
            Response::builder().header("x-a", "inner").header("x-b", "inner").no_body()
        };
        let chain = Arc::new(Chain::new(stack.flatten(), handler.into_boxed_handler()));
        chain.start().run(Request::from_http(http::Request::new(Bytes::new()))).await
    }

    #[tokio::test]
    async fn overriding_replaces_inner_values() {
        let layer = SetResponseHeaders::overriding(headers(&[("x-a", "outer"), ("x-c", "outer")]));
        let res = run(Stack::new().layer(layer)).await;
        assert_eq!(res.header("x-a"), Some("outer"));
        assert_eq!(res.header("x-b"), Some("inner"));
        assert_eq!(res.header("x-c"), Some("outer"));
        assert_eq!(res.headers().get_all("x-a").iter().count(), 1);
    }

    #[tokio::test]
    async fn if_not_present_only_fills_gaps() {
        let layer = SetResponseHeaders::if_not_present(headers(&[("x-a", "default"), ("x-c", "default")]));
        let res = run(Stack::new().layer(layer)).await;
        assert_eq!(res.header("x-a"), Some("inner"));
        assert_eq!(res.header("x-c"), Some("default"));
    }

    #[tokio::test]
    async fn outer_override_wins_over_inner_override() {
        let stack = Stack::new()
            .layer(SetResponseHeaders::overriding(headers(&[("x-a", "outer")])))
            .layer(SetResponseHeaders::overriding(headers(&[("x-a", "middle")])));
        let res = run(stack).await;
        assert_eq!(res.header("x-a"), Some("outer"));
    }

    #[tokio::test]
    async fn multi_valued_headers_are_copied_whole() {
        let layer = SetResponseHeaders::overriding(headers(&[("x-a", "1"), ("x-a", "2")]));
        let res = run(Stack::new().layer(layer)).await;
        let values: Vec<_> = res.headers().get_all("x-a").iter().collect();
        assert_eq!(values, ["1", "2"]);
    }
}
