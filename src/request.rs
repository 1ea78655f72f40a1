//! Incoming HTTP request type.
//!
//! A [`Request`] is the per-request context. It is created once per inbound
//! request, moved through the middleware chain into the handler and dropped
//! when the response is produced. It is never shared between requests.

use bytes::Bytes;
use http::{Extensions, HeaderMap, Uri};
use serde::de::DeserializeOwned;

use crate::path::Params;
use crate::response::{IntoResponse, Response};

/// An incoming HTTP request with its body fully buffered.
pub struct Request {
    pub(crate) method: http::Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: Params,
    pub(crate) extensions: Extensions,
}

impl Request {
    /// Wraps an `http` request whose body has already been collected.
    ///
    /// Path parameters are filled in by the router on dispatch.
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: Params::default(),
            extensions: parts.extensions,
        }
    }

    pub fn method(&self) -> &http::Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn params(&self) -> &Params { &self.params }

    /// Typed per-request values, e.g. state derived by an earlier middleware.
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Header lookup. Returns `None` for absent or non-visible-ASCII values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, JsonRejection> {
        serde_json::from_slice(&self.body).map_err(JsonRejection)
    }
}

/// Returned by [`Request::json`] when the body is not valid JSON for `T`.
///
/// Converts into `400 Bad Request` with the parser message as plain text.
#[derive(Debug)]
pub struct JsonRejection(serde_json::Error);

impl IntoResponse for JsonRejection {
    fn into_response(self) -> Response {
        Response::builder()
            .status(http::StatusCode::BAD_REQUEST)
            .text(format!("failed to deserialize body: {}", self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &'static str) -> Request {
        let req = http::Request::builder()
            .method("POST")
            .uri("/echo?x=1")
            .header("X-Add-Value", "30")
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap();
        Request::from_http(req)
    }

    #[test]
    fn exposes_parts() {
        let req = request("{}");
        assert_eq!(req.method(), http::Method::POST);
        assert_eq!(req.path(), "/echo");
        assert_eq!(req.header("x-add-value"), Some("30"));
        assert!(req.params().is_empty());
    }

    #[test]
    fn json_body_is_decoded() {
        let value: serde_json::Value = request(r#"{"hello":"world"}"#).json().unwrap();
        assert_eq!(value, serde_json::json!({"hello": "world"}));
    }

    #[test]
    fn malformed_json_becomes_bad_request() {
        let rejection = request("{nope").json::<serde_json::Value>().unwrap_err();
        assert_eq!(rejection.into_response().status_code(), http::StatusCode::BAD_REQUEST);
    }
}
