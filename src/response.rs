//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Handlers return anything that implements [`IntoResponse`]; the assembler
//! rules are:
//!
//! - [`Json`] sets the serialized body and `content-type: application/json`.
//! - `()` produces `200 OK` with an empty body and no content-type.
//! - `String` / `&'static str` produce `text/plain; charset=utf-8`.
//! - `(StatusCode, R)`, `(HeaderMap, R)` and `(StatusCode, HeaderMap, R)`
//!   build `R` first and then apply the status and headers over it. Tuple
//!   headers replace headers of the same name set by `R`.
//!
//! Middleware sees the assembled [`Response`] on the way out and may rewrite
//! it; a write made by an outer middleware lands last and therefore wins.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    fn as_header(&self) -> HeaderValue {
        HeaderValue::from_static(match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        })
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use switchyard::Response;
/// use http::StatusCode;
///
/// Response::json(&serde_json::json!({"id": 1}));
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(&serde_json::json!({"id": 42}));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// `200 OK` with `application/json`.
    ///
    /// Serialization failure yields `500` with the serializer's message.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::builder().json(value)
    }

    /// `200 OK` with `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body and no content-type.
    pub fn status(code: StatusCode) -> Self {
        Self { status: code, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// `200 OK` with an empty body.
    pub fn empty() -> Self {
        Self::status(StatusCode::OK)
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { status: StatusCode::OK, headers: HeaderMap::new() }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    pub fn set_status(&mut self, code: StatusCode) {
        self.status = code;
    }

    /// Header lookup as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`]. Defaults to `200 OK`.
///
/// Terminated by a typed body method. Invalid header names or values passed
/// to [`header`](ResponseBuilder::header) are skipped with a `warn!`.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "dropping invalid response header"),
        }
        self
    }

    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => self.bytes(ContentType::Json, body),
            Err(e) => Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .text(e.to_string()),
        }
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.bytes(ContentType::Text, body.into())
    }

    /// Terminate with a typed body.
    pub fn bytes(mut self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.headers.insert(header::CONTENT_TYPE, content_type.as_header());
        Response { status: self.status, headers: self.headers, body: body.into() }
    }

    /// Terminate with no body (e.g. `204`, `304`).
    pub fn no_body(self) -> Response {
        Response { status: self.status, headers: self.headers, body: Bytes::new() }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers and
/// middleware.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for () {
    fn into_response(self) -> Response { Response::empty() }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(ok) => ok.into_response(),
            Err(err) => err.into_response(),
        }
    }
}

impl<R: IntoResponse> IntoResponse for (StatusCode, R) {
    fn into_response(self) -> Response {
        let mut res = self.1.into_response();
        res.status = self.0;
        res
    }
}

impl<R: IntoResponse> IntoResponse for (HeaderMap, R) {
    fn into_response(self) -> Response {
        let mut res = self.1.into_response();
        merge_headers(&mut res.headers, self.0);
        res
    }
}

impl<R: IntoResponse> IntoResponse for (StatusCode, HeaderMap, R) {
    fn into_response(self) -> Response {
        let (status, headers, inner) = self;
        (status, (headers, inner)).into_response()
    }
}

/// `extend` alone would append to multi-valued names; here a name present in
/// `overrides` replaces every existing value for it.
fn merge_headers(target: &mut HeaderMap, overrides: HeaderMap) {
    let mut last = None;
    for (name, value) in overrides {
        // `None` names continue the previous name's value list.
        match name {
            Some(name) => {
                target.insert(name.clone(), value);
                last = Some(name);
            }
            None => {
                if let Some(name) = &last {
                    target.append(name.clone(), value);
                }
            }
        }
    }
}

// ── Json ──────────────────────────────────────────────────────────────────────

/// Serializes `T` as the response body with `content-type: application/json`.
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        Response::json(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sets_content_type() {
        let res = Json(serde_json::json!({"hello": "world"})).into_response();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body().as_ref(), br#"{"hello":"world"}"#);
    }

    #[test]
    fn unit_is_empty_without_content_type() {
        let res = ().into_response();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.body().is_empty());
        assert!(res.headers().get(header::CONTENT_TYPE).is_none());
    }

    #[test]
    fn tuple_status_and_headers_apply_over_inner() {
        let mut headers = HeaderMap::new();
        headers.insert("x-header-1", HeaderValue::from_static("tuple"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/vnd.test+json"));

        let inner = Response::builder().header("x-header-1", "inner").header("x-header-2", "inner").text("hi");
        let res = (StatusCode::CREATED, headers, inner).into_response();

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.header("x-header-1"), Some("tuple"));
        assert_eq!(res.header("x-header-2"), Some("inner"));
        assert_eq!(res.header("content-type"), Some("application/vnd.test+json"));
        assert_eq!(res.headers().get_all("x-header-1").iter().count(), 1);
    }

    #[test]
    fn result_picks_the_matching_side() {
        let ok: Result<&'static str, StatusCode> = Ok("fine");
        let err: Result<&'static str, StatusCode> = Err(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ok.into_response().status_code(), StatusCode::OK);
        assert_eq!(err.into_response().status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn builder_skips_invalid_headers() {
        let res = Response::builder().header("bad header", "x").no_body();
        assert!(res.headers().is_empty());
    }
}
