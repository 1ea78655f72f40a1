//! Reference application: one route per dispatch feature.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example integration_app [app.toml]
//!
//! `app.toml` is optional:
//!
//! ```toml
//! counter_limit = 50
//!
//! [server]
//! bind = "127.0.0.1:18989"
//! ```
//!
//! Try:
//!   curl -X POST localhost:18989/echo -d '{"hello":"world"}'
//!   curl -X VOROJBA localhost:18989/methods
//!   curl -X POST localhost:18989/counter_protected/echo -H 'x-add-value: 30' -d hi
//!   curl -X POST localhost:18989/combined/echo -H 'x-must-be-unset: 1' -i
//!   curl localhost:18989/mirror -H 'authorization: Bearer demo-token'

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::{json, Value};
use switchyard::middleware::{
    self, CounterLimit, HeaderGuard, Identity, RequireAuth, SetResponseHeaders, StaticTokens, Trace,
};
use switchyard::{
    ContentType, Group, IntoResponse, Json, Middleware, Next, Request, Response, Router, Server,
    ServerConfig, Stack,
};

pub const UNSET: HeaderName = HeaderName::from_static("x-must-be-unset");
pub const WAS_SET: HeaderName = HeaderName::from_static("x-was-set");
pub const DEMO_TOKEN: &str = "Bearer demo-token";

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_counter_limit")]
    pub counter_limit: u64,
}

fn default_counter_limit() -> u64 {
    50
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { server: ServerConfig::default(), counter_limit: default_counter_limit() }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, switchyard::Error> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

fn main() -> Result<(), switchyard::Error> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switchyard=info,integration_app=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    tracing::info!(counter_limit = config.counter_limit, "starting reference app");

    Server::from_config(&config.server).run(app(config.counter_limit))
}

pub fn app(counter_limit: u64) -> Router {
    Router::new()
        .layer(Trace)
        .get("/echo", echo)
        .post("/echo", echo)
        .post("/json", json_echo)
        .post("/long-running", long_running)
        .get("/path/{id}/content/{another_field}/{final_field}", path_fields)
        .group(extend_group())
        .group(
            Group::new("/counter_protected")
                .layer(CounterLimit::new(counter_limit))
                .post("/echo", echo)
                .post("/json", json_echo),
        )
        .group(
            Group::new("/just_second")
                .layer(HeaderGuard::strict(UNSET))
                .layer(hop())
                .post("/echo", counted),
        )
        // The same four middleware twice: once as nested named groups, once
        // as a flat list. Both must answer identically.
        .group(
            Group::new("/combined")
                .stack(Stack::named("first").layer(HeaderGuard::report(UNSET, WAS_SET)).layer(hop()))
                .group(
                    Group::new("")
                        .stack(Stack::named("second").layer(HeaderGuard::strict(UNSET)).layer(hop()))
                        .post("/echo", counted),
                ),
        )
        .group(
            Group::new("/flat_combined")
                .layer(HeaderGuard::report(UNSET, WAS_SET))
                .layer(hop())
                .layer(HeaderGuard::strict(UNSET))
                .layer(hop())
                .post("/echo", counted),
        )
        .get("/methods", |req: Request| async move { endpoint(&req, "get_endpoint") })
        .post("/methods", |req: Request| async move { endpoint(&req, "post_endpoint") })
        .route("VOROJBA", "/methods", |req: Request| async move {
            endpoint(&req, "extension_first_endpoint")
        })
        .route("ONE_HELL_LONG_VOROJBA_EXTENSION", "/methods", |req: Request| async move {
            endpoint(&req, "extension_second_endpoint")
        })
        .group(
            Group::new("")
                .layer(RequireAuth::new(StaticTokens::new().insert(DEMO_TOKEN, "demo")))
                .get("/mirror", mirror),
        )
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// Returns the body byte for byte, labelled as JSON when it parses as JSON.
async fn echo(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::empty();
    }
    let content_type = match req.json::<IgnoredAny>() {
        Ok(_) => ContentType::Json,
        Err(_) => ContentType::OctetStream,
    };
    Response::builder().bytes(content_type, req.body().clone())
}

async fn json_echo(req: Request) -> impl IntoResponse {
    req.json::<Value>().map(Json)
}

async fn long_running(req: Request) -> Json<Value> {
    let handle_start = epoch_ms();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    let handle_end = epoch_ms();
    let request = req.json::<Value>().unwrap_or(Value::Null);
    Json(json!({ "request": request, "handle_start": handle_start, "handle_end": handle_end }))
}

async fn path_fields(req: Request) -> Json<Value> {
    Json(json!({
        "id": req.param("id"),
        "another_field": req.param("another_field"),
        "final_field": req.param("final_field"),
    }))
}

async fn counted(mut req: Request) -> Json<Value> {
    Json(json!({ "counter": bump(&mut req) }))
}

/// Reports the method token exactly as it arrived.
fn endpoint(req: &Request, name: &str) -> Json<Value> {
    Json(json!({ "method": req.method().as_str(), "endpoint": name }))
}

async fn mirror(req: Request) -> Json<Value> {
    let user = req.extensions().get::<Identity>().map(|id| id.subject.clone());
    Json(json!({ "user": user, "method": req.method().as_str(), "path": req.path() }))
}

fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
}

// ── /extend ───────────────────────────────────────────────────────────────────

fn header_map(names: &[&'static str], value: &'static str) -> HeaderMap {
    names
        .iter()
        .map(|&name| (HeaderName::from_static(name), HeaderValue::from_static(value)))
        .collect()
}

/// Handler writes 1-4 and 6; the override layer wins on 3-5; the default
/// layer only fills names nobody set, which leaves it nothing to do.
fn extend_group() -> Group {
    Group::new("")
        .layer(SetResponseHeaders::if_not_present(header_map(&["x-header-1", "x-header-6"], "default")))
        .layer(SetResponseHeaders::overriding(header_map(
            &["x-header-3", "x-header-4", "x-header-5"],
            "override",
        )))
        .post("/extend", extend)
}

async fn extend(req: Request) -> impl IntoResponse {
    let headers = header_map(&["x-header-1", "x-header-2", "x-header-3", "x-header-4", "x-header-6"], "handler");
    let body = Response::builder().bytes(ContentType::OctetStream, req.body().clone());
    (StatusCode::CREATED, headers, body)
}

// ── Per-request hop counter ───────────────────────────────────────────────────

/// How many counting layers (and the handler) this request has passed.
/// Lives in the request extensions, so it starts at zero for every request.
#[derive(Clone, Copy, Default)]
struct Hops(u64);

fn bump(req: &mut Request) -> u64 {
    let hops = req.extensions_mut().get_or_insert_default::<Hops>();
    hops.0 += 1;
    hops.0
}

fn hop() -> impl Middleware {
    middleware::from_fn(|mut req: Request, next: Next| {
        bump(&mut req);
        next.run(req)
    })
}
