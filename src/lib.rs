//! # switchyard
//!
//! An embeddable HTTP dispatch core: path and method routing, composable
//! middleware, cooperative request execution.
//!
//! ## What it does
//!
//! - Radix-tree path matching via [`matchit`], with `{name}` captures
//! - Method matching by exact token, so extension methods like `PURGE` route
//!   like `GET` does, and an unregistered token on a known path is `405`
//! - Middleware chains that can be grouped into named, nested [`Stack`]s and
//!   [`Group`]s; grouping is flattened away before the first request
//! - One task per connection on a single-threaded tokio runtime; handlers
//!   that await never block other requests
//! - Graceful shutdown on SIGTERM / Ctrl-C
//!
//! TLS, compression, streaming bodies and static files are left to the
//! proxy in front.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use switchyard::middleware::{CounterLimit, Trace};
//! use switchyard::{Group, Json, Request, Router, Server, ServerConfig};
//!
//! fn main() -> Result<(), switchyard::Error> {
//!     let app = Router::new()
//!         .layer(Trace)
//!         .get("/users/{id}", get_user)
//!         .route("PURGE", "/users/{id}", purge_user)
//!         .group(Group::new("/metered").layer(CounterLimit::new(100)).post("/echo", echo));
//!
//!     Server::from_config(&ServerConfig::default()).run(app)
//! }
//!
//! async fn get_user(req: Request) -> Json<serde_json::Value> {
//!     Json(serde_json::json!({ "id": req.param("id") }))
//! }
//!
//! async fn purge_user(_req: Request) -> http::StatusCode {
//!     http::StatusCode::NO_CONTENT
//! }
//!
//! async fn echo(req: Request) -> String {
//!     String::from_utf8_lossy(req.body()).into_owned()
//! }
//! ```

mod config;
mod error;
mod executor;
mod handler;
mod method;
mod path;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use executor::Executor;
pub use handler::{BoxFuture, Handler};
pub use method::{Method, MethodSpec};
pub use middleware::{Middleware, Next, Stack};
pub use path::{Params, PathTemplate, Segment};
pub use request::{JsonRejection, Request};
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder};
pub use router::{Group, Matched, RouteError, Router, Routes};
pub use server::Server;
