//! Route table.
//!
//! Routes are declared on a [`Router`] (optionally through nested
//! [`Group`]s) at startup, then frozen with [`Router::build`] into
//! [`Routes`]. `Routes` has no mutating API; it is shared read-only by every
//! connection task.
//!
//! Each method token gets its own radix tree of path templates, so a request
//! is matched only against the templates registered for its exact token.
//! The same path can carry `GET`, `POST` and any number of extension
//! methods. A second tree holding every template regardless of method keeps
//! the two failure modes distinct:
//!
//! | Outcome | Response |
//! |---|---|
//! | no template matches the path | `404 Not Found` |
//! | some template matches, none for this method | `405 Method Not Allowed` + `allow` |

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use http::{header, HeaderValue, StatusCode};
use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::method::{Method, MethodSpec};
use crate::middleware::{Chain, Middleware, Stack};
use crate::path::{Params, PathTemplate};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

macro_rules! verb_shortcuts {
    ($($name:ident => $method:ident, $wire:literal;)*) => {
        $(
            #[doc = concat!("Registers a `", $wire, "` route.")]
            pub fn $name(self, path: &str, handler: impl Handler) -> Self {
                self.on(Method::$method, path, handler)
            }
        )*
    };
}

// ── Group ─────────────────────────────────────────────────────────────────────

struct RouteDef {
    method: MethodSpec,
    path: PathTemplate,
    layers: Stack,
    handler: BoxedHandler,
}

/// A set of routes sharing a path prefix and a middleware stack.
///
/// Groups nest. When a child group is merged into its parent, each child
/// route gets the child prefix prepended and the child's layers wrapped
/// around it; the parent's own prefix and layers are applied the same way
/// when the parent is merged in turn. Layers wrap every route of the group
/// regardless of registration order, outer group first:
///
/// ```rust
/// use switchyard::middleware::Trace;
/// use switchyard::{Group, Request, Router};
///
/// async fn handler(_req: Request) -> &'static str { "ok" }
///
/// // Chain for POST /api/v1/items: [Trace, (v1 layers…), handler]
/// let app = Router::new().group(
///     Group::new("/api")
///         .layer(Trace)
///         .group(Group::new("/v1").post("/items", handler)),
/// );
/// ```
pub struct Group {
    prefix: PathTemplate,
    layers: Stack,
    routes: Vec<RouteDef>,
    errors: Vec<Error>,
}

impl Group {
    /// `prefix` may be empty for a group that only adds middleware.
    pub fn new(prefix: &str) -> Self {
        let mut group = Self {
            prefix: PathTemplate::root(),
            layers: Stack::new(),
            routes: Vec::new(),
            errors: Vec::new(),
        };
        if !prefix.is_empty() {
            match PathTemplate::parse(prefix) {
                Ok(prefix) => group.prefix = prefix,
                Err(e) => group.errors.push(e),
            }
        }
        group
    }

    /// Registers a handler for an arbitrary method token, standard or not.
    pub fn route(mut self, method: &str, path: &str, handler: impl Handler) -> Self {
        match MethodSpec::parse(method) {
            Ok(method) => self.add(method, path, handler),
            Err(e) => {
                self.errors.push(e);
                self
            }
        }
    }

    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method.into(), path, handler)
    }

    verb_shortcuts! {
        get     => Get,     "GET";
        post    => Post,    "POST";
        put     => Put,     "PUT";
        patch   => Patch,   "PATCH";
        delete  => Delete,  "DELETE";
        head    => Head,    "HEAD";
        options => Options, "OPTIONS";
    }

    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push_layer(Arc::new(middleware));
        self
    }

    pub fn stack(mut self, stack: Stack) -> Self {
        self.layers.push_stack(stack);
        self
    }

    pub fn group(mut self, child: Group) -> Self {
        let Group { prefix, layers, routes, errors } = child;
        self.errors.extend(errors);
        for route in routes {
            match route.path.nest_under(&prefix) {
                Ok(path) => {
                    let mut wrapped = layers.clone();
                    wrapped.push_stack(route.layers);
                    self.routes.push(RouteDef { path, layers: wrapped, ..route });
                }
                Err(e) => self.errors.push(e),
            }
        }
        self
    }

    fn add(mut self, method: MethodSpec, path: &str, handler: impl Handler) -> Self {
        match PathTemplate::parse(path) {
            Ok(path) => self.routes.push(RouteDef {
                method,
                path,
                layers: Stack::new(),
                handler: handler.into_boxed_handler(),
            }),
            Err(e) => self.errors.push(e),
        }
        self
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The application router: a root [`Group`] plus [`build`](Router::build).
///
/// Each registration returns `self` so calls chain. Registration errors
/// (malformed templates, invalid method tokens) are collected and reported
/// by `build`.
///
/// ```rust
/// # use switchyard::{Request, Router};
/// # async fn get_user(_: Request) -> &'static str { "" }
/// # async fn purge(_: Request) -> &'static str { "" }
/// let routes = Router::new()
///     .get("/users/{id}", get_user)
///     .route("PURGE", "/users/{id}", purge)
///     .build()
///     .unwrap();
/// ```
pub struct Router {
    root: Group,
}

impl Router {
    pub fn new() -> Self {
        Self { root: Group::new("") }
    }

    pub fn route(self, method: &str, path: &str, handler: impl Handler) -> Self {
        Self { root: self.root.route(method, path, handler) }
    }

    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        Self { root: self.root.on(method, path, handler) }
    }

    verb_shortcuts! {
        get     => Get,     "GET";
        post    => Post,    "POST";
        put     => Put,     "PUT";
        patch   => Patch,   "PATCH";
        delete  => Delete,  "DELETE";
        head    => Head,    "HEAD";
        options => Options, "OPTIONS";
    }

    /// Wraps every route, including ones registered later.
    pub fn layer(self, middleware: impl Middleware) -> Self {
        Self { root: self.root.layer(middleware) }
    }

    pub fn stack(self, stack: Stack) -> Self {
        Self { root: self.root.stack(stack) }
    }

    pub fn group(self, group: Group) -> Self {
        Self { root: self.root.group(group) }
    }

    /// Validates every registration and freezes the table.
    ///
    /// Fails on the first registration error, on a `(method, template)` pair
    /// registered twice, or on templates the index cannot tell apart (e.g.
    /// `/users/{id}` next to `/users/{name}`).
    pub fn build(self) -> Result<Routes, Error> {
        let Group { layers, routes, errors, .. } = self.root;
        if let Some(e) = errors.into_iter().next() {
            return Err(e);
        }

        let mut index = MatchitRouter::new();
        let mut trees: Vec<MethodTree> = Vec::new();
        let mut by_method: HashMap<String, usize> = HashMap::new();
        let mut endpoints: Vec<Endpoint> = Vec::new();
        let mut templates: HashSet<String> = HashSet::new();

        for route in routes {
            let template = route.path.to_string();
            if templates.insert(template.clone()) {
                index
                    .insert(template.clone(), ())
                    .map_err(|source| Error::RouteConflict { template: template.clone(), source })?;
            }

            let slot = *by_method.entry(route.method.to_string()).or_insert_with(|| {
                trees.push(MethodTree { method: route.method.clone(), tree: MatchitRouter::new() });
                trees.len() - 1
            });
            match trees[slot].tree.insert(template.clone(), endpoints.len()) {
                Ok(()) => {}
                Err(matchit::InsertError::Conflict { with }) if with == template => {
                    return Err(Error::DuplicateRoute { method: route.method.to_string(), template });
                }
                Err(source) => return Err(Error::RouteConflict { template, source }),
            }

            let mut stack = layers.clone();
            stack.push_stack(route.layers);
            let chain = Arc::new(Chain::new(stack.flatten(), route.handler));
            tracing::debug!(method = %route.method, path = %template, layers = chain.len(), "route registered");
            endpoints.push(Endpoint { method: route.method, template: route.path, chain });
        }

        Ok(Routes { index, trees, by_method, endpoints })
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

// ── Routes ────────────────────────────────────────────────────────────────────

struct Endpoint {
    method: MethodSpec,
    template: PathTemplate,
    chain: Arc<Chain>,
}

/// Every template registered for one method token.
struct MethodTree {
    method: MethodSpec,
    tree: MatchitRouter<usize>,
}

/// The frozen route table produced by [`Router::build`].
pub struct Routes {
    /// Every template regardless of method; only separates 404 from 405.
    index: MatchitRouter<()>,
    trees: Vec<MethodTree>,
    by_method: HashMap<String, usize>,
    endpoints: Vec<Endpoint>,
}

impl Routes {
    /// Resolves a method token and path to a route.
    ///
    /// Only templates registered for `method` take part in path matching,
    /// so `GET /items/new` reaches `GET /items/{id}` even when
    /// `/items/new` itself is registered for `POST` alone.
    pub fn dispatch(&self, method: &http::Method, path: &str) -> Result<Matched<'_>, RouteError> {
        let found = self
            .by_method
            .get(method.as_str())
            .and_then(|&slot| self.trees[slot].tree.at(path).ok());
        if let Some(found) = found {
            if let Some(endpoint) = self.endpoints.get(*found.value) {
                return Ok(Matched { endpoint, params: found.params.iter().collect() });
            }
        }

        if self.index.at(path).is_err() {
            return Err(RouteError::NotFound);
        }
        let allowed = self
            .trees
            .iter()
            .filter(|t| t.tree.at(path).is_ok())
            .map(|t| t.method.to_string())
            .collect();
        Err(RouteError::MethodNotAllowed { allowed })
    }

    /// Every registered `(method, template)` pair, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&MethodSpec, &PathTemplate)> {
        self.endpoints.iter().map(|e| (&e.method, &e.template))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// A successful [`Routes::dispatch`].
pub struct Matched<'a> {
    endpoint: &'a Endpoint,
    params: Params,
}

impl<'a> Matched<'a> {
    pub fn template(&self) -> &'a PathTemplate { &self.endpoint.template }
    pub fn method(&self) -> &'a MethodSpec { &self.endpoint.method }
    pub fn params(&self) -> &Params { &self.params }

    /// Runs the route's chain for `req`, with the captured params attached.
    pub fn run(self, mut req: Request) -> BoxFuture {
        req.params = self.params;
        self.endpoint.chain.start().run(req)
    }
}

/// Why a request matched no route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteError {
    NotFound,
    /// The path exists, but not for this method. `allowed` lists the
    /// registered tokens in registration order.
    MethodNotAllowed { allowed: Vec<String> },
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => Response::status(StatusCode::NOT_FOUND),
            Self::MethodNotAllowed { allowed } => {
                let mut res = Response::status(StatusCode::METHOD_NOT_ALLOWED);
                if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                    res.headers_mut().insert(header::ALLOW, value);
                }
                res
            }
        }
    }
}
