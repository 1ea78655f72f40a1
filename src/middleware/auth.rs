//! Authentication gate.
//!
//! switchyard does not verify credentials itself. [`RequireAuth`] hands the
//! raw credential header to an [`IdentityProvider`] and stores the resulting
//! [`Identity`] in the request extensions for handlers to read.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::{header, HeaderName, StatusCode};

use super::{Middleware, Next, Rejection};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::IntoResponse;

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
}

/// Resolves a credential string to an [`Identity`].
///
/// Implementations may suspend (e.g. to call a remote identity service);
/// other requests keep running meanwhile.
pub trait IdentityProvider: Send + Sync + 'static {
    fn identify<'a>(
        &'a self,
        credentials: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Identity>> + Send + 'a>>;
}

/// In-memory provider mapping exact credential strings to subjects.
#[derive(Clone, Debug, Default)]
pub struct StaticTokens(HashMap<String, String>);

impl StaticTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, credentials: impl Into<String>, subject: impl Into<String>) -> Self {
        self.0.insert(credentials.into(), subject.into());
        self
    }
}

impl IdentityProvider for StaticTokens {
    fn identify<'a>(
        &'a self,
        credentials: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<Identity>> + Send + 'a>> {
        let identity = self.0.get(credentials).map(|subject| Identity { subject: subject.clone() });
        Box::pin(async move { identity })
    }
}

/// Rejects requests without valid credentials.
///
/// Rejections use the `{"detail": …}` body shape:
///
/// | Case | Default response |
/// |---|---|
/// | header missing | `401 {"detail": "Authentication header was not provided"}` |
/// | provider returns `None` | `401 {"detail": "Invalid authentication credentials"}` |
#[derive(Clone)]
pub struct RequireAuth {
    provider: Arc<dyn IdentityProvider>,
    header: HeaderName,
    missing: Rejection,
    invalid: Rejection,
}

impl RequireAuth {
    pub fn new(provider: impl IdentityProvider) -> Self {
        Self {
            provider: Arc::new(provider),
            header: header::AUTHORIZATION,
            missing: Rejection::detail(StatusCode::UNAUTHORIZED, "Authentication header was not provided"),
            invalid: Rejection::detail(StatusCode::UNAUTHORIZED, "Invalid authentication credentials"),
        }
    }

    pub fn header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    pub fn on_missing(mut self, rejection: Rejection) -> Self {
        self.missing = rejection;
        self
    }

    pub fn on_invalid(mut self, rejection: Rejection) -> Self {
        self.invalid = rejection;
        self
    }
}

impl Middleware for RequireAuth {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let credentials = match req.headers().get(&self.header).map(|v| v.to_str()) {
            Some(Ok(credentials)) => credentials.to_owned(),
            Some(Err(_)) => {
                let response = self.invalid.clone().into_response();
                return Box::pin(async move { response });
            }
            None => {
                tracing::debug!(header = %self.header, "authentication header missing");
                let response = self.missing.clone().into_response();
                return Box::pin(async move { response });
            }
        };

        let provider = Arc::clone(&self.provider);
        let invalid = self.invalid.clone();
        Box::pin(async move {
            match provider.identify(&credentials).await {
                Some(identity) => {
                    req.extensions_mut().insert(identity);
                    next.run(req).await
                }
                None => {
                    tracing::debug!("credentials rejected by identity provider");
                    invalid.into_response()
                }
            }
        })
    }
}
