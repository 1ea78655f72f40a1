//! Header-presence guard with a per-route policy.

use http::{HeaderName, HeaderValue, StatusCode};

use super::{Middleware, Next, Rejection};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::IntoResponse;

/// What a [`HeaderGuard`] does once it knows whether the header is present.
#[derive(Clone, Debug)]
pub enum Policy {
    /// Presence is a client error; answer with the rejection.
    Strict(Rejection),
    /// Never reject. Strip the header before the inner chain runs and report
    /// `true` / `false` in `outcome_header` on the way out.
    Report { outcome_header: HeaderName },
}

/// Checks whether one specific header is present on the request.
///
/// The predicate is the same for every instance; the [`Policy`] decides
/// whether a hit rejects the request or is merely reported. Putting a
/// reporting guard outside a strict guard for the same header lets the
/// request through, since the reporting guard removes the header first:
///
/// ```rust
/// use http::HeaderName;
/// use switchyard::middleware::HeaderGuard;
/// use switchyard::{Group, Request};
///
/// const UNSET: HeaderName = HeaderName::from_static("x-must-be-unset");
/// const WAS_SET: HeaderName = HeaderName::from_static("x-was-set");
///
/// let group = Group::new("/combined")
///     .layer(HeaderGuard::report(UNSET, WAS_SET))
///     .layer(HeaderGuard::strict(UNSET))
///     .post("/echo", |_req: Request| async { "ok" });
/// ```
#[derive(Clone, Debug)]
pub struct HeaderGuard {
    header: HeaderName,
    policy: Policy,
}

impl HeaderGuard {
    /// Rejects with `400 {"error": "Header must be unset"}` when present.
    pub fn strict(header: HeaderName) -> Self {
        let rejection = Rejection::error(StatusCode::BAD_REQUEST, "Header must be unset");
        Self { header, policy: Policy::Strict(rejection) }
    }

    pub fn report(header: HeaderName, outcome_header: HeaderName) -> Self {
        Self { header, policy: Policy::Report { outcome_header } }
    }

    pub fn with_policy(header: HeaderName, policy: Policy) -> Self {
        Self { header, policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn is_present(&self, req: &Request) -> bool {
        req.headers().contains_key(&self.header)
    }
}

impl Middleware for HeaderGuard {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let present = self.is_present(&req);
        match &self.policy {
            Policy::Strict(rejection) => {
                if present {
                    tracing::debug!(header = %self.header, "rejecting request carrying forbidden header");
                    let response = rejection.clone().into_response();
                    return Box::pin(async move { response });
                }
                next.run(req)
            }
            Policy::Report { outcome_header } => {
                req.headers_mut().remove(&self.header);
                let outcome_header = outcome_header.clone();
                Box::pin(async move {
                    let mut res = next.run(req).await;
                    let outcome = HeaderValue::from_static(if present { "true" } else { "false" });
                    res.headers_mut().insert(outcome_header, outcome);
                    res
                })
            }
        }
    }
}
