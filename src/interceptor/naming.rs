//! Transaction naming.
//!
//! # Responsibilities
//! - Compose "METHOD ROUTE" names
//! - Prefer a route template over the raw path when the framework exposes one
//!
//! # Design Decisions
//! - Route metadata is probed once at the framework boundary and reduced to
//!   an `Option<&str>`; the resolver never inspects framework types
//! - An empty template counts as absent

use axum::extract::MatchedPath;
use axum::http::Request;

/// Route template attached to a request by a framework adapter.
///
/// Takes precedence over axum's own `MatchedPath`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOrigin(String);

impl RouteOrigin {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn pattern(&self) -> &str {
        &self.0
    }
}

/// Route template for `request`, if any layer of the stack knows it.
pub fn route_origin<B>(request: &Request<B>) -> Option<&str> {
    let extensions = request.extensions();
    extensions
        .get::<RouteOrigin>()
        .map(RouteOrigin::pattern)
        .filter(|pattern| !pattern.is_empty())
        .or_else(|| {
            extensions
                .get::<MatchedPath>()
                .map(MatchedPath::as_str)
                .filter(|pattern| !pattern.is_empty())
        })
}

/// Build a transaction name from method and route (or raw path).
pub fn transaction_name(method: &str, route_origin: Option<&str>, raw_path: &str) -> String {
    let target = route_origin
        .filter(|pattern| !pattern.is_empty())
        .unwrap_or(raw_path);
    format!("{method} {target}")
}
