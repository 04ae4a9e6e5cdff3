//! Router core module - hot path for request routing.
//!
//! One [`RouteTrie`] per supported method. Lookup splits the path once and
//! reuses the segments for the method-not-allowed probe across the other
//! tries, so a 405 costs one trie walk per registered method and no extra
//! allocation beyond the `Allow` list.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use http::Method;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::params::ParamBag;
use super::pattern::Pattern;
use super::radix::{split_path, RouteTrie};
use crate::error::RouteError;
use crate::middleware::{BoxHandler, MiddlewareEntry, MiddlewareScope, SharedMiddleware};

/// Methods with their own trie, in the order they are listed in `Allow`
pub const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
];

/// Matches slower than this are logged at warn level
const DEFAULT_SLOW_MATCH: Duration = Duration::from_millis(1);

fn method_index(method: &Method) -> Option<usize> {
    SUPPORTED_METHODS.iter().position(|m| m == method)
}

/// A registered terminal: handler plus its route-scoped middlewares
pub struct Route {
    method: Method,
    pattern: Pattern,
    handler: BoxHandler,
    middlewares: Vec<MiddlewareEntry>,
}

impl Route {
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The pattern as registered
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub(crate) fn pattern_arc(&self) -> &Arc<str> {
        self.pattern.raw()
    }

    #[must_use]
    pub fn handler(&self) -> &BoxHandler {
        &self.handler
    }

    /// Route-scoped middlewares in attachment order
    #[must_use]
    pub fn middlewares(&self) -> &[MiddlewareEntry] {
        &self.middlewares
    }

    /// Attach a route-scoped middleware after the ones already attached
    pub fn add_middleware(&mut self, middleware: SharedMiddleware) {
        let index = self.middlewares.len();
        self.middlewares.push(MiddlewareEntry {
            scope: MiddlewareScope::Route,
            index,
            middleware,
        });
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

/// A route matched for the request method
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: ParamBag,
}

impl RouteMatch<'_> {
    /// Path parameter by name; `"*"` returns the wildcard tail
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }
}

/// Outcome of [`Router::lookup`]
#[derive(Debug)]
pub enum Lookup<'a> {
    Found(RouteMatch<'a>),
    /// The path matches under other methods, listed in `Allow` order
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

impl Lookup<'_> {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Per-method route tries
///
/// Registration takes `&mut self`; once the router is shared with the
/// dispatcher it is only ever read, so lookups need no locking.
#[derive(Debug)]
pub struct Router {
    tries: [RouteTrie<Route>; SUPPORTED_METHODS.len()],
    slow_threshold: Duration,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tries: Default::default(),
            slow_threshold: DEFAULT_SLOW_MATCH,
        }
    }

    /// Matches slower than `threshold` are logged at warn level
    pub fn set_slow_threshold(&mut self, threshold: Duration) {
        self.slow_threshold = threshold;
    }

    /// Register a handler for `(method, pattern)`.
    ///
    /// # Errors
    ///
    /// * [`RouteError::UnsupportedMethod`] for methods outside [`SUPPORTED_METHODS`]
    /// * Any pattern error from [`Pattern::parse`]
    /// * [`RouteError::RouteConflict`] / [`RouteError::DuplicateParam`] from the trie;
    ///   the existing registration is kept
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handler: BoxHandler,
    ) -> Result<&mut Route, RouteError> {
        let idx = method_index(&method).ok_or_else(|| RouteError::UnsupportedMethod {
            method: method.to_string(),
        })?;
        let parsed = Pattern::parse(pattern)?;
        let route = Route {
            method: method.clone(),
            pattern: parsed.clone(),
            handler,
            middlewares: Vec::new(),
        };
        let route = self.tries[idx]
            .insert(&parsed, route)
            .map_err(|e| e.with_method(&method))?;
        debug!(method = %method, pattern = %pattern, "Route registered");
        Ok(route)
    }

    /// The route registered for exactly this pattern, for attaching middlewares
    pub fn route_mut(&mut self, method: &Method, pattern: &str) -> Option<&mut Route> {
        let idx = method_index(method)?;
        let parsed = Pattern::parse(pattern).ok()?;
        self.tries[idx].get_mut(&parsed)
    }

    /// Match a request path under `method`
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup<'_> {
        let segments = split_path(path);
        self.lookup_segments(method, &segments, path)
    }

    /// Same as [`Router::lookup`] with the path already split; `path` is only
    /// used for logging.
    #[must_use]
    pub fn lookup_segments(
        &self,
        method: &Method,
        segments: &[Cow<'_, str>],
        path: &str,
    ) -> Lookup<'_> {
        debug!(method = %method, path = %path, "Route match attempt");
        let match_start = Instant::now();

        if let Some(idx) = method_index(method) {
            if let Some(hit) = self.tries[idx].lookup(segments) {
                let duration = match_start.elapsed();
                if duration > self.slow_threshold {
                    warn!(
                        method = %method,
                        path = %path,
                        route_pattern = %hit.pattern,
                        path_params = ?hit.params,
                        duration_us = duration.as_micros(),
                        "Slow route matching detected"
                    );
                } else {
                    debug!(
                        method = %method,
                        path = %path,
                        route_pattern = %hit.pattern,
                        path_params = ?hit.params,
                        duration_us = duration.as_micros(),
                        "Route matched"
                    );
                }
                return Lookup::Found(RouteMatch {
                    route: hit.value,
                    params: hit.params,
                });
            }
        }

        let allowed: Vec<Method> = SUPPORTED_METHODS
            .iter()
            .zip(self.tries.iter())
            .filter(|(m, trie)| *m != method && trie.matches(segments))
            .map(|(m, _)| m.clone())
            .collect();

        let duration = match_start.elapsed();
        if allowed.is_empty() {
            warn!(
                method = %method,
                path = %path,
                duration_us = duration.as_micros(),
                "No route matched"
            );
            Lookup::NotFound
        } else {
            warn!(
                method = %method,
                path = %path,
                allowed = ?allowed,
                duration_us = duration.as_micros(),
                "Method not allowed"
            );
            Lookup::MethodNotAllowed { allowed }
        }
    }

    /// Every registered route, grouped by method in [`SUPPORTED_METHODS`] order
    #[must_use]
    pub fn routes(&self) -> Vec<&Route> {
        self.tries
            .iter()
            .flat_map(|trie| trie.entries().into_iter().map(|(_, route)| route))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tries.iter().map(RouteTrie::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Log the routing table and print it to stdout
    pub fn dump_routes(&self) {
        info!(routes_count = self.len(), "Routing table");
        for route in self.routes() {
            println!(
                "[route] {:<7} {} (middlewares: {})",
                route.method(),
                route.pattern(),
                route.middlewares().len()
            );
        }
    }
}
