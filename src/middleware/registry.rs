use http::Method;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::core::{Middleware, SharedMiddleware};
use crate::error::RouteError;
use crate::router::{Pattern, RouteTrie};

/// Where a middleware applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiddlewareScope {
    /// Every request, matched or not
    Global,
    /// Requests whose method and path satisfy a filter
    Pattern,
    /// One registered route
    Route,
}

impl fmt::Display for MiddlewareScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MiddlewareScope::Global => "global",
            MiddlewareScope::Pattern => "pattern",
            MiddlewareScope::Route => "route",
        })
    }
}

/// A middleware together with its scope and position within that scope
#[derive(Clone)]
pub struct MiddlewareEntry {
    pub scope: MiddlewareScope,
    /// Insertion index within the scope
    pub index: usize,
    pub middleware: SharedMiddleware,
}

impl fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareEntry")
            .field("scope", &self.scope)
            .field("index", &self.index)
            .field("middleware", &self.middleware.name())
            .finish()
    }
}

/// Method half of a pattern-scoped filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    /// `*`
    Any,
    Only(Method),
}

impl MethodFilter {
    /// Parse `*` or a method name
    ///
    /// # Errors
    ///
    /// [`RouteError::UnsupportedMethod`] when the text is not a valid method token.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        if raw == "*" {
            return Ok(MethodFilter::Any);
        }
        Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
            .map(MethodFilter::Only)
            .map_err(|_| RouteError::UnsupportedMethod {
                method: raw.to_string(),
            })
    }

    #[inline]
    #[must_use]
    pub fn admits(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(m) => m == method,
        }
    }
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        MethodFilter::Only(method)
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFilter::Any => f.write_str("*"),
            MethodFilter::Only(m) => write!(f, "{m}"),
        }
    }
}

/// Pattern-scoped middleware and the filter it is keyed by
///
/// The path half is a single-pattern trie, so filters follow exactly the
/// same grammar and precedence as routes: `:id` is a parameter and `/api/*`
/// matches `/api` itself as well as everything below it.
#[derive(Clone)]
struct PatternEntry {
    filter: MethodFilter,
    pattern: Arc<str>,
    matcher: Arc<RouteTrie<()>>,
    entry: MiddlewareEntry,
}

/// Global and pattern-scoped middlewares in insertion order
///
/// Route-scoped middlewares live on the route itself, see
/// [`Route::add_middleware`](crate::router::Route::add_middleware).
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    global: Vec<MiddlewareEntry>,
    patterns: Vec<PatternEntry>,
}

impl MiddlewareRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for the global sub-registry
    pub fn global(&mut self) -> GlobalMiddleware<'_> {
        GlobalMiddleware { registry: self }
    }

    /// Builder for middlewares applying to `(method, pattern)`; `method` is a
    /// method name or `*`.
    ///
    /// # Errors
    ///
    /// An invalid method, or any error [`Pattern::parse`] reports for `pattern`.
    pub fn for_pattern(
        &mut self,
        method: &str,
        pattern: &str,
    ) -> Result<PatternMiddleware<'_>, RouteError> {
        let filter = MethodFilter::parse(method)?;
        self.for_filter(filter, pattern)
    }

    /// Same as [`MiddlewareRegistry::for_pattern`] with an already parsed filter
    ///
    /// # Errors
    ///
    /// Any error [`Pattern::parse`] reports for `pattern`.
    pub fn for_filter(
        &mut self,
        filter: MethodFilter,
        pattern: &str,
    ) -> Result<PatternMiddleware<'_>, RouteError> {
        let parsed = Pattern::parse(pattern)?;
        let mut matcher = RouteTrie::new();
        matcher.insert(&parsed, ())?;
        Ok(PatternMiddleware {
            registry: self,
            filter,
            pattern: Arc::clone(parsed.raw()),
            matcher: Arc::new(matcher),
        })
    }

    #[must_use]
    pub fn global_entries(&self) -> &[MiddlewareEntry] {
        &self.global
    }

    /// Pattern-scoped entries admitting `method` whose filter matches `segments`,
    /// in insertion order
    pub fn matching<'a>(
        &'a self,
        method: &'a Method,
        segments: &'a [Cow<'a, str>],
    ) -> impl Iterator<Item = &'a MiddlewareEntry> + 'a {
        self.patterns
            .iter()
            .filter(move |p| p.filter.admits(method) && p.matcher.matches(segments))
            .map(|p| &p.entry)
    }

    /// `(filter, pattern, entry)` for every pattern-scoped middleware
    pub fn pattern_entries(&self) -> impl Iterator<Item = (&MethodFilter, &str, &MiddlewareEntry)> {
        self.patterns
            .iter()
            .map(|p| (&p.filter, p.pattern.as_ref(), &p.entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.global.len() + self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistry")
            .field("global", &self.global)
            .field(
                "patterns",
                &self
                    .patterns
                    .iter()
                    .map(|p| format!("{} {}", p.filter, p.pattern))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Returned by [`MiddlewareRegistry::global`]
pub struct GlobalMiddleware<'r> {
    registry: &'r mut MiddlewareRegistry,
}

impl GlobalMiddleware<'_> {
    pub fn add<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.add_shared(Arc::new(middleware))
    }

    pub fn add_shared(&mut self, middleware: SharedMiddleware) -> &mut Self {
        let index = self.registry.global.len();
        debug!(index, middleware = middleware.name(), "Global middleware added");
        self.registry.global.push(MiddlewareEntry {
            scope: MiddlewareScope::Global,
            index,
            middleware,
        });
        self
    }
}

/// Returned by [`MiddlewareRegistry::for_pattern`]
pub struct PatternMiddleware<'r> {
    registry: &'r mut MiddlewareRegistry,
    filter: MethodFilter,
    pattern: Arc<str>,
    matcher: Arc<RouteTrie<()>>,
}

impl PatternMiddleware<'_> {
    pub fn add<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.add_shared(Arc::new(middleware))
    }

    pub fn add_shared(&mut self, middleware: SharedMiddleware) -> &mut Self {
        let index = self.registry.patterns.len();
        debug!(
            index,
            method = %self.filter,
            pattern = %self.pattern,
            middleware = middleware.name(),
            "Pattern middleware added"
        );
        self.registry.patterns.push(PatternEntry {
            filter: self.filter.clone(),
            pattern: Arc::clone(&self.pattern),
            matcher: Arc::clone(&self.matcher),
            entry: MiddlewareEntry {
                scope: MiddlewareScope::Pattern,
                index,
                middleware,
            },
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::BoxHandler;
    use crate::router::split_path;

    fn passthrough() -> impl Middleware {
        |next: BoxHandler| next
    }

    fn matching_indexes(reg: &MiddlewareRegistry, method: Method, path: &str) -> Vec<usize> {
        let segments = split_path(path);
        reg.matching(&method, &segments).map(|e| e.index).collect()
    }

    #[test]
    fn test_method_filter_parse() {
        assert_eq!(MethodFilter::parse("*").unwrap(), MethodFilter::Any);
        assert_eq!(
            MethodFilter::parse("post").unwrap(),
            MethodFilter::Only(Method::POST)
        );
        assert!(MethodFilter::parse("BAD METHOD").is_err());
        assert!(MethodFilter::Any.admits(&Method::DELETE));
        assert!(!MethodFilter::Only(Method::GET).admits(&Method::HEAD));
    }

    #[test]
    fn test_pattern_filters_use_route_grammar() {
        let mut reg = MiddlewareRegistry::new();
        reg.for_pattern("*", "/api/*").unwrap().add(passthrough());
        reg.for_pattern("GET", "/users/:id").unwrap().add(passthrough());
        reg.for_pattern("*", r"/n/:num(\d+)").unwrap().add(passthrough());

        assert_eq!(matching_indexes(&reg, Method::POST, "/api"), vec![0]);
        assert_eq!(matching_indexes(&reg, Method::POST, "/api/v1/x"), vec![0]);
        assert_eq!(matching_indexes(&reg, Method::GET, "/users/7"), vec![1]);
        assert!(matching_indexes(&reg, Method::POST, "/users/7").is_empty());
        assert!(matching_indexes(&reg, Method::GET, "/users/7/posts").is_empty());
        assert_eq!(matching_indexes(&reg, Method::GET, "/n/12"), vec![2]);
        assert!(matching_indexes(&reg, Method::GET, "/n/ab").is_empty());
    }

    #[test]
    fn test_insertion_order_across_filters() {
        let mut reg = MiddlewareRegistry::new();
        reg.for_pattern("*", "/a/*").unwrap().add(passthrough());
        reg.for_pattern("*", "/a/b").unwrap().add(passthrough());
        reg.for_pattern("*", "/a/*")
            .unwrap()
            .add(passthrough())
            .add(passthrough());
        assert_eq!(matching_indexes(&reg, Method::GET, "/a/b"), vec![0, 1, 2, 3]);
        assert_eq!(matching_indexes(&reg, Method::GET, "/a/c"), vec![0, 2, 3]);
    }

    #[test]
    fn test_bad_filter_pattern_is_rejected() {
        let mut reg = MiddlewareRegistry::new();
        assert!(reg.for_pattern("*", "api/*").is_err());
        assert!(reg.for_pattern("*", "/a/*/b").is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_global_entries_are_indexed() {
        let mut reg = MiddlewareRegistry::new();
        reg.global().add(passthrough()).add(passthrough());
        let scopes: Vec<(MiddlewareScope, usize)> = reg
            .global_entries()
            .iter()
            .map(|e| (e.scope, e.index))
            .collect();
        assert_eq!(
            scopes,
            vec![(MiddlewareScope::Global, 0), (MiddlewareScope::Global, 1)]
        );
    }
}
