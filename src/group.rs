//! Route groups: a shared path prefix plus middlewares attached to every route
//! registered through the group.

use http::Method;
use std::sync::Arc;

use crate::error::RouteError;
use crate::middleware::{Handler, Middleware, SharedMiddleware};
use crate::server::{RouteHandle, Server};

/// Registration scope with a common prefix
///
/// Middlewares added with [`RouteGroup::middleware`] attach to routes
/// registered afterwards, ahead of the route's own middlewares. A nested
/// group starts with a copy of its parent's list.
pub struct RouteGroup<'s> {
    server: &'s mut Server,
    prefix: String,
    middlewares: Vec<SharedMiddleware>,
}

fn join_prefix(prefix: &str, sub: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if sub.is_empty() || sub == "/" {
        if prefix.is_empty() {
            return "/".to_string();
        }
        return prefix.to_string();
    }
    if sub.starts_with('/') {
        format!("{prefix}{sub}")
    } else {
        format!("{prefix}/{sub}")
    }
}

impl<'s> RouteGroup<'s> {
    pub(crate) fn new(server: &'s mut Server, prefix: &str) -> Self {
        Self {
            server,
            prefix: join_prefix("", prefix),
            middlewares: Vec::new(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Add a middleware for routes registered from now on
    pub fn middleware<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Register `prefix + sub`
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from registration of the joined pattern.
    pub fn handle<H>(
        &mut self,
        method: Method,
        sub: &str,
        h: H,
    ) -> Result<RouteHandle<'_>, RouteError>
    where
        H: Handler + 'static,
    {
        let pattern = join_prefix(&self.prefix, sub);
        let mut handle = self.server.handle(method, &pattern, h)?;
        let route = handle.route_mut();
        for m in &self.middlewares {
            route.add_middleware(Arc::clone(m));
        }
        Ok(handle)
    }

    pub fn get<H: Handler + 'static>(
        &mut self,
        sub: &str,
        h: H,
    ) -> Result<RouteHandle<'_>, RouteError> {
        self.handle(Method::GET, sub, h)
    }

    pub fn post<H: Handler + 'static>(
        &mut self,
        sub: &str,
        h: H,
    ) -> Result<RouteHandle<'_>, RouteError> {
        self.handle(Method::POST, sub, h)
    }

    pub fn put<H: Handler + 'static>(
        &mut self,
        sub: &str,
        h: H,
    ) -> Result<RouteHandle<'_>, RouteError> {
        self.handle(Method::PUT, sub, h)
    }

    pub fn delete<H: Handler + 'static>(
        &mut self,
        sub: &str,
        h: H,
    ) -> Result<RouteHandle<'_>, RouteError> {
        self.handle(Method::DELETE, sub, h)
    }

    pub fn patch<H: Handler + 'static>(
        &mut self,
        sub: &str,
        h: H,
    ) -> Result<RouteHandle<'_>, RouteError> {
        self.handle(Method::PATCH, sub, h)
    }

    /// Nested group; prefixes concatenate and middlewares are inherited
    pub fn group(&mut self, prefix: &str) -> RouteGroup<'_> {
        RouteGroup {
            prefix: join_prefix(&self.prefix, prefix),
            middlewares: self.middlewares.clone(),
            server: &mut *self.server,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::join_prefix;

    #[test]
    fn test_join_prefix() {
        assert_eq!(join_prefix("/api", "/users"), "/api/users");
        assert_eq!(join_prefix("/api/", "/users"), "/api/users");
        assert_eq!(join_prefix("/api", "users"), "/api/users");
        assert_eq!(join_prefix("/api", "/"), "/api");
        assert_eq!(join_prefix("", "/"), "/");
        assert_eq!(join_prefix("", "v1"), "/v1");
    }
}
