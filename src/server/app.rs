use http::Method;
use std::io;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use tracing::info;

use super::http_server::{HttpServer, ServerHandle};
use super::service::AppService;
use crate::dispatcher::{Dispatcher, RouteTable};
use crate::error::RouteError;
use crate::group::RouteGroup;
use crate::middleware::{handler, BoxHandler, Handler, Middleware, MiddlewareRegistry};
use crate::router::{Route, Router};
use crate::runtime_config::RuntimeConfig;

/// Application builder: routes, middlewares and fallbacks, then
/// [`Server::start`] or [`Server::into_dispatcher`]
///
/// ```rust
/// use trellis::{RequestContext, Server};
///
/// let mut app = Server::new();
/// app.get("/users/:id", |ctx: &mut RequestContext| {
///     let id = ctx.path_param("id").unwrap_or_default().to_string();
///     ctx.write_string(&id);
/// })
/// .unwrap();
/// let dispatcher = app.into_dispatcher();
/// let req = http::Request::builder().uri("/users/42").body(Vec::new()).unwrap();
/// assert_eq!(dispatcher.dispatch(req, None).body_str(), "42");
/// ```
pub struct Server {
    router: Router,
    middleware: MiddlewareRegistry,
    not_found: Option<BoxHandler>,
    method_not_allowed: Option<BoxHandler>,
    config: RuntimeConfig,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// The route just registered; attach route-scoped middlewares to it
pub struct RouteHandle<'a> {
    route: &'a mut Route,
}

impl RouteHandle<'_> {
    /// Append a route-scoped middleware
    pub fn middleware<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.route.add_middleware(Arc::new(middleware));
        self
    }

    #[must_use]
    pub fn route(&self) -> &Route {
        &*self.route
    }
}

impl<'a> RouteHandle<'a> {
    pub(crate) fn new(route: &'a mut Route) -> Self {
        Self { route }
    }

    pub(crate) fn route_mut(&mut self) -> &mut Route {
        &mut *self.route
    }
}

macro_rules! verb {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Register a `", stringify!($method), "` route")]
            ///
            /// # Errors
            ///
            /// See [`Server::handle`].
            pub fn $name<H>(&mut self, pattern: &str, h: H) -> Result<RouteHandle<'_>, RouteError>
            where
                H: Handler + 'static,
            {
                self.handle(Method::$method, pattern, h)
            }
        )*
    };
}

impl Server {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        let mut router = Router::new();
        router.set_slow_threshold(config.slow_route_threshold());
        Self {
            router,
            middleware: MiddlewareRegistry::new(),
            not_found: None,
            method_not_allowed: None,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Register `h` for `(method, pattern)`
    ///
    /// # Errors
    ///
    /// Any [`RouteError`] from [`Router::register`]; the server is unchanged.
    pub fn handle<H>(
        &mut self,
        method: Method,
        pattern: &str,
        h: H,
    ) -> Result<RouteHandle<'_>, RouteError>
    where
        H: Handler + 'static,
    {
        self.router
            .register(method, pattern, handler(h))
            .map(RouteHandle::new)
    }

    verb! {
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        patch => PATCH,
        head => HEAD,
        options => OPTIONS,
    }

    /// Routes registered through the group share `prefix` and the group's
    /// middlewares
    pub fn group(&mut self, prefix: &str) -> RouteGroup<'_> {
        RouteGroup::new(self, prefix)
    }

    /// Global and pattern-scoped middlewares
    pub fn middleware(&mut self) -> &mut MiddlewareRegistry {
        &mut self.middleware
    }

    /// Replace the 404 terminal
    pub fn not_found<H: Handler + 'static>(&mut self, h: H) -> &mut Self {
        self.not_found = Some(handler(h));
        self
    }

    /// Replace the 405 terminal
    pub fn method_not_allowed<H: Handler + 'static>(&mut self, h: H) -> &mut Self {
        self.method_not_allowed = Some(handler(h));
        self
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Freeze the registrations into a table for [`Dispatcher::reload`]
    #[must_use]
    pub fn into_table(self) -> RouteTable {
        let mut table = RouteTable::new(self.router, self.middleware);
        if let Some(h) = self.not_found {
            table = table.with_not_found(h);
        }
        if let Some(h) = self.method_not_allowed {
            table = table.with_method_not_allowed(h);
        }
        table
    }

    #[must_use]
    pub fn into_dispatcher(self) -> Dispatcher {
        Dispatcher::new(self.into_table())
    }

    /// Apply the runtime config and serve on `addr`
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        self.config.apply();
        let dispatcher = Arc::new(self.into_dispatcher());
        Self::serve_dispatcher(dispatcher, addr)
    }

    /// Serve an existing dispatcher, e.g. one kept for later reloads
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub fn serve_dispatcher<A: ToSocketAddrs>(
        dispatcher: Arc<Dispatcher>,
        addr: A,
    ) -> io::Result<ServerHandle> {
        let shutdown = dispatcher.shutdown_token().clone();
        let routes = dispatcher.table().router().len();
        let handle = HttpServer(AppService::new(dispatcher))
            .start_with_shutdown(addr, Some(shutdown))?;
        info!(addr = %handle.addr(), routes_count = routes, "Server started");
        Ok(handle)
    }
}
