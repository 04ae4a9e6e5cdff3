use std::fmt;
use std::sync::Arc;

use crate::context::RequestContext;

/// Terminal request handler
///
/// Any `Fn(&mut RequestContext) + Send + Sync` closure is a handler. The
/// context is only borrowed for the duration of the call, so a handler that
/// spawns background work must copy what it needs out of it first.
pub trait Handler: Send + Sync {
    fn call(&self, ctx: &mut RequestContext);
}

impl<F> Handler for F
where
    F: Fn(&mut RequestContext) + Send + Sync,
{
    #[inline]
    fn call(&self, ctx: &mut RequestContext) {
        self(ctx)
    }
}

/// Shared, type-erased handler; also the continuation a middleware receives
pub type BoxHandler = Arc<dyn Handler>;

/// Box a closure or handler type into a [`BoxHandler`]
pub fn handler<H>(h: H) -> BoxHandler
where
    H: Handler + 'static,
{
    Arc::new(h)
}

/// A middleware turns the next stage of the chain into a new handler
///
/// Stages are invoked outer first. Code before `next.call(ctx)` runs on the
/// way in, code after it on the way out; not calling `next` short-circuits
/// every deeper stage including the route handler.
///
/// ```rust
/// use trellis::middleware::{handler, BoxHandler, Middleware};
///
/// let timing = |next: BoxHandler| -> BoxHandler {
///     handler(move |ctx: &mut trellis::RequestContext| {
///         let start = std::time::Instant::now();
///         next.call(ctx);
///         ctx.logger().debug(format!("took {:?}", start.elapsed()));
///     })
/// };
/// # fn assert_middleware<M: Middleware>(_: &M) {}
/// # assert_middleware(&timing);
/// ```
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: BoxHandler) -> BoxHandler;

    /// Name used in chain logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Middleware for F
where
    F: Fn(BoxHandler) -> BoxHandler + Send + Sync,
{
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        self(next)
    }
}

/// Shared, type-erased middleware as stored in the registry and on routes
pub type SharedMiddleware = Arc<dyn Middleware>;

/// Continuation handed to [`from_fn`] middlewares
#[derive(Clone)]
pub struct Next {
    inner: BoxHandler,
}

impl Next {
    /// Run the rest of the chain
    #[inline]
    pub fn run(&self, ctx: &mut RequestContext) {
        self.inner.call(ctx);
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Next")
    }
}

/// Middleware built from a `(ctx, next)` closure
pub struct FnMiddleware<F> {
    f: Arc<F>,
}

/// Build a middleware from a closure receiving the context and the continuation
///
/// ```rust
/// use trellis::middleware::from_fn;
///
/// let deny_all = from_fn(|ctx, _next| {
///     ctx.status(403).write_string("forbidden");
/// });
/// # let _ = deny_all;
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut RequestContext, &Next) + Send + Sync + 'static,
{
    FnMiddleware { f: Arc::new(f) }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RequestContext, &Next) + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        let f = Arc::clone(&self.f);
        let next = Next { inner: next };
        Arc::new(move |ctx: &mut RequestContext| f(ctx, &next))
    }

    fn name(&self) -> &str {
        "from_fn"
    }
}
