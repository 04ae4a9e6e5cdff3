//! # Middleware Module
//!
//! A middleware turns the next stage of a chain into a new handler
//! (`(next) -> handler`). Middlewares are registered in three scopes:
//!
//! - **global**, applied to every request,
//! - **pattern**, applied when the request method and path satisfy a
//!   `(method | *, pattern)` filter,
//! - **route**, attached to one registered route.
//!
//! [`ChainBuilder`] orders them global, pattern, route (each in insertion
//! order) and folds them around the terminal handler, so the first stage is
//! the outermost layer and the stages unwind in reverse.
//!
//! Built-ins: [`RequestIdMiddleware`], [`TracingMiddleware`],
//! [`MetricsMiddleware`], [`AuthMiddleware`] and [`DeadlineMiddleware`].

mod auth;
mod chain;
mod core;
mod metrics;
mod registry;
mod request_id;
mod timeout;
mod tracing;

pub use self::core::{
    from_fn, handler, BoxHandler, FnMiddleware, Handler, Middleware, Next, SharedMiddleware,
};
pub use self::tracing::TracingMiddleware;
pub use auth::{AuthMiddleware, Principal, PRINCIPAL_KEY};
pub use chain::ChainBuilder;
pub use metrics::{MetricsEndpoint, MetricsMiddleware};
pub use registry::{
    GlobalMiddleware, MethodFilter, MiddlewareEntry, MiddlewareRegistry, MiddlewareScope,
    PatternMiddleware,
};
pub use request_id::{RequestIdMiddleware, REQUEST_ID_KEY};
pub use timeout::DeadlineMiddleware;
