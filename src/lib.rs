//! # trellis
//!
//! **trellis** is the request-routing and middleware-dispatch core of an HTTP
//! framework, running on the `may` coroutine runtime through `may_minihttp`.
//!
//! ## Overview
//!
//! - **[`router`]** - pattern parsing and one segment trie per method;
//!   static segments beat regex segments, which beat `:params`, which beat
//!   the `*` wildcard, with backtracking
//! - **[`middleware`]** - onion middlewares in three scopes (global,
//!   method/pattern filter, single route) plus built-ins for request ids,
//!   access logs, metrics, bearer auth and deadlines
//! - **[`context`]** - the per-request [`RequestContext`]: request accessors,
//!   path/query/form/cookie values, a buffered response, typed user values,
//!   a request logger and cooperative cancellation
//! - **[`dispatcher`]** - lookup, chain assembly, panic recovery and the
//!   single flush of each request, over a hot-swappable route table
//! - **[`server`]** - the [`Server`] registration front end and the
//!   `may_minihttp` transport
//! - **[`group`]** - prefix groups sharing middlewares
//! - **[`logging`]**, **[`runtime_config`]**, **[`cli`]** - binary plumbing
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Service as AppService<br/>(may_minihttp)
//!     participant Dispatcher
//!     participant Router
//!     participant Chain as Middleware chain
//!     participant Handler
//!
//!     Client->>Service: GET /users/42
//!     Service->>Dispatcher: http::Request
//!     Dispatcher->>Dispatcher: RequestContext<br/>(request id, logger, token)
//!     Dispatcher->>Router: lookup(GET, /users/42)
//!     alt No route for any method
//!         Router-->>Dispatcher: NotFound (404 terminal)
//!     else Other methods only
//!         Router-->>Dispatcher: MethodNotAllowed (405 + Allow)
//!     else
//!         Router-->>Dispatcher: Found(route, {id: 42})
//!     end
//!     Dispatcher->>Chain: global → pattern → route
//!     Chain->>Handler: call(ctx)
//!     Handler-->>Chain: writes buffered response
//!     Chain-->>Dispatcher: unwinds outer-last
//!     Note over Dispatcher: panic → 500 unless<br/>a status was committed
//!     Dispatcher-->>Service: HandlerResponse (flushed once)
//!     Service-->>Client: 200 OK
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis::middleware::{from_fn, RequestIdMiddleware};
//! use trellis::{RequestContext, Server};
//!
//! let mut app = Server::new();
//! app.middleware().global().add(RequestIdMiddleware::new());
//! app.get("/users/:id", |ctx: &mut RequestContext| {
//!     let id = ctx.path_param("id").unwrap_or_default().to_string();
//!     ctx.write_json(&serde_json::json!({ "id": id }));
//! })
//! .unwrap()
//! .middleware(from_fn(|ctx, next| {
//!     next.run(ctx);
//!     ctx.set_header("cache-control", "no-store");
//! }));
//!
//! let dispatcher = app.into_dispatcher();
//! let req = http::Request::builder().uri("/users/42").body(Vec::new()).unwrap();
//! let res = dispatcher.dispatch(req, None);
//! assert_eq!(res.status, 200);
//! assert_eq!(res.body_str(), r#"{"id":"42"}"#);
//! ```
//!
//! ## Runtime Considerations
//!
//! Each connection runs on a `may` coroutine and the whole chain runs
//! synchronously on it. Handlers should use `may`'s blocking facilities rather
//! than tokio. The coroutine stack size comes from `TRELLIS_STACK_SIZE` or the
//! runtime config file.

pub mod cli;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod group;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use context::{RequestContext, TypedKey};
pub use dispatcher::{Dispatcher, HandlerResponse, RouteTable};
pub use error::RouteError;
pub use group::RouteGroup;
pub use ids::RequestId;
pub use middleware::{from_fn, handler, BoxHandler, Handler, Middleware};
pub use router::{Lookup, Router};
pub use server::{RouteHandle, Server, ServerHandle};
