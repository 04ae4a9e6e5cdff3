//! # Dispatcher Module
//!
//! Top-level request entry point.
//!
//! ## Request Flow
//!
//! 1. Build a [`RequestContext`](crate::RequestContext): request id, request
//!    logger, empty user values, a child of the server cancellation token
//! 2. Look the path up in the method's trie
//! 3. Pick the terminal: the matched handler with its parameters bound, or
//!    the not-found / method-not-allowed handler with a default 404 / 405
//!    status (plus `Allow`)
//! 4. Compose global, pattern-scoped and route-scoped middlewares around it
//! 5. Invoke the chain; a panic anywhere in it is caught here, logged, and
//!    turned into a 500 unless user code already set a status
//! 6. Flush the buffered response exactly once
//!
//! The route table lives behind an `ArcSwap`, so lookups take no lock and
//! [`Dispatcher::reload`] can publish a new table without stopping the server.

mod core;

pub use core::{Dispatcher, HandlerResponse, ResponseSink, RouteTable};
