//! # Router Module
//!
//! Path matching and route resolution.
//!
//! ## Overview
//!
//! Patterns are parsed into typed segments ([`Pattern`]) and stored in one
//! segment trie per HTTP method ([`RouteTrie`]). Lookup walks the request
//! segments with a fixed per-step preference (static, regex, parameter,
//! wildcard) and backtracks when a branch dead-ends, returning the matched
//! [`Route`] together with the captured [`ParamBag`].
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use trellis::middleware::handler;
//! use trellis::router::{Lookup, Router};
//!
//! let mut router = Router::new();
//! router
//!     .register(Method::GET, "/users/:id", handler(|_ctx: &mut trellis::RequestContext| {}))
//!     .unwrap();
//!
//! match router.lookup(&Method::GET, "/users/42") {
//!     Lookup::Found(m) => assert_eq!(m.param("id"), Some("42")),
//!     other => panic!("unexpected {other:?}"),
//! }
//! assert!(matches!(
//!     router.lookup(&Method::POST, "/users/42"),
//!     Lookup::MethodNotAllowed { .. }
//! ));
//! ```

mod core;
mod params;
mod pattern;
mod radix;
#[cfg(test)]
mod tests;

pub use core::{Lookup, Route, RouteMatch, Router, SUPPORTED_METHODS};
pub use params::{ParamBag, MAX_INLINE_PARAMS, WILDCARD_KEY};
pub use pattern::{Pattern, Segment};
pub use radix::{split_path, PathSegments, RouteTrie, TrieMatch, MAX_INLINE_SEGMENTS};
