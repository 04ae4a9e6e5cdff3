use http::Method;
use smallvec::SmallVec;
use std::borrow::Cow;
use tracing::trace;

use super::core::BoxHandler;
use super::registry::{MiddlewareEntry, MiddlewareRegistry};
use crate::router::Route;

/// Most chains carry fewer stages than this and never allocate the stage list
const INLINE_STAGES: usize = 8;

/// The ordered stages applying to one request
///
/// Order is global, then pattern-scoped, then route-scoped, each in
/// insertion order. [`ChainBuilder::build`] folds them around the terminal
/// handler so the first stage is the outermost layer.
#[derive(Debug)]
pub struct ChainBuilder<'a> {
    stages: SmallVec<[&'a MiddlewareEntry; INLINE_STAGES]>,
}

impl<'a> ChainBuilder<'a> {
    /// Collect the stages for `method` and the split request path.
    ///
    /// `route` is the matched route; pass `None` for not-found and
    /// method-not-allowed terminals, which still run the global and
    /// pattern-scoped stages.
    #[must_use]
    pub fn for_request(
        registry: &'a MiddlewareRegistry,
        method: &'a Method,
        segments: &'a [Cow<'a, str>],
        route: Option<&'a Route>,
    ) -> Self {
        let mut stages: SmallVec<[&'a MiddlewareEntry; INLINE_STAGES]> = SmallVec::new();
        stages.extend(registry.global_entries());
        stages.extend(registry.matching(method, segments));
        if let Some(route) = route {
            stages.extend(route.middlewares());
        }
        Self { stages }
    }

    pub fn stages(&self) -> impl Iterator<Item = &MiddlewareEntry> {
        self.stages.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Compose the stages around `terminal`
    #[must_use]
    pub fn build(&self, terminal: BoxHandler) -> BoxHandler {
        self.stages.iter().rev().fold(terminal, |next, entry| {
            trace!(
                scope = %entry.scope,
                index = entry.index,
                middleware = entry.middleware.name(),
                "Wrapping chain stage"
            );
            entry.middleware.wrap(next)
        })
    }
}
