use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::core::{BoxHandler, Middleware};
use crate::context::RequestContext;

/// Access log: one event per request with status and latency
///
/// Emitted inside the request span, so the request id, method and path are
/// attached by the subscriber. Server errors are logged at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for TracingMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(move |ctx: &mut RequestContext| {
            let start = Instant::now();
            next.call(ctx);
            let latency = start.elapsed();

            let status = ctx.response().status().as_u16();
            let span = ctx.logger().span().clone();
            let route = ctx.matched_pattern().unwrap_or("-");
            let principal = ctx.logger().field("principal").unwrap_or("-");
            if status >= 500 {
                warn!(
                    parent: &span,
                    status,
                    route_pattern = %route,
                    principal = %principal,
                    latency_us = latency.as_micros(),
                    "Request failed"
                );
            } else {
                info!(
                    parent: &span,
                    status,
                    route_pattern = %route,
                    principal = %principal,
                    latency_us = latency.as_micros(),
                    "Request complete"
                );
            }
        })
    }

    fn name(&self) -> &str {
        "tracing"
    }
}
