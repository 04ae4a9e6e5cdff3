use http::StatusCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::core::{BoxHandler, Middleware};
use crate::context::RequestContext;

/// Cooperative per-request deadline
///
/// Installs a deadline on the context; handlers poll
/// [`RequestContext::is_cancelled`] or [`RequestContext::time_remaining`] and
/// stop early. Nothing is interrupted. If a matched route returns after the
/// deadline without having set a status, the response becomes a 503.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineMiddleware {
    budget: Duration,
}

impl DeadlineMiddleware {
    #[must_use]
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }
}

impl Middleware for DeadlineMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        let budget = self.budget;
        Arc::new(move |ctx: &mut RequestContext| {
            let start = Instant::now();
            ctx.set_deadline(start + budget);
            next.call(ctx);

            let expired = ctx.time_remaining().is_some_and(|left| left.is_zero());
            // fallback responses keep their 404/405 and `Allow`
            let routed = ctx.matched_pattern().is_some();
            if expired && routed && !ctx.response().is_status_committed() {
                ctx.logger().warn(format_args!(
                    "deadline of {budget:?} exceeded after {:?}",
                    start.elapsed()
                ));
                ctx.response_mut()
                    .reset_for_error(StatusCode::SERVICE_UNAVAILABLE, "Request deadline exceeded");
                ctx.response_mut()
                    .set_status(StatusCode::SERVICE_UNAVAILABLE);
            }
        })
    }

    fn name(&self) -> &str {
        "deadline"
    }
}
