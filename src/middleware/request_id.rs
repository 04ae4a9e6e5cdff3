use std::sync::Arc;

use super::core::{BoxHandler, Middleware};
use crate::context::{RequestContext, TypedKey};
use crate::ids::{RequestId, REQUEST_ID_HEADER};

/// User value holding the request id
pub const REQUEST_ID_KEY: TypedKey<RequestId> = TypedKey::new("request_id");

/// Exposes the request id to the rest of the chain and echoes it back
///
/// The id itself is assigned by the dispatcher, taken from an inbound
/// `x-request-id` when that is a valid ULID. This stage stores it as a user
/// value, adds it as a logger field and sets the response header.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdMiddleware;

impl RequestIdMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestIdMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(move |ctx: &mut RequestContext| {
            let id = ctx.request_id();
            ctx.user_values_mut().insert_typed(REQUEST_ID_KEY, id);
            let logger = ctx.logger().with_field("request_id", id);
            ctx.set_logger(logger);
            ctx.set_header(REQUEST_ID_HEADER, &id.to_string());
            next.call(ctx);
        })
    }

    fn name(&self) -> &str {
        "request_id"
    }
}
