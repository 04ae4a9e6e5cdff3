use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::core::{BoxHandler, Middleware};
use crate::context::{RequestContext, TypedKey};

/// Identity established by [`AuthMiddleware`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

/// User value under which the authenticated [`Principal`] is stored
pub const PRINCIPAL_KEY: TypedKey<Principal> = TypedKey::new("principal");

/// Bearer-token check
///
/// A request without `Authorization: Bearer <token>` for a known token is
/// answered with 401 and a JSON error; the rest of the chain does not run.
/// On success the principal is put in the user values and added to the
/// request logger.
#[derive(Clone)]
pub struct AuthMiddleware {
    tokens: Arc<HashMap<String, Principal>>,
}

impl AuthMiddleware {
    /// Accept the given `(token, principal)` pairs
    pub fn new<I, T, P>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (T, P)>,
        T: Into<String>,
        P: Into<String>,
    {
        Self {
            tokens: Arc::new(
                tokens
                    .into_iter()
                    .map(|(t, p)| (t.into(), Principal(p.into())))
                    .collect(),
            ),
        }
    }

    fn authenticate(&self, ctx: &RequestContext) -> Option<&Principal> {
        let header = ctx.header("authorization")?;
        let (scheme, token) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        self.tokens.get(token.trim())
    }
}

impl Middleware for AuthMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        let auth = self.clone();
        Arc::new(move |ctx: &mut RequestContext| match auth.authenticate(ctx).cloned() {
            Some(principal) => {
                let logger = ctx.logger().with_field("principal", &principal.0);
                ctx.set_logger(logger);
                ctx.user_values_mut().insert_typed(PRINCIPAL_KEY, principal);
                next.call(ctx);
            }
            None => {
                debug!(
                    request_id = %ctx.request_id(),
                    path = %ctx.path(),
                    "Authentication failed"
                );
                ctx.status(401)
                    .set_header("www-authenticate", "Bearer")
                    .write_json(&serde_json::json!({ "error": "Unauthorized" }));
            }
        })
    }

    fn name(&self) -> &str {
        "auth"
    }
}
