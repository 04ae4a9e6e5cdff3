//! Demonstration application served by `trellis serve`

use std::time::Duration;

use crate::error::RouteError;
use crate::middleware::{
    from_fn, AuthMiddleware, DeadlineMiddleware, MetricsMiddleware, RequestIdMiddleware,
    TracingMiddleware, PRINCIPAL_KEY,
};
use crate::runtime_config::RuntimeConfig;
use crate::{RequestContext, Server};

/// Bearer token accepted on `/admin/*` unless `TRELLIS_DEMO_TOKEN` is set
pub const DEFAULT_DEMO_TOKEN: &str = "letmein";

/// Register the demo routes on a fresh [`Server`]
///
/// # Errors
///
/// Only on a registration bug; every pattern here is valid and unique.
#[allow(clippy::panic)] // `/admin/panic` exercises panic recovery
pub fn demo_server(config: RuntimeConfig) -> Result<Server, RouteError> {
    let metrics = MetricsMiddleware::new();
    let token =
        std::env::var("TRELLIS_DEMO_TOKEN").unwrap_or_else(|_| DEFAULT_DEMO_TOKEN.to_string());

    let mut app = Server::with_config(config);
    app.middleware()
        .global()
        .add(RequestIdMiddleware::new())
        .add(TracingMiddleware::new())
        .add(metrics.clone());
    app.middleware()
        .for_pattern("*", "/api/*")?
        .add(DeadlineMiddleware::new(Duration::from_secs(2)));

    app.get("/health", |ctx: &mut RequestContext| {
        ctx.write_string("ok");
    })?;
    app.get("/metrics", metrics.endpoint())?;

    app.get("/api/users/:id", |ctx: &mut RequestContext| {
        let id = ctx.path_param("id").unwrap_or_default().to_string();
        ctx.write_json(&serde_json::json!({ "id": id }));
    })?;
    app.get("/api/users/me", |ctx: &mut RequestContext| {
        ctx.write_json(&serde_json::json!({ "id": "me" }));
    })?
    .middleware(from_fn(|ctx, next| {
        ctx.set_header("cache-control", "no-store");
        next.run(ctx);
    }));
    app.post("/api/echo", |ctx: &mut RequestContext| {
        match serde_json::from_slice::<serde_json::Value>(ctx.body()) {
            Ok(value) => {
                ctx.write_json(&value);
            }
            Err(e) => {
                ctx.status(400).write_string(&format!("invalid JSON: {e}"));
            }
        }
    })?;
    app.get("/api/search", |ctx: &mut RequestContext| {
        let q = ctx.query("q").unwrap_or_default();
        ctx.write_json(&serde_json::json!({ "q": q }));
    })?;
    app.get("/static/*", |ctx: &mut RequestContext| {
        let tail = ctx.path_param("*").unwrap_or_default().to_string();
        ctx.write_string(&format!("static asset: {tail}"));
    })?;

    let mut admin = app.group("/admin");
    admin.middleware(AuthMiddleware::new([(token, "admin")]));
    admin.get("/whoami", |ctx: &mut RequestContext| {
        let who = ctx
            .user_values()
            .get_typed(PRINCIPAL_KEY)
            .map(|p| p.0.clone())
            .unwrap_or_default();
        ctx.write_string(&who);
    })?;
    admin.get("/panic", |_ctx: &mut RequestContext| {
        panic!("demo panic");
    })?;

    app.not_found(|ctx: &mut RequestContext| {
        let path = ctx.path().to_string();
        ctx.write_json(&serde_json::json!({ "error": "not found", "path": path }));
    });
    Ok(app)
}
