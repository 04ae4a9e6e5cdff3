//! Routing behaviour through the public API: precedence, parameter capture,
//! wildcards, backtracking and method handling.

use http::{Method, StatusCode};
use trellis::router::{Lookup, Router};
use trellis::{handler, BoxHandler, RequestContext, RouteError, Server};

mod common;
use common::dispatch;

fn noop() -> BoxHandler {
    handler(|_ctx: &mut RequestContext| {})
}

fn echo_params(ctx: &mut RequestContext) {
    let mut parts: Vec<String> = ctx
        .params()
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    parts.insert(0, ctx.matched_pattern().unwrap_or("-").to_string());
    let body = parts.join(" ");
    ctx.write_string(&body);
}

fn matched(router: &Router, method: Method, path: &str) -> Option<(String, Vec<(String, String)>)> {
    match router.lookup(&method, path) {
        Lookup::Found(m) => Some((
            m.route.pattern().to_string(),
            m.params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )),
        _ => None,
    }
}

#[test]
fn test_param_capture() {
    let mut app = Server::new();
    app.get("/users/:id", echo_params).unwrap();
    let res = dispatch(app, Method::GET, "/users/42");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body_str(), "/users/:id id=42");
}

#[test]
fn test_static_beats_param() {
    let mut app = Server::new();
    app.get("/users/:id", echo_params).unwrap();
    app.get("/users/me", echo_params).unwrap();
    let dispatcher = app.into_dispatcher();

    let me = dispatcher.dispatch(common::request(Method::GET, "/users/me"), None);
    assert_eq!(me.body_str(), "/users/me");
    let other = dispatcher.dispatch(common::request(Method::GET, "/users/42"), None);
    assert_eq!(other.body_str(), "/users/:id id=42");
}

#[test]
fn test_registration_order_does_not_change_precedence() {
    let mut router = Router::new();
    router.register(Method::GET, "/files/*", noop()).unwrap();
    router.register(Method::GET, "/files/:name", noop()).unwrap();
    router.register(Method::GET, "/files/readme", noop()).unwrap();

    assert_eq!(matched(&router, Method::GET, "/files/readme").unwrap().0, "/files/readme");
    assert_eq!(matched(&router, Method::GET, "/files/a").unwrap().0, "/files/:name");
    assert_eq!(matched(&router, Method::GET, "/files/a/b").unwrap().0, "/files/*");
}

#[test]
fn test_wildcard_tail() {
    let mut app = Server::new();
    app.get("/files/*", |ctx: &mut RequestContext| {
        let tail = format!("[{}]", ctx.path_param("*").unwrap_or("<none>"));
        ctx.write_string(&tail);
    })
    .unwrap();
    let dispatcher = app.into_dispatcher();

    let deep = dispatcher.dispatch(common::request(Method::GET, "/files/a/b/c"), None);
    assert_eq!(deep.body_str(), "[a/b/c]");
    let empty = dispatcher.dispatch(common::request(Method::GET, "/files/"), None);
    assert_eq!(empty.body_str(), "[]");
    let bare = dispatcher.dispatch(common::request(Method::GET, "/files"), None);
    assert_eq!(bare.body_str(), "[]");
}

#[test]
fn test_method_not_allowed_with_allow_header() {
    let mut app = Server::new();
    app.get("/x", |_ctx: &mut RequestContext| {}).unwrap();
    app.post("/x", |_ctx: &mut RequestContext| {}).unwrap();
    let res = dispatch(app, Method::PUT, "/x");
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.header("allow"), Some("GET, POST"));
    assert_eq!(res.body_str(), "Method Not Allowed");
}

#[test]
fn test_regex_segment_beats_plain_param() {
    let mut router = Router::new();
    router.register(Method::GET, "/items/:slug", noop()).unwrap();
    router.register(Method::GET, r"/items/:num(\d+)", noop()).unwrap();

    let (pattern, params) = matched(&router, Method::GET, "/items/123").unwrap();
    assert_eq!(pattern, r"/items/:num(\d+)");
    assert_eq!(params, vec![("num".to_string(), "123".to_string())]);

    let (pattern, params) = matched(&router, Method::GET, "/items/abc").unwrap();
    assert_eq!(pattern, "/items/:slug");
    assert_eq!(params, vec![("slug".to_string(), "abc".to_string())]);
}

#[test]
fn test_regex_is_anchored_to_whole_segment() {
    let mut router = Router::new();
    router.register(Method::GET, r"/v/:n(\d+)", noop()).unwrap();
    assert!(matched(&router, Method::GET, "/v/12").is_some());
    assert!(matched(&router, Method::GET, "/v/12a").is_none());
}

#[test]
fn test_backtracking_undoes_captured_params() {
    let mut router = Router::new();
    router.register(Method::GET, "/a/static/x", noop()).unwrap();
    router.register(Method::GET, "/a/:p/y", noop()).unwrap();

    let (pattern, params) = matched(&router, Method::GET, "/a/static/y").unwrap();
    assert_eq!(pattern, "/a/:p/y");
    assert_eq!(params, vec![("p".to_string(), "static".to_string())]);

    let (pattern, params) = matched(&router, Method::GET, "/a/static/x").unwrap();
    assert_eq!(pattern, "/a/static/x");
    assert!(params.is_empty());
}

#[test]
fn test_param_does_not_match_empty_segment() {
    let mut router = Router::new();
    router.register(Method::GET, "/users/:id", noop()).unwrap();
    assert!(matches!(router.lookup(&Method::GET, "/users/"), Lookup::NotFound));
    assert!(matches!(router.lookup(&Method::GET, "/users"), Lookup::NotFound));
}

#[test]
fn test_matching_is_case_sensitive() {
    let mut router = Router::new();
    router.register(Method::GET, "/Users", noop()).unwrap();
    assert!(matched(&router, Method::GET, "/Users").is_some());
    assert!(matched(&router, Method::GET, "/users").is_none());
}

#[test]
fn test_trailing_slash_is_the_same_route() {
    let mut router = Router::new();
    router.register(Method::GET, "/docs/", noop()).unwrap();
    assert!(matched(&router, Method::GET, "/docs").is_some());
    assert!(matched(&router, Method::GET, "/docs/").is_some());
    assert!(matches!(
        router.register(Method::GET, "/docs", noop()),
        Err(RouteError::RouteConflict { .. })
    ));
}

#[test]
fn test_root_route() {
    let mut router = Router::new();
    router.register(Method::GET, "/", noop()).unwrap();
    assert_eq!(matched(&router, Method::GET, "/").unwrap().0, "/");
    assert!(matched(&router, Method::GET, "/x").is_none());
}

#[test]
fn test_registration_errors() {
    let mut router = Router::new();
    assert!(matches!(
        router.register(Method::GET, "users", noop()),
        Err(RouteError::PatternSyntax { .. })
    ));
    assert!(matches!(
        router.register(Method::GET, "/a/*/b", noop()),
        Err(RouteError::WildcardNotLast { .. })
    ));
    assert!(matches!(
        router.register(Method::GET, "/a/:id/b/:id", noop()),
        Err(RouteError::DuplicateParam { .. })
    ));
    assert!(matches!(
        router.register(Method::GET, "/a/:id(", noop()),
        Err(RouteError::PatternSyntax { .. })
    ));

    router.register(Method::GET, "/p/:id", noop()).unwrap();
    match router.register(Method::GET, "/p/:id", noop()) {
        Err(RouteError::RouteConflict {
            method,
            existing,
            attempted,
        }) => {
            assert_eq!(method, "GET");
            assert_eq!(existing, "/p/:id");
            assert_eq!(attempted, "/p/:id");
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert!(matches!(
        router.register(Method::GET, "/p/:name", noop()),
        Err(RouteError::DuplicateParam { .. })
    ));
    assert_eq!(router.len(), 1);
}

#[test]
fn test_error_display_names_the_pattern() {
    let err = Router::new()
        .register(Method::GET, "/a/*/b", noop())
        .unwrap_err();
    assert!(err.to_string().contains("/a/*/b"));
}
