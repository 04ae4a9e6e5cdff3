use super::{Lookup, Router};
use crate::error::RouteError;
use crate::middleware::{handler, BoxHandler};
use http::Method;

fn noop() -> BoxHandler {
    handler(|_ctx: &mut crate::RequestContext| {})
}

fn found_pattern(router: &Router, method: Method, path: &str) -> Option<String> {
    match router.lookup(&method, path) {
        Lookup::Found(m) => Some(m.route.pattern().to_string()),
        _ => None,
    }
}

#[test]
fn test_methods_have_independent_tries() {
    let mut router = Router::new();
    router.register(Method::GET, "/x/:id", noop()).unwrap();
    router.register(Method::POST, "/x/:name", noop()).unwrap();
    assert_eq!(found_pattern(&router, Method::GET, "/x/1").unwrap(), "/x/:id");
    assert_eq!(
        found_pattern(&router, Method::POST, "/x/1").unwrap(),
        "/x/:name"
    );
}

#[test]
fn test_method_not_allowed_lists_methods_in_order() {
    let mut router = Router::new();
    router.register(Method::DELETE, "/x", noop()).unwrap();
    router.register(Method::GET, "/x", noop()).unwrap();
    router.register(Method::POST, "/x", noop()).unwrap();
    match router.lookup(&Method::PUT, "/x") {
        Lookup::MethodNotAllowed { allowed } => {
            assert_eq!(allowed, vec![Method::GET, Method::POST, Method::DELETE]);
        }
        other => panic!("expected 405, got {other:?}"),
    }
}

#[test]
fn test_unknown_method_is_405_only_when_path_exists() {
    let mut router = Router::new();
    router.register(Method::GET, "/x", noop()).unwrap();
    let purge = Method::from_bytes(b"PURGE").unwrap();
    assert!(matches!(
        router.lookup(&purge, "/x"),
        Lookup::MethodNotAllowed { .. }
    ));
    assert!(matches!(router.lookup(&purge, "/y"), Lookup::NotFound));
}

#[test]
fn test_register_unsupported_method() {
    let mut router = Router::new();
    let err = router
        .register(Method::TRACE, "/x", noop())
        .unwrap_err();
    assert!(matches!(err, RouteError::UnsupportedMethod { .. }));
}

#[test]
fn test_conflict_names_method_and_keeps_first() {
    let mut router = Router::new();
    router.register(Method::GET, "/users/:id", noop()).unwrap();
    let err = router
        .register(Method::GET, "/users/:id/", noop())
        .unwrap_err();
    match err {
        RouteError::RouteConflict {
            method,
            existing,
            attempted,
        } => {
            assert_eq!(method, "GET");
            assert_eq!(existing, "/users/:id");
            assert_eq!(attempted, "/users/:id/");
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    // same pattern under another method is fine
    router.register(Method::PUT, "/users/:id", noop()).unwrap();
    assert_eq!(router.len(), 2);
}

#[test]
fn test_route_mut_attaches_middleware() {
    let mut router = Router::new();
    router.register(Method::GET, "/a/:id", noop()).unwrap();
    let route = router.route_mut(&Method::GET, "/a/:id").unwrap();
    route.add_middleware(std::sync::Arc::new(|next: BoxHandler| next));
    assert_eq!(router.routes()[0].middlewares().len(), 1);
    assert!(router.route_mut(&Method::GET, "/a/:other").is_none());
    assert!(router.route_mut(&Method::POST, "/a/:id").is_none());
}

#[test]
fn test_routes_grouped_by_method() {
    let mut router = Router::new();
    router.register(Method::POST, "/b", noop()).unwrap();
    router.register(Method::GET, "/b", noop()).unwrap();
    router.register(Method::GET, "/a", noop()).unwrap();
    let listed: Vec<String> = router
        .routes()
        .iter()
        .map(|r| format!("{} {}", r.method(), r.pattern()))
        .collect();
    assert_eq!(listed, vec!["GET /a", "GET /b", "POST /b"]);
}

#[test]
fn test_many_routes_resolve_to_their_own_handler() {
    let mut router = Router::new();
    for i in 0..500 {
        router
            .register(Method::GET, &format!("/api/v1/resource{i}/:id"), noop())
            .unwrap();
    }
    for i in [0, 137, 250, 499] {
        let path = format!("/api/v1/resource{i}/123");
        match router.lookup(&Method::GET, &path) {
            Lookup::Found(m) => {
                assert_eq!(m.route.pattern(), format!("/api/v1/resource{i}/:id"));
                assert_eq!(m.param("id"), Some("123"));
            }
            other => panic!("{path}: {other:?}"),
        }
    }
    assert!(matches!(
        router.lookup(&Method::GET, "/api/v1/resource500/1"),
        Lookup::NotFound
    ));
}

#[test]
fn test_params_are_percent_decoded() {
    let mut router = Router::new();
    router.register(Method::GET, "/tags/:tag", noop()).unwrap();
    match router.lookup(&Method::GET, "/tags/caf%C3%A9") {
        Lookup::Found(m) => assert_eq!(m.param("tag"), Some("café")),
        other => panic!("{other:?}"),
    }
}
