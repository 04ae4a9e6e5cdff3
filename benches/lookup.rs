use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use std::hint::black_box;
use trellis::middleware::handler;
use trellis::router::Router;
use trellis::{Dispatcher, RequestContext, Server};

const ROUTES: &[(Method, &str)] = &[
    (Method::GET, "/"),
    (Method::GET, "/zoo/animals"),
    (Method::POST, "/zoo/animals"),
    (Method::GET, "/zoo/animals/:id"),
    (Method::PUT, "/zoo/animals/:id"),
    (Method::DELETE, "/zoo/animals/:id"),
    (Method::GET, "/zoo/animals/me"),
    (Method::GET, r"/zoo/animals/:id(\d+)/toys/:toy_id"),
    (Method::GET, "/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id"),
    (Method::POST, "/inventory/:warehouse/feeds/:feed/items/:item/batches/:batch"),
    (Method::GET, "/complex/:a/:b/:c/:d/:e/:f/:g/:h/:i"),
    (Method::GET, "/static/*"),
];

const PATHS: &[(Method, &str)] = &[
    (Method::GET, "/zoo/animals/123"),
    (Method::GET, "/zoo/animals/me"),
    (Method::GET, "/zoo/animals/123/toys/456"),
    (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
    (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
    (Method::GET, "/complex/1/2/3/4/5/6/7/8/9"),
    (Method::GET, "/static/css/site/main.css"),
    (Method::GET, "/missing/path"),
];

fn build_router() -> Router {
    let mut router = Router::new();
    for (method, pattern) in ROUTES {
        router
            .register(method.clone(), pattern, handler(|_ctx: &mut RequestContext| {}))
            .unwrap();
    }
    router
}

fn build_dispatcher() -> Dispatcher {
    let mut app = Server::new();
    for (method, pattern) in ROUTES {
        app.handle(method.clone(), pattern, |ctx: &mut RequestContext| {
            ctx.write_string("ok");
        })
        .unwrap();
    }
    app.middleware().global().add(|next: trellis::BoxHandler| next);
    app.into_dispatcher()
}

fn bench_lookup(c: &mut Criterion) {
    let router = build_router();
    c.bench_function("router_lookup", |b| {
        b.iter(|| {
            for (method, path) in PATHS {
                black_box(router.lookup(method, black_box(path)));
            }
        })
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let dispatcher = build_dispatcher();
    c.bench_function("dispatch_param_route", |b| {
        b.iter(|| {
            let req = http::Request::builder()
                .uri("/zoo/animals/123")
                .body(Vec::new())
                .unwrap();
            black_box(dispatcher.dispatch(req, None))
        })
    });
}

criterion_group!(benches, bench_lookup, bench_dispatch);
criterion_main!(benches);
