//! Dispatcher core module - hot path for request dispatch.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]

use arc_swap::ArcSwap;
use http::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::context::{CancellationToken, RequestContext, TEXT_PLAIN};
use crate::middleware::{handler, BoxHandler, ChainBuilder, MiddlewareRegistry};
use crate::router::{split_path, Lookup, Router};

/// Flushed response handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HandlerResponse {
    /// Plain-text response
    #[must_use]
    pub fn text(status: StatusCode, body: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        Self {
            status,
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as text, lossily decoded
    #[must_use]
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Transport side of a flush
pub trait ResponseSink {
    /// Write status, headers and body. Called exactly once per request.
    ///
    /// # Errors
    ///
    /// Any I/O error from the underlying transport.
    fn send(&mut self, response: HandlerResponse) -> io::Result<()>;
}

impl ResponseSink for Option<HandlerResponse> {
    fn send(&mut self, response: HandlerResponse) -> io::Result<()> {
        *self = Some(response);
        Ok(())
    }
}

fn default_not_found() -> BoxHandler {
    handler(|ctx: &mut RequestContext| {
        ctx.write_string("Not Found");
    })
}

fn default_method_not_allowed() -> BoxHandler {
    handler(|ctx: &mut RequestContext| {
        ctx.write_string("Method Not Allowed");
    })
}

/// Everything the dispatcher reads while serving: routes, middlewares and
/// the fallback terminals
pub struct RouteTable {
    router: Router,
    middleware: MiddlewareRegistry,
    not_found: BoxHandler,
    method_not_allowed: BoxHandler,
}

impl RouteTable {
    #[must_use]
    pub fn new(router: Router, middleware: MiddlewareRegistry) -> Self {
        Self {
            router,
            middleware,
            not_found: default_not_found(),
            method_not_allowed: default_method_not_allowed(),
        }
    }

    /// Terminal for unmatched paths; status defaults to 404
    #[must_use]
    pub fn with_not_found(mut self, handler: BoxHandler) -> Self {
        self.not_found = handler;
        self
    }

    /// Terminal for paths registered under other methods; status defaults to
    /// 405 and `Allow` is already set
    #[must_use]
    pub fn with_method_not_allowed(mut self, handler: BoxHandler) -> Self {
        self.method_not_allowed = handler;
        self
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn middleware(&self) -> &MiddlewareRegistry {
        &self.middleware
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.router.len())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Top-level request entry point
///
/// The route table is published through an [`ArcSwap`], so serving needs no
/// lock and [`Dispatcher::reload`] can replace the whole table while
/// requests are in flight; each request keeps the table it started with.
pub struct Dispatcher {
    table: ArcSwap<RouteTable>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        info!(
            routes_count = table.router.len(),
            middleware_count = table.middleware.len(),
            "Route table published"
        );
        Self {
            table: ArcSwap::from_pointee(table),
            shutdown: CancellationToken::new(),
        }
    }

    /// Atomically replace the route table
    pub fn reload(&self, table: RouteTable) {
        info!(
            routes_count = table.router.len(),
            middleware_count = table.middleware.len(),
            "Route table reloaded"
        );
        self.table.store(Arc::new(table));
    }

    /// The table new requests are served from
    #[must_use]
    pub fn table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Parent of every request's cancellation token
    #[must_use]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Run one request through lookup, chain and flush
    #[must_use]
    pub fn dispatch(
        &self,
        request: http::Request<Vec<u8>>,
        remote_addr: Option<SocketAddr>,
    ) -> HandlerResponse {
        let table = self.table.load();
        let start = Instant::now();

        let mut ctx = RequestContext::new(request, remote_addr);
        ctx.set_cancellation(self.shutdown.child_token());
        let request_id = ctx.request_id();
        let method: Method = ctx.method().clone();
        let path = ctx.path().to_owned();
        let segments = split_path(&path);

        let (route, terminal) = match table.router.lookup_segments(&method, &segments, &path) {
            Lookup::Found(m) => {
                ctx.bind_route(Arc::clone(m.route.pattern_arc()), m.params);
                (Some(m.route), Arc::clone(m.route.handler()))
            }
            Lookup::MethodNotAllowed { allowed } => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                let response = ctx.response_mut();
                response.set_default_status(StatusCode::METHOD_NOT_ALLOWED);
                response.set_header(ALLOW.as_str(), &allow);
                (None, Arc::clone(&table.method_not_allowed))
            }
            Lookup::NotFound => {
                ctx.response_mut()
                    .set_default_status(StatusCode::NOT_FOUND);
                (None, Arc::clone(&table.not_found))
            }
        };

        let builder = ChainBuilder::for_request(&table.middleware, &method, &segments, route);
        debug!(
            request_id = %request_id,
            stages = builder.len(),
            matched = route.is_some(),
            "Invoking chain"
        );
        let chain = builder.build(terminal);

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| chain.call(&mut ctx))) {
            let panic_message = panic_message(panic.as_ref());
            let committed = ctx.response().is_status_committed();
            error!(
                request_id = %request_id,
                method = %method,
                path = %path,
                route_pattern = ?ctx.matched_pattern(),
                panic_message = %panic_message,
                status_committed = committed,
                "Handler panicked - recovered"
            );
            if !committed {
                ctx.response_mut()
                    .reset_for_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
            }
        }

        let response = ctx.response_mut().finish().unwrap_or_else(|| {
            error!(request_id = %request_id, "Response flushed before dispatch completed");
            HandlerResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        });
        debug!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = response.status.as_u16(),
            body_bytes = response.body.len(),
            duration_us = start.elapsed().as_micros(),
            "Request dispatched"
        );
        response
    }

    /// Dispatch and flush into `sink`
    ///
    /// # Errors
    ///
    /// Whatever the sink reports while writing.
    pub fn serve<S: ResponseSink + ?Sized>(
        &self,
        request: http::Request<Vec<u8>>,
        remote_addr: Option<SocketAddr>,
        sink: &mut S,
    ) -> io::Result<()> {
        let response = self.dispatch(request, remote_addr);
        sink.send(response)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("table", &*self.table.load())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> Cow<'_, str> {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        Cow::Borrowed(s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        Cow::Borrowed(s.as_str())
    } else {
        Cow::Borrowed("non-string panic payload")
    }
}
