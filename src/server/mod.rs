//! # Server Module
//!
//! HTTP transport on top of `may_minihttp`. Each connection is served on a
//! `may` coroutine; [`AppService`] converts the request, hands it to the
//! [`crate::dispatcher::Dispatcher`] and writes the flushed response back.
//!
//! [`Server`] is the registration front end: routes, groups, middlewares and
//! fallbacks are collected on it and frozen into a route table when it starts.
//!
//! ```rust,no_run
//! use trellis::{RequestContext, Server};
//!
//! let mut app = Server::new();
//! app.get("/health", |ctx: &mut RequestContext| {
//!     ctx.write_string("ok");
//! })
//! .unwrap();
//! let handle = app.start("127.0.0.1:8080").unwrap();
//! handle.wait_ready().unwrap();
//! handle.join().ok();
//! ```

mod app;
mod http_server;
mod request;
mod response;
mod service;

pub use app::{RouteHandle, Server};
pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_cookies, to_http_request};
pub use response::{write_response, MaySink, MAX_RESPONSE_HEADERS};
pub use service::AppService;
