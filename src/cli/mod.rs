//! # CLI Module
//!
//! The `trellis` binary wraps a small demonstration application:
//!
//! ```bash
//! # serve until SIGINT / SIGTERM
//! trellis serve --addr 127.0.0.1:8080
//!
//! # print the routing table
//! trellis routes
//!
//! # show how a request would be routed
//! trellis match GET /api/users/42
//! trellis --config trellis.toml match DELETE /health
//! ```
//!
//! Logging is configured through `TRELLIS_LOG_*` (see [`crate::logging`]) and
//! the runtime through `--config` and `TRELLIS_*` (see
//! [`crate::runtime_config`]).

mod commands;
mod demo;


pub use commands::{describe_match, run, run_cli, Cli, Commands};
pub use demo::{demo_server, DEFAULT_DEMO_TOKEN};
