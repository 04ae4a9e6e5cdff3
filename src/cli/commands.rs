use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use http::Method;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::demo::demo_server;
use crate::router::{Lookup, Router};
use crate::runtime_config::RuntimeConfig;
use crate::server::Server;

/// Command-line interface for the trellis demonstration app
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(about = "Trie router and middleware dispatcher demo", long_about = None)]
pub struct Cli {
    /// TOML runtime config; `TRELLIS_*` variables override it
    #[arg(short, long, global = true, env = "TRELLIS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the demo app until SIGINT or SIGTERM
    Serve {
        /// Listen address; defaults to the configured `bind_addr`
        #[arg(long)]
        addr: Option<String>,
    },
    /// Print the demo routing table
    Routes,
    /// Show how a request would be routed
    Match {
        /// Request method, e.g. GET
        method: String,
        /// Request path, e.g. /api/users/42
        path: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<RuntimeConfig> {
    match path {
        Some(p) => RuntimeConfig::from_toml_file(p),
        None => Ok(RuntimeConfig::from_env()),
    }
}

/// Human-readable routing outcome, as printed by `trellis match`
#[must_use]
pub fn describe_match(router: &Router, method: &Method, path: &str) -> String {
    match router.lookup(method, path) {
        Lookup::Found(m) => {
            let params = m
                .params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(" ");
            format!(
                "200 {} {} -> {} [{}] middlewares={}",
                method,
                path,
                m.route.pattern(),
                params,
                m.route.middlewares().len()
            )
        }
        Lookup::MethodNotAllowed { allowed } => {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            format!("405 {method} {path} (Allow: {allow})")
        }
        Lookup::NotFound => format!("404 {method} {path}"),
    }
}

/// Execute the parsed command
///
/// # Errors
///
/// Config loading, route registration, binding and signal setup failures.
pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.bind_addr.clone());
            config.apply();
            let dispatcher = Arc::new(
                demo_server(config)
                    .context("registering demo routes")?
                    .into_dispatcher(),
            );
            let handle = Server::serve_dispatcher(Arc::clone(&dispatcher), addr.as_str())
                .with_context(|| format!("binding {addr}"))?;
            handle.wait_ready().context("waiting for listener")?;
            wait_for_shutdown_signal()?;
            info!(addr = %handle.addr(), "Shutdown signal received");
            handle.stop();
            Ok(())
        }
        Commands::Routes => {
            let app = demo_server(config).context("registering demo routes")?;
            app.router().dump_routes();
            Ok(())
        }
        Commands::Match { method, path } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|e| anyhow!("invalid method {method:?}: {e}"))?;
            let app = demo_server(config).context("registering demo routes")?;
            println!("{}", describe_match(app.router(), &method, &path));
            Ok(())
        }
    }
}

/// Parse `std::env::args` and run
///
/// # Errors
///
/// See [`run`].
pub fn run_cli() -> Result<()> {
    run(Cli::parse())
}

#[cfg(unix)]
fn wait_for_shutdown_signal() -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("installing signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Signal received");
    }
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown_signal() -> Result<()> {
    // no signal-hook here; serve until the process is killed
    loop {
        std::thread::park();
    }
}
