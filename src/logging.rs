//! Logging setup
//!
//! Everything in the crate logs through `tracing` macros with structured
//! fields. This module installs a subscriber for binaries: an [`EnvFilter`],
//! a JSON or pretty `fmt` layer, a [`SamplingLayer`] that thins out
//! low-severity events, and optionally a `tracing-appender` non-blocking
//! writer so the request path never waits on stdout.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `TRELLIS_LOG_LEVEL` | `info` | base level when `RUST_LOG` is unset |
//! | `TRELLIS_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `TRELLIS_LOG_SAMPLING_MODE` | `all` | `all`, `error-only` or `sampled` |
//! | `TRELLIS_LOG_SAMPLING_RATE` | `1.0` | kept fraction of sub-warn events when sampled |
//! | `TRELLIS_LOG_ASYNC` | `true` | buffer output on a background thread |
//! | `TRELLIS_LOG_TARGET_FILTER` | unset | extra comma-separated filter directives |
//! | `TRELLIS_LOG_INCLUDE_LOCATION` | `false` | add file and line to each event |

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Level, Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Unknown values fall back to JSON
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("pretty") {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

/// Which events survive the [`SamplingLayer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    All,
    /// WARN and ERROR only
    ErrorOnly,
    /// WARN and ERROR always, a fraction of everything else
    Sampled,
}

impl SamplingMode {
    /// Unknown values fall back to [`SamplingMode::All`]
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "error-only" | "error_only" => SamplingMode::ErrorOnly,
            "sampled" => SamplingMode::Sampled,
            _ => SamplingMode::All,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub sampling_mode: SamplingMode,
    pub sampling_rate: f64,
    pub async_logging: bool,
    pub target_filter: Option<String>,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            sampling_mode: SamplingMode::All,
            sampling_rate: 1.0,
            async_logging: true,
            target_filter: None,
            include_location: false,
        }
    }
}

fn env_parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl LogConfig {
    /// Defaults overridden by `TRELLIS_LOG_*`
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level: env::var("TRELLIS_LOG_LEVEL").unwrap_or(defaults.level),
            format: env::var("TRELLIS_LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.format),
            sampling_mode: env::var("TRELLIS_LOG_SAMPLING_MODE")
                .map(|v| SamplingMode::parse(&v))
                .unwrap_or(defaults.sampling_mode),
            sampling_rate: env_parsed("TRELLIS_LOG_SAMPLING_RATE")
                .unwrap_or(defaults.sampling_rate),
            async_logging: env_parsed("TRELLIS_LOG_ASYNC").unwrap_or(defaults.async_logging),
            target_filter: env::var("TRELLIS_LOG_TARGET_FILTER").ok(),
            include_location: env_parsed("TRELLIS_LOG_INCLUDE_LOCATION")
                .unwrap_or(defaults.include_location),
        }
    }

    /// Human-readable, synchronous, everything at debug
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            include_location: true,
            ..Self::default()
        }
    }
}

/// Drops a share of sub-warn events
///
/// In [`SamplingMode::Sampled`] the n-th eligible event is kept when
/// `floor(n * rate)` advances, so the kept share converges on `rate` without
/// randomness.
pub struct SamplingLayer {
    mode: SamplingMode,
    rate: f64,
    seen: AtomicU64,
}

impl SamplingLayer {
    #[must_use]
    pub fn new(mode: SamplingMode, rate: f64) -> Self {
        Self {
            mode,
            rate: rate.clamp(0.0, 1.0),
            seen: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn admits(&self, level: &Level) -> bool {
        let severe = *level <= Level::WARN;
        match self.mode {
            SamplingMode::All => true,
            SamplingMode::ErrorOnly => severe,
            SamplingMode::Sampled => {
                if severe {
                    return true;
                }
                let n = self.seen.fetch_add(1, Ordering::Relaxed) as f64;
                ((n + 1.0) * self.rate).floor() > (n * self.rate).floor()
            }
        }
    }
}

impl<S> Layer<S> for SamplingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: LayerContext<'_, S>) -> bool {
        // spans stay enabled so request context is never lost
        !metadata.is_event() || self.admits(metadata.level())
    }
}

/// Keeps the background writer alive; drop it last to flush buffered lines
#[must_use = "dropping the guard stops the background log writer"]
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_ascii_lowercase()));
    // connection-level noise from the transport
    if let Ok(directive) = "may_minihttp=warn".parse() {
        filter = filter.add_directive(directive);
    }
    if let Some(extra) = &config.target_filter {
        for raw in extra.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match raw.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => eprintln!("ignoring log filter directive {raw:?}: {e}"),
            }
        }
    }
    filter
}

/// Install the global subscriber described by `config`
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<LoggingGuard> {
    let (writer, worker) = if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(writer),
            Some(guard),
        )
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(SamplingLayer::new(config.sampling_mode, config.sampling_rate))
        .with(fmt_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(LoggingGuard { _worker: worker })
}

/// [`init_logging_with_config`] with [`LogConfig::from_env`]
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging() -> Result<LoggingGuard> {
    init_logging_with_config(&LogConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_and_mode_parsing() {
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
        assert_eq!(SamplingMode::parse("error_only"), SamplingMode::ErrorOnly);
        assert_eq!(SamplingMode::parse("Sampled"), SamplingMode::Sampled);
        assert_eq!(SamplingMode::parse("bogus"), SamplingMode::All);
    }

    #[test]
    fn test_error_only_keeps_warn_and_error() {
        let layer = SamplingLayer::new(SamplingMode::ErrorOnly, 1.0);
        assert!(layer.admits(&Level::ERROR));
        assert!(layer.admits(&Level::WARN));
        assert!(!layer.admits(&Level::INFO));
        assert!(!layer.admits(&Level::TRACE));
    }

    #[test]
    fn test_sampled_share_converges() {
        let layer = SamplingLayer::new(SamplingMode::Sampled, 0.25);
        let kept = (0..1000).filter(|_| layer.admits(&Level::INFO)).count();
        assert_eq!(kept, 250);
        assert!((0..10).all(|_| layer.admits(&Level::ERROR)));
    }

    #[test]
    fn test_rate_is_clamped() {
        assert_eq!(SamplingLayer::new(SamplingMode::Sampled, 3.0).rate(), 1.0);
        assert_eq!(SamplingLayer::new(SamplingMode::Sampled, -1.0).rate(), 0.0);
        let none = SamplingLayer::new(SamplingMode::Sampled, 0.0);
        assert!(!(0..50).any(|_| none.admits(&Level::DEBUG)));
    }

    #[test]
    fn test_development_preset() {
        let config = LogConfig::development();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.async_logging);
        assert_eq!(config.sampling_mode, SamplingMode::All);
    }
}
