//! # Runtime Configuration
//!
//! Settings for the coroutine runtime and the listener, read from a TOML file
//! and/or `TRELLIS_*` environment variables. Environment values win over the
//! file, and the file wins over the defaults.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `TRELLIS_STACK_SIZE` | `0x4000` | coroutine stack in bytes, decimal or `0x` hex |
//! | `TRELLIS_WORKERS` | CPU count | `may` scheduler threads |
//! | `TRELLIS_ADDR` | `127.0.0.1:8080` | listen address |
//! | `TRELLIS_SLOW_ROUTE_US` | `1000` | lookups slower than this are logged at warn |
//!
//! ```toml
//! stack_size = "0x8000"
//! workers = 4
//! bind_addr = "0.0.0.0:8080"
//! slow_route_us = 500
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_STACK_SIZE: usize = 0x4000;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_SLOW_ROUTE_US: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    #[serde(deserialize_with = "deserialize_size")]
    pub stack_size: usize,
    /// `None` keeps may's default of one worker per CPU
    pub workers: Option<usize>,
    pub bind_addr: String,
    pub slow_route_us: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            workers: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            slow_route_us: DEFAULT_SLOW_ROUTE_US,
        }
    }
}

/// `16384` or `0x4000`
#[must_use]
pub fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn deserialize_size<'de, D: Deserializer<'de>>(de: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Int(usize),
        Text(String),
    }
    match Size::deserialize(de)? {
        Size::Int(n) => Ok(n),
        Size::Text(s) => parse_size(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid size {s:?}"))),
    }
}

fn env_override<T>(key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let raw = env::var(key).ok()?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!(variable = key, value = %raw, "Ignoring unparseable environment override");
    }
    parsed
}

impl RuntimeConfig {
    /// Defaults with environment overrides
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load `path`, then apply environment overrides
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid config TOML.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading runtime config {}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("parsing runtime config {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    /// Parse TOML without consulting the environment
    ///
    /// # Errors
    ///
    /// Fails on invalid TOML, unknown keys or malformed sizes.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid runtime config")
    }

    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(size) = env_override("TRELLIS_STACK_SIZE", parse_size) {
            self.stack_size = size;
        }
        if let Some(workers) = env_override("TRELLIS_WORKERS", |s| s.trim().parse().ok()) {
            self.workers = Some(workers);
        }
        if let Ok(addr) = env::var("TRELLIS_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(us) = env_override("TRELLIS_SLOW_ROUTE_US", |s| s.trim().parse().ok()) {
            self.slow_route_us = us;
        }
        self
    }

    #[must_use]
    pub fn slow_route_threshold(&self) -> Duration {
        Duration::from_micros(self.slow_route_us)
    }

    /// Push stack size and worker count into the `may` runtime
    ///
    /// Must run before the first coroutine is spawned to take effect.
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
        if let Some(workers) = self.workers {
            may::config().set_workers(workers);
        }
        debug!(
            stack_size = self.stack_size,
            workers = ?self.workers,
            "Coroutine runtime configured"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("16384"), Some(16384));
        assert_eq!(parse_size("0x8000"), Some(0x8000));
        assert_eq!(parse_size(" 0X10 "), Some(16));
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn test_toml_accepts_hex_and_decimal_sizes() {
        let c = RuntimeConfig::from_toml_str("stack_size = \"0x8000\"\nworkers = 2").unwrap();
        assert_eq!(c.stack_size, 0x8000);
        assert_eq!(c.workers, Some(2));
        assert_eq!(c.bind_addr, DEFAULT_BIND_ADDR);

        let c = RuntimeConfig::from_toml_str("stack_size = 65536").unwrap();
        assert_eq!(c.stack_size, 65536);
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        assert!(RuntimeConfig::from_toml_str("stak_size = 1").is_err());
        assert!(RuntimeConfig::from_toml_str("stack_size = \"big\"").is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trellis.toml");
        std::fs::write(&path, "bind_addr = \"0.0.0.0:9000\"\nslow_route_us = 250\n").unwrap();
        let c = RuntimeConfig::from_toml_file(&path).unwrap();
        assert_eq!(c.slow_route_threshold(), Duration::from_micros(250));

        let missing = RuntimeConfig::from_toml_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(format!("{missing:#}").contains("reading runtime config"));
    }
}
