//! # Runtime Configuration Module
//!
//! Server settings, layered from lowest to highest precedence:
//!
//! 1. built-in defaults
//! 2. an optional YAML file
//! 3. environment variables
//! 4. command-line flags (applied by the binary)
//!
//! ## Environment Variables
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `OBS_SSE_HOST` | listen host | `127.0.0.1` |
//! | `OBS_SSE_PORT` | listen port | `8080` |
//! | `OBS_SSE_ROOT` | directory served for non-API paths | `.` |
//! | `OBS_SSE_WRITE_TIMEOUT_MS` | bound on one write to an SSE client | `500` |
//! | `OBS_SSE_POLL_INTERVAL_MS` | parked stream recheck interval | `250` |
//! | `OBS_SSE_REQUEST_TIMEOUT_MS` | time allowed to send a request head | `5000` |
//! | `OBS_SSE_HEARTBEAT_MS` | keep-alive comment interval, `0` disables | `15000` |
//!
//! ## Example Configuration
//!
//! ```yaml
//! port: 8091
//! serving_root: ./overlays
//! heartbeat_ms: 0
//! ```
//!
//! Invalid values are logged and ignored, leaving the previous layer's value.

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub serving_root: PathBuf,
    pub write_timeout: Duration,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub heartbeat_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            serving_root: PathBuf::from("."),
            write_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(250),
            request_timeout: Duration::from_secs(5),
            heartbeat_interval: Some(Duration::from_secs(15)),
        }
    }
}

/// Shape of the YAML file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub serving_root: Option<PathBuf>,
    pub write_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub heartbeat_ms: Option<u64>,
}

fn heartbeat_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl ServerConfig {
    /// Defaults with the three values a host always supplies.
    pub fn new(host: impl Into<String>, port: u16, serving_root: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            port,
            serving_root: serving_root.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| env::var(name).ok());
        config
    }

    /// Defaults, then `file` (if given), then the process environment.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid YAML for [`FileConfig`].
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(path) = file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let parsed: FileConfig = serde_yaml::from_str(&content)
                .with_context(|| format!("invalid config file {}", path.display()))?;
            config.apply_file(parsed);
        }
        config.apply_env(|name| env::var(name).ok());
        Ok(config.normalized())
    }

    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(root) = file.serving_root {
            self.serving_root = root;
        }
        if let Some(ms) = file.write_timeout_ms {
            self.write_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.heartbeat_ms {
            self.heartbeat_interval = heartbeat_from_ms(ms);
        }
    }

    /// Overlay values from `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("OBS_SSE_HOST").filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
        if let Some(port) = parsed::<u16, _>(&lookup, "OBS_SSE_PORT") {
            self.port = port;
        }
        if let Some(root) = lookup("OBS_SSE_ROOT").filter(|r| !r.is_empty()) {
            self.serving_root = PathBuf::from(root);
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "OBS_SSE_WRITE_TIMEOUT_MS") {
            self.write_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "OBS_SSE_POLL_INTERVAL_MS") {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "OBS_SSE_REQUEST_TIMEOUT_MS") {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "OBS_SSE_HEARTBEAT_MS") {
            self.heartbeat_interval = heartbeat_from_ms(ms);
        }
    }

    /// Clamp values that would make sockets or wait loops misbehave.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.poll_interval = self.poll_interval.max(MIN_POLL_INTERVAL);
        self.write_timeout = self.write_timeout.max(MIN_TIMEOUT);
        self.request_timeout = self.request_timeout.max(MIN_TIMEOUT);
        self
    }
}

fn parsed<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring invalid environment value");
            None
        }
    }
}
