//! Structured logging setup.
//!
//! The library only emits `tracing` events; the binary (or a host) decides
//! where they go by calling [`init_logging_with_config`] once.

use anyhow::{Context, Result};
use std::env;
use tracing::{warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Write through a background thread instead of the calling thread.
    pub async_logging: bool,
    /// Extra filter directives, comma-separated (`obs_sse_server::sse=trace`).
    pub target_filter: Option<String>,
    /// Include file:line location
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            async_logging: false,
            target_filter: None,
            include_location: false,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            log_level: lookup("OBS_SSE_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: lookup("OBS_SSE_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            async_logging: lookup("OBS_SSE_LOG_ASYNC")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.async_logging),
            target_filter: lookup("OBS_SSE_LOG_FILTER").filter(|s| !s.trim().is_empty()),
            include_location: lookup("OBS_SSE_LOG_LOCATION")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.include_location),
        }
    }

    /// Create a default configuration for local runs
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.trim().to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// `RUST_LOG` when set, else the configured level, plus any extra
    /// directives. Directives that fail to parse are skipped and returned.
    pub fn env_filter(&self) -> (EnvFilter, Vec<String>) {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        let mut rejected = Vec::new();
        if let Some(targets) = &self.target_filter {
            for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                match directive.parse() {
                    Ok(d) => filter = filter.add_directive(d),
                    Err(_) => rejected.push(directive.to_string()),
                }
            }
        }
        (filter, rejected)
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed (including by an
/// earlier call to this function).
///
/// # Example
///
/// ```no_run
/// use obs_sse_server::logging::{init_logging_with_config, LogConfig};
///
/// init_logging_with_config(&LogConfig::from_env()).expect("Failed to initialize logging");
/// ```
pub fn init_logging_with_config(config: &LogConfig) -> Result<()> {
    let (filter, rejected) = config.env_filter();
    let registry = tracing_subscriber::registry().with(filter);

    if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        let fmt_layer = match config.format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_names(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_writer(writer)
                .boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_writer(writer)
                .boxed(),
        };
        registry
            .with(fmt_layer)
            .try_init()
            .context("Failed to initialize async logging")?;
        // The writer thread must live as long as the process.
        std::mem::forget(guard);
    } else {
        let fmt_layer = match config.format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_names(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .boxed(),
        };
        registry
            .with(fmt_layer)
            .try_init()
            .context("Failed to initialize sync logging")?;
    }

    for directive in rejected {
        warn!(directive = %directive, "ignoring invalid log filter directive");
    }
    Ok(())
}
