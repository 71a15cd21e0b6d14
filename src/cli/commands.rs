use crate::logging::{self, LogConfig, LogFormat};
use crate::runtime_config::ServerConfig;
use crate::state::ServerState;
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Json,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Pretty => LogFormat::Pretty,
        }
    }
}

/// Serve overlay files and an event stream for OBS browser sources.
///
/// Without a host application, stdin stands in for it: an empty line is a
/// hotkey press, any other line is sent as trigger text.
#[derive(Debug, Parser)]
#[command(name = "obs-sse-server", version, about, long_about = None)]
pub struct Cli {
    /// YAML config file
    #[arg(short, long, env = "OBS_SSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen host (overrides config and environment)
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port; 0 picks a free one
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory served for non-API paths
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// trace/debug/info/warn/error
    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Do not read triggers from stdin
    #[arg(long, default_value_t = false)]
    pub no_stdin: bool,
}

impl Cli {
    /// Apply flags on top of an already layered config.
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(root) = &self.root {
            config.serving_root = root.clone();
        }
    }

    pub fn apply_logging(&self, config: &mut LogConfig) {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.format = format.into();
        }
    }
}

/// What the stand-in host asks of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Hotkey,
    Text(String),
    Shutdown,
}

impl HostCommand {
    /// Interpret one stdin line.
    pub fn from_line(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            HostCommand::Hotkey
        } else {
            HostCommand::Text(line.to_string())
        }
    }
}

fn spawn_stdin_reader(tx: mpsc::Sender<HostCommand>) -> io::Result<()> {
    thread::Builder::new()
        .name("stdin-triggers".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(HostCommand::from_line(&line)).is_err() {
                    return;
                }
            }
            debug!("stdin closed, no more triggers from it");
        })?;
    Ok(())
}

#[cfg(unix)]
fn spawn_signal_listener(tx: mpsc::Sender<HostCommand>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "received shutdown signal");
                tx.send(HostCommand::Shutdown).ok();
            }
        })?;
    Ok(())
}

#[cfg(not(unix))]
fn spawn_signal_listener(_tx: mpsc::Sender<HostCommand>) -> anyhow::Result<()> {
    Ok(())
}

/// Drive `state` from `commands` until a shutdown request or until every
/// sender is gone. The server is stopped before returning.
pub fn run_host_loop(state: &ServerState, commands: mpsc::Receiver<HostCommand>) {
    for command in commands {
        match command {
            HostCommand::Hotkey => {
                state.on_hotkey_pressed();
            }
            HostCommand::Text(text) => {
                state.on_external_trigger(&text);
            }
            HostCommand::Shutdown => break,
        }
    }
    state.stop();
}

/// Entry point of the `obs-sse-server` binary.
///
/// # Errors
///
/// Fails if logging cannot be initialized, the config file is invalid or the
/// server cannot start.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let mut log_config = LogConfig::from_env();
    cli.apply_logging(&mut log_config);
    logging::init_logging_with_config(&log_config)?;

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    let state = ServerState::new();
    let addr = state
        .start_with_config(&config)
        .with_context(|| format!("failed to start on {}:{}", config.host, config.port))?;
    info!(addr = %addr, root = %config.serving_root.display(), "OBS status: http://{addr}/status");

    let (tx, rx) = mpsc::channel();
    spawn_signal_listener(tx.clone())?;
    // With stdin disabled, hold a sender so the loop waits for a signal.
    let _idle = if cli.no_stdin {
        Some(tx)
    } else {
        spawn_stdin_reader(tx).context("failed to start stdin reader")?;
        None
    };

    run_host_loop(&state, rx);
    info!("OBS SSE server exited");
    Ok(())
}
