//! # CLI Module
//!
//! Command-line front end for running the server without a host
//! application.
//!
//! ```bash
//! obs-sse-server --root ./overlays --port 8080
//! obs-sse-server --config server.yaml --log-format pretty
//! ```
//!
//! Flags override the config file and `OBS_SSE_*` environment variables.
//! While running, each line on stdin is a trigger: an empty line presses the
//! hotkey, anything else is broadcast as text. SIGINT or SIGTERM stops the
//! server and waits for every connection to close.

mod commands;


pub use commands::{run_cli, run_host_loop, Cli, HostCommand, LogFormatArg};
