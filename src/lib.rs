//! # OBS SSE Server
//!
//! An embedded HTTP/1.1 server for OBS overlays. It serves browser-source files
//! from a local directory and pushes Server-Sent Events to every connected
//! browser whenever the host application reports a hotkey press or a text
//! update.
//!
//! ## Architecture
//!
//! - **[`state`]** - [`ServerState`], the start/stop lifecycle a host owns
//! - **[`server`]** - listener, accept loop and one thread per connection
//! - **[`router`]** - exact-path dispatch to [`router::Handler`]s
//! - **[`handlers`]** - status pages and static files
//! - **[`sse`]** - connection registry, broadcaster and the `/sse-stream` route
//! - **[`static_files`]** - serving-root confinement and MIME types
//! - **[`triggers`]** - hotkey counter and trigger event payloads
//! - **[`runtime_config`]** / **[`logging`]** / **[`cli`]** - ambient setup
//!
//! ## Routes
//!
//! | Path | Response |
//! |---|---|
//! | `/status` | HTML status page with the connected client count |
//! | `/json-data` | `{"status":"online"}` |
//! | `/sse-stream` | `text/event-stream`, held open until the client leaves |
//! | anything else | file under the serving root, or 404 |
//!
//! ## Usage
//!
//! ```no_run
//! use obs_sse_server::ServerState;
//!
//! let state = ServerState::new();
//! let addr = state.start("127.0.0.1", 8080, "./overlays")?;
//! println!("listening on {addr}");
//!
//! // from the host's hotkey callback, on any thread
//! state.on_hotkey(false);
//!
//! // from the host's unload hook
//! state.stop();
//! # Ok::<(), obs_sse_server::ServerError>(())
//! ```

pub mod cli;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod logging;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod sse;
pub mod state;
pub mod static_files;
pub mod triggers;

pub use error::{ClientWriteError, RequestError, ServerError, StaticFileError};
pub use ids::ConnectionId;
pub use runtime_config::ServerConfig;
pub use sse::{BroadcastReport, Broadcaster, ConnectionRegistry, Event};
pub use state::{Lifecycle, ServerState};
pub use triggers::TriggerSource;
