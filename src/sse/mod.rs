//! # Server-Sent Events
//!
//! Live event streams to browser clients (typically OBS browser sources).
//!
//! ## Architecture
//!
//! - **[`ConnectionRegistry`]** - the set of clients that completed the handshake
//! - **[`Broadcaster`]** - frames an [`Event`] and writes it to every registered client,
//!   pruning the ones whose write fails
//! - **[`SseStreamHandler`]** - the `/sse-stream` route; parks the connection thread
//!   until the client leaves or the server stops
//! - **[`SseConnection`]** - opaque per-client handle; [`StreamConnection`] is the TCP one
//!
//! ## SSE Format
//!
//! ```text
//! event: welcome
//! data: Connected to OBS SSE Stream
//!
//! event: hotkey_trigger
//! data: {"time":"21:04:55","press_count":3,"message":"OBS Hotkey Pressed!"}
//!
//! ```
//!
//! ## Client-Side
//!
//! ```javascript
//! const events = new EventSource('http://localhost:8080/sse-stream');
//! events.addEventListener('hotkey_trigger', (e) => {
//!     console.log(JSON.parse(e.data).press_count);
//! });
//! ```

mod broadcaster;
mod connection;
mod event;
mod handler;
mod registry;

pub use broadcaster::{BroadcastReport, Broadcaster};
pub use connection::{SseConnection, StreamConnection};
pub use event::{
    Event, TriggerPayload, HOTKEY_TRIGGER_EVENT, KEEP_ALIVE_FRAME, WELCOME_DATA, WELCOME_EVENT,
};
pub use handler::{SessionEnd, SseSession, SseSettings, SseStreamHandler};
pub use registry::{ConnectionRegistry, ParkOutcome, Registration};
