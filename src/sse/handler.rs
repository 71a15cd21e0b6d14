use super::connection::{SseConnection, StreamConnection};
use super::event::{Event, KEEP_ALIVE_FRAME};
use super::registry::{ConnectionRegistry, ParkOutcome, Registration};
use crate::router::Handler;
use crate::runtime_config::ServerConfig;
use crate::server::{ParsedRequest, Response, StreamBody};
use http::StatusCode;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Timing knobs for parked stream handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SseSettings {
    /// Upper bound on any single write to the client.
    pub write_timeout: Duration,
    /// How long a parked handler sleeps before rechecking its peer.
    pub poll_interval: Duration,
    /// Keep-alive comment cadence; `None` disables it.
    pub heartbeat_interval: Option<Duration>,
}

impl From<&ServerConfig> for SseSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            write_timeout: config.write_timeout,
            poll_interval: config.poll_interval,
            heartbeat_interval: config.heartbeat_interval,
        }
    }
}

/// Why a stream session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The welcome frame could not be written; never registered.
    WelcomeFailed,
    /// The registry was already shut down.
    Rejected,
    /// Removed from the registry by someone else (usually a failed broadcast).
    Removed,
    ShuttingDown,
    ClientClosed,
    HeartbeatFailed,
}

/// `GET /sse-stream`: answers with event-stream headers and hands the socket
/// to an [`SseSession`].
pub struct SseStreamHandler {
    registry: Arc<ConnectionRegistry>,
    settings: SseSettings,
}

impl SseStreamHandler {
    pub fn new(registry: Arc<ConnectionRegistry>, settings: SseSettings) -> Self {
        Self { registry, settings }
    }
}

impl Handler for SseStreamHandler {
    fn handle(&self, _req: &ParsedRequest) -> Response {
        Response::new(StatusCode::OK)
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .header("Access-Control-Allow-Origin", "*")
            .stream(SseSession::new(Arc::clone(&self.registry), self.settings))
    }
}

/// One parked client. Runs on the connection's own thread until the client
/// leaves or the server shuts down.
pub struct SseSession {
    registry: Arc<ConnectionRegistry>,
    settings: SseSettings,
}

impl SseSession {
    pub fn new(registry: Arc<ConnectionRegistry>, settings: SseSettings) -> Self {
        Self { registry, settings }
    }

    /// Welcome, register, park, clean up.
    pub fn run_with(self, conn: Arc<dyn SseConnection>) -> SessionEnd {
        let id = conn.id();

        if let Err(e) = conn.write_frame(&Event::welcome().to_frame()) {
            info!(connection_id = %id, error = %e, "SSE client left before welcome");
            conn.close();
            return SessionEnd::WelcomeFailed;
        }

        if self.registry.register(Arc::clone(&conn)) == Registration::Closed {
            conn.close();
            return SessionEnd::Rejected;
        }
        info!(
            connection_id = %id,
            clients = self.registry.len(),
            "New SSE client connected"
        );

        let mut last_beat = Instant::now();
        let end = loop {
            match self.registry.park(&id, self.settings.poll_interval) {
                ParkOutcome::Removed => break SessionEnd::Removed,
                ParkOutcome::ShuttingDown => break SessionEnd::ShuttingDown,
                ParkOutcome::TimedOut => {}
            }
            if conn.poll_closed() {
                break SessionEnd::ClientClosed;
            }
            if let Some(every) = self.settings.heartbeat_interval {
                if last_beat.elapsed() >= every {
                    if conn.write_frame(KEEP_ALIVE_FRAME).is_err() {
                        break SessionEnd::HeartbeatFailed;
                    }
                    last_beat = Instant::now();
                }
            }
        };

        self.registry.unregister(&id);
        conn.close();
        info!(
            connection_id = %id,
            reason = ?end,
            clients = self.registry.len(),
            "SSE client connection cleanup complete"
        );
        end
    }
}

impl StreamBody for SseSession {
    fn run(self: Box<Self>, stream: TcpStream) {
        match StreamConnection::new(stream, self.settings.write_timeout) {
            Ok(conn) => {
                self.run_with(Arc::new(conn));
            }
            Err(e) => warn!(error = %e, "could not prepare SSE socket"),
        }
    }
}
