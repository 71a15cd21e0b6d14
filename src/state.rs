//! The object a host application owns for the server's whole life.
//!
//! `ServerState` replaces module-level globals: the host creates one at
//! load, calls [`ServerState::start`] / [`ServerState::stop`] from its
//! load/unload hooks and forwards hotkey and text-source callbacks to the
//! `on_*` methods from whatever thread it likes.
//!
//! ```text
//! Uninitialized --start--> Listening --stop--> ShuttingDown --> Stopped
//!                              ^                                  |
//!                              +-------------start----------------+
//! ```

use crate::error::ServerError;
use crate::runtime_config::ServerConfig;
use crate::server::{HttpServer, ServerHandle};
use crate::sse::{BroadcastReport, Broadcaster, ConnectionRegistry, Event};
use crate::triggers::TriggerSource;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Listening,
    ShuttingDown,
    Stopped,
}

struct Running {
    handle: ServerHandle,
    broadcaster: Broadcaster,
}

struct Inner {
    lifecycle: Lifecycle,
    running: Option<Running>,
}

pub struct ServerState {
    // Serializes start/stop against each other; never held by broadcasts.
    control: Mutex<()>,
    inner: Mutex<Inner>,
    triggers: TriggerSource,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            control: Mutex::new(()),
            inner: Mutex::new(Inner {
                lifecycle: Lifecycle::Uninitialized,
                running: None,
            }),
            triggers: TriggerSource::new(),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        lock(&self.inner).lifecycle
    }

    pub fn is_listening(&self) -> bool {
        self.lifecycle() == Lifecycle::Listening
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.inner)
            .running
            .as_ref()
            .map(|r| r.handle.local_addr())
    }

    /// Start on `host:port` serving files from `serving_root`, other settings
    /// at their defaults. Returns the bound address.
    ///
    /// # Errors
    ///
    /// See [`ServerState::start_with_config`].
    pub fn start(
        &self,
        host: &str,
        port: u16,
        serving_root: impl Into<PathBuf>,
    ) -> Result<SocketAddr, ServerError> {
        self.start_with_config(&ServerConfig::new(host, port, serving_root))
    }

    /// Bind and begin serving.
    ///
    /// A failed start leaves the state exactly as it was, so the host can
    /// retry on another port.
    ///
    /// # Errors
    ///
    /// [`ServerError::AlreadyRunning`] while listening, otherwise whatever
    /// [`HttpServer::start`] reports (notably [`ServerError::Bind`]).
    pub fn start_with_config(&self, config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let _control = lock(&self.control);
        if let Some(addr) = self.local_addr() {
            return Err(ServerError::AlreadyRunning(addr));
        }

        let registry = Arc::new(ConnectionRegistry::new());
        let config = config.clone().normalized();
        let handle = HttpServer::new(config, Arc::clone(&registry))
            .start()
            .inspect_err(|e| error!(error = %e, "Error starting server"))?;
        let addr = handle.local_addr();

        let mut inner = lock(&self.inner);
        inner.running = Some(Running {
            handle,
            broadcaster: Broadcaster::new(registry),
        });
        inner.lifecycle = Lifecycle::Listening;
        info!(addr = %addr, "SSE Stream: http://{addr}/sse-stream");
        Ok(addr)
    }

    /// Stop serving and wait until every connection thread has exited.
    /// A no-op when not listening.
    pub fn stop(&self) {
        let _control = lock(&self.control);
        let running = {
            let mut inner = lock(&self.inner);
            let Some(running) = inner.running.take() else {
                debug!(lifecycle = ?inner.lifecycle, "stop requested while not listening");
                return;
            };
            inner.lifecycle = Lifecycle::ShuttingDown;
            running
        };

        let Running {
            mut handle,
            broadcaster,
        } = running;
        handle.stop();
        drop(broadcaster);

        lock(&self.inner).lifecycle = Lifecycle::Stopped;
    }

    fn broadcaster(&self) -> Option<Broadcaster> {
        lock(&self.inner)
            .running
            .as_ref()
            .map(|r| r.broadcaster.clone())
    }

    /// Registry of the running server, if any.
    pub fn registry(&self) -> Option<Arc<ConnectionRegistry>> {
        self.broadcaster().map(|b| Arc::clone(b.registry()))
    }

    pub fn client_count(&self) -> usize {
        self.registry().map_or(0, |r| r.len())
    }

    /// Wait until `count` event-stream clients are registered.
    pub fn wait_for_clients(&self, count: usize, timeout: Duration) -> bool {
        self.registry()
            .is_some_and(|r| r.wait_for_len(count, timeout))
    }

    /// Send `event` to every connected client. A no-op when not listening.
    pub fn broadcast(&self, event: &Event) -> BroadcastReport {
        match self.broadcaster() {
            Some(b) => b.broadcast(event),
            None => {
                debug!(event = %event.name, "broadcast while not listening");
                BroadcastReport::default()
            }
        }
    }

    pub fn press_count(&self) -> u64 {
        self.triggers.press_count()
    }

    /// Hotkey pressed: count it and broadcast `hotkey_trigger`.
    pub fn on_hotkey_pressed(&self) -> BroadcastReport {
        match self.triggers.hotkey_pressed() {
            Ok(event) => {
                let report = self.broadcast(&event);
                info!(
                    press_count = self.triggers.press_count(),
                    clients = report.delivered,
                    "SSE Hotkey pressed. Event broadcast"
                );
                report
            }
            Err(e) => {
                error!(error = %e, "failed to encode hotkey event");
                BroadcastReport::default()
            }
        }
    }

    /// Host key callback with the key state. Key-down is ignored.
    pub fn on_hotkey(&self, pressed: bool) -> Option<BroadcastReport> {
        (!pressed).then(|| self.on_hotkey_pressed())
    }

    /// Text source changed: broadcast its text (spaces removed).
    pub fn on_external_trigger(&self, text: &str) -> BroadcastReport {
        match self.triggers.external_text(text) {
            Ok(event) => {
                let report = self.broadcast(&event);
                info!(
                    press_count = self.triggers.press_count(),
                    clients = report.delivered,
                    "SSE text update broadcast"
                );
                report
            }
            Err(e) => {
                error!(error = %e, "failed to encode text trigger event");
                BroadcastReport::default()
            }
        }
    }
}

impl Drop for ServerState {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("lifecycle", &self.lifecycle())
            .field("addr", &self.local_addr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_before_start_is_harmless() {
        let state = ServerState::new();
        state.stop();
        state.stop();
        assert_eq!(state.lifecycle(), Lifecycle::Uninitialized);
    }

    #[test]
    fn triggers_without_server_are_no_ops() {
        let state = ServerState::new();
        assert_eq!(state.on_hotkey_pressed(), BroadcastReport::default());
        assert_eq!(state.on_external_trigger("hi"), BroadcastReport::default());
        assert_eq!(state.press_count(), 1);
        assert_eq!(state.client_count(), 0);
    }

    #[test]
    fn only_key_release_counts() {
        let state = ServerState::new();
        assert!(state.on_hotkey(true).is_none());
        assert_eq!(state.press_count(), 0);
        assert!(state.on_hotkey(false).is_some());
        assert_eq!(state.press_count(), 1);
    }

    #[test]
    fn lifecycle_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let state = ServerState::new();
        let addr = state.start("127.0.0.1", 0, dir.path()).unwrap();
        assert_eq!(state.lifecycle(), Lifecycle::Listening);
        assert_eq!(state.local_addr(), Some(addr));
        assert!(matches!(
            state.start("127.0.0.1", 0, dir.path()),
            Err(ServerError::AlreadyRunning(_))
        ));
        state.stop();
        assert_eq!(state.lifecycle(), Lifecycle::Stopped);
        assert_eq!(state.local_addr(), None);
        state.stop();
        assert_eq!(state.lifecycle(), Lifecycle::Stopped);

        state.start("127.0.0.1", 0, dir.path()).unwrap();
        assert!(state.is_listening());
    }

    #[test]
    fn bad_root_leaves_state_untouched() {
        let state = ServerState::new();
        let err = state.start("127.0.0.1", 0, "/definitely/not/here").unwrap_err();
        assert!(matches!(err, ServerError::ServingRoot { .. }));
        assert_eq!(state.lifecycle(), Lifecycle::Uninitialized);
    }
}
