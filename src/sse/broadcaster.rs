use super::event::Event;
use super::registry::ConnectionRegistry;
use crate::ids::ConnectionId;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections that accepted the frame.
    pub delivered: usize,
    /// Connections whose write failed and which were pruned.
    pub dropped: usize,
}

/// Fans named events out to every registered connection.
///
/// Writes go one connection at a time. Each frame write is bounded by the
/// connection's own deadline, so a stalled client delays a call by at most
/// that deadline and is then pruned. Calls are serialized, which keeps
/// per-connection delivery in call order.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    sequence: Arc<Mutex<()>>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            sequence: Arc::new(Mutex::new(())),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn broadcast(&self, event: &Event) -> BroadcastReport {
        self.broadcast_frame(&event.name, &event.to_frame())
    }

    /// Send an already-encoded frame. `label` is only used for logging.
    pub fn broadcast_frame(&self, label: &str, frame: &[u8]) -> BroadcastReport {
        let _order = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
        let targets = self.registry.snapshot();
        if targets.is_empty() {
            debug!(event = label, "broadcast with no connected clients");
            return BroadcastReport::default();
        }

        let mut failed: Vec<ConnectionId> = Vec::new();
        for conn in &targets {
            if let Err(e) = conn.write_frame(frame) {
                info!(
                    connection_id = %conn.id(),
                    timed_out = e.is_timeout(),
                    error = %e,
                    "SSE client detected as disconnected during broadcast"
                );
                failed.push(conn.id());
            }
        }

        let dropped = self.registry.unregister_all(&failed);
        let report = BroadcastReport {
            delivered: targets.len() - failed.len(),
            dropped,
        };
        debug!(
            event = label,
            delivered = report.delivered,
            dropped = report.dropped,
            "broadcast complete"
        );
        report
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("registry", &self.registry)
            .finish()
    }
}
