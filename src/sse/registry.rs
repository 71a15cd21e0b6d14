//! Set of live event-stream connections.
//!
//! Every mutation takes the one mutex for a short critical section. Broadcast
//! iterates a [`ConnectionRegistry::snapshot`] so no lock is held during I/O.
//! The paired condition variable is signalled on every membership change and
//! on shutdown, which is what parked stream handlers wait on.

use super::connection::SseConnection;
use crate::ids::ConnectionId;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Result of [`ConnectionRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    AlreadyPresent,
    /// The registry has been shut down; the caller must release the connection.
    Closed,
}

/// Why [`ConnectionRegistry::park`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkOutcome {
    /// The connection is no longer a member.
    Removed,
    ShuttingDown,
    /// Still registered after the full wait; the caller can recheck liveness.
    TimedOut,
}

#[derive(Default)]
struct Members {
    connections: HashMap<ConnectionId, Arc<dyn SseConnection>>,
    shut_down: bool,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    members: Mutex<Members>,
    changed: Condvar,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Members> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, conn: Arc<dyn SseConnection>) -> Registration {
        let mut members = self.lock();
        if members.shut_down {
            return Registration::Closed;
        }
        let id = conn.id();
        if members.connections.contains_key(&id) {
            return Registration::AlreadyPresent;
        }
        members.connections.insert(id, conn);
        drop(members);
        self.changed.notify_all();
        Registration::Added
    }

    /// Remove and close `id`. Returns `false` when it was not a member, which
    /// makes repeated calls from the handler, broadcaster and shutdown safe.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        let removed = self.lock().connections.remove(id);
        match removed {
            Some(conn) => {
                self.changed.notify_all();
                conn.close();
                true
            }
            None => false,
        }
    }

    /// Remove a batch under one lock acquisition. Returns how many were members.
    pub fn unregister_all(&self, ids: &[ConnectionId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let removed: Vec<_> = {
            let mut members = self.lock();
            ids.iter()
                .filter_map(|id| members.connections.remove(id))
                .collect()
        };
        if !removed.is_empty() {
            self.changed.notify_all();
        }
        for conn in &removed {
            conn.close();
        }
        removed.len()
    }

    /// Point-in-time copy of the members, safe to iterate without the lock.
    pub fn snapshot(&self) -> Vec<Arc<dyn SseConnection>> {
        self.lock().connections.values().cloned().collect()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.lock().connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    /// Block until `id` leaves the registry, the registry shuts down, or
    /// `timeout` elapses.
    pub fn park(&self, id: &ConnectionId, timeout: Duration) -> ParkOutcome {
        let members = self.lock();
        let (members, _) = self
            .changed
            .wait_timeout_while(members, timeout, |m| {
                !m.shut_down && m.connections.contains_key(id)
            })
            .unwrap_or_else(PoisonError::into_inner);
        if members.shut_down {
            ParkOutcome::ShuttingDown
        } else if !members.connections.contains_key(id) {
            ParkOutcome::Removed
        } else {
            ParkOutcome::TimedOut
        }
    }

    /// Block until at least `count` connections are registered. Returns
    /// `false` on timeout or shutdown.
    pub fn wait_for_len(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut members = self.lock();
        loop {
            if members.connections.len() >= count {
                return true;
            }
            let now = Instant::now();
            if members.shut_down || now >= deadline {
                return false;
            }
            members = self
                .changed
                .wait_timeout(members, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Refuse new registrations, drop every member and wake all parked
    /// handlers. Returns how many connections were closed. Idempotent.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<_> = {
            let mut members = self.lock();
            members.shut_down = true;
            members.connections.drain().map(|(_, c)| c).collect()
        };
        self.changed.notify_all();
        for conn in &drained {
            conn.close();
        }
        drained.len()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let members = self.lock();
        f.debug_struct("ConnectionRegistry")
            .field("connections", &members.connections.len())
            .field("shut_down", &members.shut_down)
            .finish()
    }
}
