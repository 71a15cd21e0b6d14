use std::fmt::{Display, Formatter};

/// SSE connection identifier, a ULID minted when a client completes the
/// event-stream handshake. Shows up in logs only.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct ConnectionId(ulid::Ulid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
