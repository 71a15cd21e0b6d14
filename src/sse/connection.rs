use crate::error::ClientWriteError;
use crate::ids::ConnectionId;
use std::io::{self, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Read timeout used when probing a parked stream for a closed peer.
const PEEK_TIMEOUT: Duration = Duration::from_millis(1);

/// Opaque handle to one streaming client.
///
/// The registry and broadcaster only ever talk to clients through this
/// trait, so neither assumes anything about the underlying transport.
pub trait SseConnection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Write one complete frame. Frames from concurrent callers never
    /// interleave. Any failure leaves the connection dead.
    fn write_frame(&self, frame: &[u8]) -> Result<(), ClientWriteError>;

    /// Mark dead and release the transport. Idempotent.
    fn close(&self);

    fn is_alive(&self) -> bool;

    /// Cheap check for a peer that has hung up. Returns `true` once the
    /// connection should be dropped.
    fn poll_closed(&self) -> bool {
        !self.is_alive()
    }
}

/// [`SseConnection`] over a blocking `TcpStream`.
///
/// `write_timeout` bounds a whole frame, not each `write` call, so a peer
/// that drains its window a few bytes at a time still fails in time.
pub struct StreamConnection {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    write_timeout: Duration,
    writer: Mutex<TcpStream>,
    // Second handle on the same socket so close/peek never wait on a writer.
    control: TcpStream,
    alive: AtomicBool,
}

impl StreamConnection {
    pub fn new(stream: TcpStream, write_timeout: Duration) -> io::Result<Self> {
        let write_timeout = write_timeout.max(Duration::from_millis(1));
        stream.set_write_timeout(Some(write_timeout))?;
        let control = stream.try_clone()?;
        control.set_read_timeout(Some(PEEK_TIMEOUT))?;
        Ok(Self {
            id: ConnectionId::new(),
            peer: stream.peer_addr().ok(),
            write_timeout,
            writer: Mutex::new(stream),
            control,
            alive: AtomicBool::new(true),
        })
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn mark_dead(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            // Already-closed sockets report NotConnected here; nothing to do.
            if let Err(e) = self.control.shutdown(Shutdown::Both) {
                tracing::trace!(connection_id = %self.id, error = %e, "socket shutdown");
            }
        }
    }
}

impl SseConnection for StreamConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn write_frame(&self, frame: &[u8]) -> Result<(), ClientWriteError> {
        let mut stream = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_alive() {
            return Err(ClientWriteError::closed());
        }
        let result = write_before(&mut stream, frame, Instant::now() + self.write_timeout);
        drop(stream);
        result.map_err(|e| {
            // A timed-out write may have left half a frame on the wire.
            self.mark_dead();
            ClientWriteError::from(e)
        })
    }

    fn close(&self) {
        self.mark_dead();
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn poll_closed(&self) -> bool {
        if !self.is_alive() {
            return true;
        }
        let mut buf = [0u8; 1];
        match self.control.peek(&mut buf) {
            // Orderly shutdown from the browser side.
            Ok(0) => true,
            // EventSource clients never send a body; ignore stray bytes.
            Ok(_) => false,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => false,
            Err(e) if e.kind() == ErrorKind::Interrupted => false,
            Err(_) => true,
        }
    }
}

/// Write all of `buf`, giving up once `deadline` passes. Each `write` gets
/// only the time left until the deadline.
fn write_before(stream: &mut TcpStream, mut buf: &[u8], deadline: Instant) -> io::Result<()> {
    while !buf.is_empty() {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(io::Error::new(ErrorKind::TimedOut, "frame write deadline passed"));
        }
        stream.set_write_timeout(Some(left))?;
        match stream.write(buf) {
            Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Err(io::Error::new(ErrorKind::TimedOut, e));
            }
            Err(e) => return Err(e),
        }
    }
    stream.flush()
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("alive", &self.is_alive())
            .finish()
    }
}
