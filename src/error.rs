//! Error types shared across the server.
//!
//! Only [`ServerError`] ever reaches the host. Per-connection failures
//! ([`RequestError`], [`StaticFileError`], [`ClientWriteError`]) are turned
//! into HTTP responses or registry removals inside the connection thread.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Failure to bring the listening server up.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound (usually: port already in use).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The configured host/port did not resolve to a socket address.
    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),
    /// `start` was called while a server is already listening.
    #[error("server is already listening on {0}")]
    AlreadyRunning(SocketAddr),
    /// The serving root does not exist or cannot be canonicalized.
    #[error("serving root {path} is not usable: {source}")]
    ServingRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("server I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure to read a request head from a client.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("request head exceeds {limit} bytes")]
    TooLarge { limit: usize },
    /// Client went away (or timed out) before sending a complete head.
    #[error("request read failed: {0}")]
    Io(#[from] io::Error),
}

/// Reasons a static file lookup produced no file. Both map to `404`.
#[derive(Debug, thiserror::Error)]
pub enum StaticFileError {
    #[error("file not found: {0}")]
    NotFound(String),
    /// The resolved path escaped the serving root.
    #[error("path escapes serving root: {0}")]
    Traversal(String),
    #[error("failed to read file: {0}")]
    Io(#[from] io::Error),
}

/// A write to one SSE client failed (broken pipe, reset, timeout, closed).
///
/// Recovered locally by dropping the connection from the registry.
#[derive(Debug, thiserror::Error)]
#[error("client write failed: {source}")]
pub struct ClientWriteError {
    #[from]
    pub source: io::Error,
}

impl ClientWriteError {
    pub fn closed() -> Self {
        Self {
            source: io::Error::new(io::ErrorKind::NotConnected, "connection closed"),
        }
    }

    /// True when the failure was the bounded write timeout rather than a dead peer.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.source.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_address() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let err = ServerError::Bind {
            addr,
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:8080"));
    }

    #[test]
    fn timeout_classification() {
        let timeout = ClientWriteError::from(io::Error::new(io::ErrorKind::WouldBlock, "slow"));
        assert!(timeout.is_timeout());
        assert!(!ClientWriteError::closed().is_timeout());
    }
}
