use super::service::AppService;
use crate::error::ServerError;
use crate::runtime_config::ServerConfig;
use crate::sse::ConnectionRegistry;
use crate::static_files::StaticFiles;
use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sleep between accept attempts when no connection is pending.
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// Sockets and threads of connections currently being served.
///
/// Lets `stop` unblock every connection thread (by shutting its socket)
/// and then join it, so no thread outlives the server.
#[derive(Default)]
struct Inflight {
    inner: Mutex<InflightInner>,
}

#[derive(Default)]
struct InflightInner {
    next_token: u64,
    sockets: HashMap<u64, TcpStream>,
    workers: Vec<JoinHandle<()>>,
}

impl Inflight {
    fn lock(&self) -> MutexGuard<'_, InflightInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, socket: TcpStream) -> u64 {
        let mut inner = self.lock();
        let token = inner.next_token;
        inner.next_token += 1;
        inner.sockets.insert(token, socket);
        token
    }

    fn release(&self, token: u64) {
        self.lock().sockets.remove(&token);
    }

    fn add_worker(&self, handle: JoinHandle<()>) {
        let mut inner = self.lock();
        inner.workers.retain(|h| !h.is_finished());
        inner.workers.push(handle);
    }

    fn active(&self) -> usize {
        self.lock().sockets.len()
    }

    /// Shut every tracked socket and join every worker. Returns the number
    /// of threads joined.
    fn close_all(&self) -> usize {
        let (sockets, workers) = {
            let mut inner = self.lock();
            (
                inner.sockets.drain().map(|(_, s)| s).collect::<Vec<_>>(),
                std::mem::take(&mut inner.workers),
            )
        };
        for socket in sockets {
            if let Err(e) = socket.shutdown(Shutdown::Both) {
                debug!(error = %e, "closing in-flight socket");
            }
        }
        let joined = workers.len();
        for worker in workers {
            if worker.join().is_err() {
                warn!("connection thread panicked");
            }
        }
        joined
    }
}

/// Binds the listening socket and runs the accept loop.
pub struct HttpServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, registry: Arc<ConnectionRegistry>) -> Self {
        Self { config, registry }
    }

    fn resolve_addr(&self) -> Result<SocketAddr, ServerError> {
        let target = format!("{}:{}", self.config.host, self.config.port);
        (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|_| ServerError::InvalidAddress(target.clone()))?
            .next()
            .ok_or(ServerError::InvalidAddress(target))
    }

    /// Start the HTTP server.
    ///
    /// Nothing is left running if this fails: the serving root is checked
    /// and the port bound before any thread is spawned.
    ///
    /// # Errors
    ///
    /// - [`ServerError::InvalidAddress`] if host/port do not resolve
    /// - [`ServerError::ServingRoot`] if the serving root is not a directory
    /// - [`ServerError::Bind`] if the port cannot be bound (already in use)
    pub fn start(self) -> Result<ServerHandle, ServerError> {
        let addr = self.resolve_addr()?;
        if !addr.ip().is_loopback() {
            warn!(addr = %addr, "listening on a non-loopback address");
        }
        let files = StaticFiles::new(&self.config.serving_root).map_err(|source| {
            ServerError::ServingRoot {
                path: self.config.serving_root.clone(),
                source,
            }
        })?;

        let listener = TcpListener::bind(addr).map_err(|source| {
            error!(addr = %addr, error = %source, "failed to bind HTTP server");
            ServerError::Bind { addr, source }
        })?;
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let service = Arc::new(AppService::standard(
            &self.config,
            local_addr,
            Arc::clone(&self.registry),
            files,
        ));
        let shutdown = Arc::new(AtomicBool::new(false));
        let inflight = Arc::new(Inflight::default());

        let accept = {
            let shutdown = Arc::clone(&shutdown);
            let inflight = Arc::clone(&inflight);
            thread::Builder::new()
                .name("http-accept".to_string())
                .spawn(move || accept_loop(listener, service, shutdown, inflight))?
        };

        info!(
            addr = %local_addr,
            root = %self.config.serving_root.display(),
            "Starting HTTP server on http://{local_addr}"
        );
        Ok(ServerHandle {
            addr: local_addr,
            shutdown,
            accept: Some(accept),
            inflight,
            registry: self.registry,
        })
    }
}

fn accept_loop(
    listener: TcpListener,
    service: Arc<AppService>,
    shutdown: Arc<AtomicBool>,
    inflight: Arc<Inflight>,
) {
    while !shutdown.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => spawn_connection(stream, peer, &service, &inflight),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                // EMFILE, ECONNABORTED and friends: keep serving.
                warn!(error = %e, "accept failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    drop(listener);
    debug!("accept loop exited, listening socket closed");
}

fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    service: &Arc<AppService>,
    inflight: &Arc<Inflight>,
) {
    // BSD-derived platforms hand out accepted sockets in the listener's mode.
    if let Err(e) = stream.set_nonblocking(false) {
        warn!(peer = %peer, error = %e, "could not make client socket blocking");
        return;
    }
    let token = match stream.try_clone() {
        Ok(handle) => inflight.track(handle),
        Err(e) => {
            warn!(peer = %peer, error = %e, "could not track client socket");
            return;
        }
    };

    let worker = {
        let service = Arc::clone(service);
        let inflight = Arc::clone(inflight);
        thread::Builder::new()
            .name("http-conn".to_string())
            .spawn(move || {
                service.serve_connection(stream, peer);
                inflight.release(token);
            })
    };
    match worker {
        Ok(handle) => inflight.add_worker(handle),
        Err(e) => {
            warn!(peer = %peer, error = %e, "could not spawn connection thread");
            inflight.release(token);
        }
    }
}

/// Handle to a running HTTP server
///
/// Provides methods for waiting until the server is ready and stopping it.
/// Dropping the handle stops the server.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    accept: Option<JoinHandle<()>>,
    inflight: Arc<Inflight>,
    registry: Arc<ConnectionRegistry>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.accept.is_some()
    }

    /// Connections currently being served (including parked event streams).
    pub fn active_connections(&self) -> usize {
        self.inflight.active()
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// Polls the server address by attempting TCP connections until successful.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` error if the server doesn't become ready within ~250ms (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop the server and wait for every thread it started.
    ///
    /// Order: stop accepting, wake parked event streams, close the listening
    /// socket, then shut and join every in-flight connection. Safe to call
    /// more than once.
    pub fn stop(&mut self) {
        let Some(accept) = self.accept.take() else {
            return;
        };
        info!(addr = %self.addr, "Stopping HTTP server...");
        self.shutdown.store(true, Ordering::Release);
        let streams = self.registry.shutdown();
        if accept.join().is_err() {
            warn!("accept thread panicked");
        }
        let joined = self.inflight.close_all();
        info!(
            addr = %self.addr,
            sse_clients = streams,
            connections = joined,
            "HTTP server closed"
        );
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("addr", &self.addr)
            .field("running", &self.is_running())
            .finish()
    }
}
