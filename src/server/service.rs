use super::request::parse_request;
use super::response::Response;
use crate::error::RequestError;
use crate::handlers::{JsonStatusHandler, StaticFileHandler, StatusHandler};
use crate::router::Router;
use crate::runtime_config::ServerConfig;
use crate::sse::{ConnectionRegistry, SseSettings, SseStreamHandler};
use crate::static_files::StaticFiles;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Route paths of the standard table.
pub const STATUS_PATH: &str = "/status";
pub const JSON_STATUS_PATH: &str = "/json-data";
pub const SSE_STREAM_PATH: &str = "/sse-stream";

/// Everything one connection thread needs: the route table and timeouts.
#[derive(Clone, Debug)]
pub struct AppService {
    pub router: Router,
    pub request_timeout: Duration,
}

impl AppService {
    pub fn new(router: Router, request_timeout: Duration) -> Self {
        Self {
            router,
            request_timeout,
        }
    }

    /// The standard table: status, JSON status, event stream, static files.
    pub fn standard(
        config: &ServerConfig,
        addr: SocketAddr,
        registry: Arc<ConnectionRegistry>,
        files: StaticFiles,
    ) -> Self {
        let router = Router::new(Arc::new(StaticFileHandler::new(files)))
            .route(
                STATUS_PATH,
                Arc::new(StatusHandler::new(addr, Arc::clone(&registry))),
            )
            .route(JSON_STATUS_PATH, Arc::new(JsonStatusHandler))
            .route(
                SSE_STREAM_PATH,
                Arc::new(SseStreamHandler::new(registry, SseSettings::from(config))),
            );
        Self::new(router, config.request_timeout)
    }

    /// Serve one accepted connection to completion (one request per
    /// connection). For the event stream this returns only once the client
    /// is gone or the server shuts down.
    pub fn serve_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let timeout = Some(self.request_timeout.max(Duration::from_millis(1)));
        if let Err(e) = stream
            .set_read_timeout(timeout)
            .and_then(|()| stream.set_write_timeout(timeout))
        {
            debug!(peer = %peer, error = %e, "failed to set socket timeouts");
        }
        let reader = match stream.try_clone() {
            Ok(s) => s,
            Err(e) => {
                warn!(peer = %peer, error = %e, "failed to clone client socket");
                return;
            }
        };

        let mut reader = BufReader::new(reader);
        let response = match parse_request(&mut reader) {
            Ok(req) => {
                debug!(peer = %peer, method = %req.method, path = %req.path, "HTTP request");
                self.router.dispatch(&req)
            }
            Err(RequestError::Io(e)) => {
                debug!(peer = %peer, error = %e, "client left before sending a request");
                return;
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "malformed request");
                Response::bad_request(&e.to_string())
            }
        };
        drop(reader);

        let status = response.status;
        let mut writer = &stream;
        match response.write_to(&mut writer) {
            Ok(Some(body)) => body.run(stream),
            Ok(None) => {
                // Orderly close so the client sees EOF after the body.
                if let Err(e) = stream.shutdown(Shutdown::Write) {
                    debug!(peer = %peer, error = %e, "shutdown after response");
                }
            }
            Err(e) => debug!(peer = %peer, status = %status, error = %e, "response write failed"),
        }
    }
}
