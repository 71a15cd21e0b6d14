//! HTTP/1.1 plumbing: request parsing, responses, per-connection service
//! and the listening server.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{normalize_path, parse_query_params, parse_request, ParsedRequest};
pub use response::{Body, Response, StreamBody};
pub use service::{AppService, JSON_STATUS_PATH, SSE_STREAM_PATH, STATUS_PATH};
