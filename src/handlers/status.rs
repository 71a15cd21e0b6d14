use crate::router::Handler;
use crate::server::{ParsedRequest, Response};
use crate::sse::ConnectionRegistry;
use http::StatusCode;
use minijinja::{context, Environment};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

const STATUS_TEMPLATE: &str = r#"<html><body><h1>OBS Status...</h1>
<p>Listening on <b>http://{{ addr }}</b></p>
<p>Connected SSE clients: <b>{{ clients }}</b></p>
<p>SSE Stream: <a href="/sse-stream">/sse-stream</a></p>
</body></html>"#;

/// `GET /status`: small HTML page with the listen address and client count.
pub struct StatusHandler {
    addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
}

impl StatusHandler {
    pub fn new(addr: SocketAddr, registry: Arc<ConnectionRegistry>) -> Self {
        Self { addr, registry }
    }

    fn render(&self) -> Result<String, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("status.html", STATUS_TEMPLATE)?;
        let tmpl = env.get_template("status.html")?;
        tmpl.render(context! {
            addr => self.addr.to_string(),
            clients => self.registry.len(),
        })
    }
}

impl Handler for StatusHandler {
    fn handle(&self, _req: &ParsedRequest) -> Response {
        match self.render() {
            Ok(html) => Response::html(StatusCode::OK, html),
            Err(e) => {
                tracing::warn!(error = %e, "status template failed");
                Response::html(
                    StatusCode::OK,
                    "<html><body><h1>OBS Status...</h1></body></html>",
                )
            }
        }
    }
}

/// `GET /json-data`: `{"status":"online"}`.
pub struct JsonStatusHandler;

impl Handler for JsonStatusHandler {
    fn handle(&self, _req: &ParsedRequest) -> Response {
        Response::json(StatusCode::OK, &json!({ "status": "online" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_page_reports_clients() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handler = StatusHandler::new("127.0.0.1:8080".parse().unwrap(), registry);
        let res = handler.handle(&ParsedRequest::get("/status"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.get_header("content-type"), Some("text/html"));
        let body = String::from_utf8(res.body_bytes().unwrap().to_vec()).unwrap();
        assert!(body.contains("<h1>OBS Status...</h1>"));
        assert!(body.contains("127.0.0.1:8080"));
        assert!(body.contains("Connected SSE clients: <b>0</b>"));
    }

    #[test]
    fn json_status_body() {
        let res = JsonStatusHandler.handle(&ParsedRequest::get("/json-data"));
        assert_eq!(res.get_header("content-type"), Some("application/json"));
        assert_eq!(res.body_bytes().unwrap(), br#"{"status":"online"}"#);
    }
}
