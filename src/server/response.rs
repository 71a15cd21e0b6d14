use http::StatusCode;
use serde_json::Value;
use std::io::{self, Write};
use std::net::TcpStream;

/// A response body that takes over the socket once the head is written.
///
/// Used by long-lived responses (the event stream). `run` owns the
/// connection thread until it returns.
pub trait StreamBody: Send {
    fn run(self: Box<Self>, stream: TcpStream);
}

pub enum Body {
    Bytes(Vec<u8>),
    Stream(Box<dyn StreamBody>),
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Body::Stream(_) => f.write_str("Stream"),
        }
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

fn status_reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown")
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Bytes(Vec::new()),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = Body::Bytes(bytes.into());
        self
    }

    pub fn stream(mut self, body: impl StreamBody + 'static) -> Self {
        self.body = Body::Stream(Box::new(body));
        self
    }

    pub fn html(status: StatusCode, html: impl Into<String>) -> Self {
        Self::new(status)
            .header("Content-Type", "text/html")
            .body(html.into())
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(text.into())
    }

    pub fn json(status: StatusCode, value: &Value) -> Self {
        Self::new(status)
            .header("Content-Type", "application/json")
            .body(value.to_string())
    }

    pub fn bad_request(reason: &str) -> Self {
        Self::text(StatusCode::BAD_REQUEST, format!("400 Bad Request: {reason}\n"))
    }

    pub fn method_not_allowed(method: &http::Method) -> Self {
        Self::text(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("405 Method Not Allowed: {method} is not supported, use GET\n"),
        )
        .header("Allow", "GET")
    }

    /// Case-insensitive header lookup (first match).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.body, Body::Stream(_))
    }

    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Bytes(b) => Some(b),
            Body::Stream(_) => None,
        }
    }

    /// Status line and headers, terminated by the blank line.
    ///
    /// Byte bodies get `Content-Length` and `Connection: close` unless the
    /// handler set them; streaming bodies are delimited by connection close.
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status.as_u16(),
            status_reason(self.status)
        );
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        if let Body::Bytes(bytes) = &self.body {
            if self.get_header("content-length").is_none() {
                head.push_str(&format!("Content-Length: {}\r\n", bytes.len()));
            }
            if self.get_header("connection").is_none() {
                head.push_str("Connection: close\r\n");
            }
        }
        head.push_str("\r\n");
        head.into_bytes()
    }

    /// Write the head (and byte body) to `w`. A streaming body is handed back
    /// to the caller, who owns the socket it must run on.
    pub fn write_to<W: Write>(self, w: &mut W) -> io::Result<Option<Box<dyn StreamBody>>> {
        let mut out = self.head_bytes();
        match self.body {
            Body::Bytes(bytes) => {
                out.extend_from_slice(&bytes);
                w.write_all(&out)?;
                w.flush()?;
                Ok(None)
            }
            Body::Stream(body) => {
                w.write_all(&out)?;
                w.flush()?;
                Ok(Some(body))
            }
        }
    }
}
