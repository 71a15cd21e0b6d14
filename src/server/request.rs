use crate::error::RequestError;
use http::{Method, Version};
use std::collections::HashMap;
use std::io::{self, BufRead, ErrorKind};
use tracing::debug;

/// Largest request head (request line plus headers) we will buffer.
pub const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Parsed HTTP request head.
///
/// The server never reads a request body: every route is a `GET`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub method: Method,
    /// Request target exactly as sent (path plus query string)
    pub target: String,
    /// Percent-decoded path with query string and fragment stripped
    pub path: String,
    pub version: Version,
    /// HTTP headers (lowercase keys)
    pub headers: HashMap<String, String>,
    /// Parsed query string parameters
    pub query_params: HashMap<String, String>,
}

impl ParsedRequest {
    /// A bare `GET` for `target`, as a browser would send it.
    pub fn get(target: &str) -> Self {
        Self {
            method: Method::GET,
            target: target.to_string(),
            path: normalize_path(target).unwrap_or_else(|_| target.to_string()),
            version: Version::HTTP_11,
            headers: HashMap::new(),
            query_params: parse_query_params(target),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Parse query string parameters from a request target
///
/// Extracts everything after the `?` character and URL-decodes parameter names and values.
pub fn parse_query_params(target: &str) -> HashMap<String, String> {
    let without_fragment = target.split('#').next().unwrap_or("");
    if let Some(pos) = without_fragment.find('?') {
        let query_str = &without_fragment[pos + 1..];
        url::form_urlencoded::parse(query_str.as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        HashMap::new()
    }
}

/// Strip query and fragment from `target` and percent-decode what is left.
///
/// Absolute-form targets (`http://host/path`) are reduced to their path.
pub fn normalize_path(target: &str) -> Result<String, RequestError> {
    let raw = if target.starts_with('/') {
        target
            .split(['?', '#'])
            .next()
            .unwrap_or("/")
            .to_string()
    } else if target.contains("://") {
        url::Url::parse(target)
            .map_err(|e| RequestError::Malformed(format!("bad request target: {e}")))?
            .path()
            .to_string()
    } else {
        return Err(RequestError::Malformed(format!(
            "request target must be a path: {target}"
        )));
    };
    let decoded = urlencoding::decode(&raw)
        .map_err(|_| RequestError::Malformed("path is not valid UTF-8".to_string()))?;
    if decoded.contains('\0') {
        return Err(RequestError::Malformed("path contains NUL".to_string()));
    }
    Ok(decoded.into_owned())
}

/// Most headers accepted in one request head.
pub const MAX_HEADERS: usize = 64;

fn version_from_minor(minor: Option<u8>) -> Result<Version, RequestError> {
    match minor {
        Some(1) => Ok(Version::HTTP_11),
        Some(0) => Ok(Version::HTTP_10),
        other => Err(RequestError::Malformed(format!(
            "unsupported protocol version: {other:?}"
        ))),
    }
}

/// Buffer bytes from `reader` until `httparse` sees a complete head.
///
/// Returns the buffered bytes and the length of the head inside them.
fn read_head<R: BufRead>(reader: &mut R) -> Result<(Vec<u8>, usize), RequestError> {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    loop {
        let chunk = reader.fill_buf()?;
        if chunk.is_empty() {
            let reason = if buf.is_empty() {
                "connection closed before request line"
            } else {
                "connection closed inside request head"
            };
            return Err(RequestError::Io(io::Error::new(ErrorKind::UnexpectedEof, reason)));
        }
        let room = MAX_HEAD_BYTES - buf.len();
        let take = chunk.len().min(room);
        buf.extend_from_slice(&chunk[..take]);
        reader.consume(take);

        let status = {
            let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
            let mut req = httparse::Request::new(&mut headers);
            req.parse(&buf)
        };
        match status {
            Ok(httparse::Status::Complete(len)) => return Ok((buf, len)),
            Ok(httparse::Status::Partial) if buf.len() >= MAX_HEAD_BYTES => {
                return Err(RequestError::TooLarge {
                    limit: MAX_HEAD_BYTES,
                })
            }
            Ok(httparse::Status::Partial) => {}
            Err(e) => return Err(RequestError::Malformed(e.to_string())),
        }
    }
}

/// Read and parse a request head from `reader`.
///
/// # Errors
///
/// - [`RequestError::Io`] when the client disconnects or times out before the head is complete
/// - [`RequestError::Malformed`] for a broken request line or header
/// - [`RequestError::TooLarge`] when the head exceeds [`MAX_HEAD_BYTES`]
pub fn parse_request<R: BufRead>(reader: &mut R) -> Result<ParsedRequest, RequestError> {
    let (buf, len) = read_head(reader)?;
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut raw_headers);
    req.parse(&buf[..len])
        .map_err(|e| RequestError::Malformed(e.to_string()))?;

    let (Some(method), Some(target)) = (req.method, req.path) else {
        return Err(RequestError::Malformed("incomplete request line".to_string()));
    };
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| RequestError::Malformed(format!("bad method: {method}")))?;
    let version = version_from_minor(req.version)?;
    let path = normalize_path(target)?;

    let mut headers = HashMap::with_capacity(req.headers.len());
    for header in req.headers.iter() {
        let value = std::str::from_utf8(header.value).map_err(|_| {
            RequestError::Malformed(format!("header {} is not valid UTF-8", header.name))
        })?;
        headers.insert(header.name.to_ascii_lowercase(), value.trim().to_string());
    }

    let query_params = parse_query_params(target);
    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        "HTTP request parsed"
    );

    Ok(ParsedRequest {
        method,
        target: target.to_string(),
        path,
        version,
        headers,
        query_params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(raw: &str) -> Result<ParsedRequest, RequestError> {
        parse_request(&mut Cursor::new(raw.as_bytes().to_vec()))
    }

    #[test]
    fn parses_browser_get() {
        let req = parse(
            "GET /sse-stream?v=2 HTTP/1.1\r\nHost: localhost:8080\r\nAccept: text/event-stream\r\n\r\n",
        )
        .unwrap();
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.path, "/sse-stream");
        assert_eq!(req.target, "/sse-stream?v=2");
        assert_eq!(req.version, Version::HTTP_11);
        assert_eq!(req.header("Accept"), Some("text/event-stream"));
        assert_eq!(req.query_params.get("v"), Some(&"2".to_string()));
    }

    #[test]
    fn decodes_percent_escapes_in_path() {
        let req = parse("GET /my%20page.html HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(req.path, "/my page.html");
        assert_eq!(req.version, Version::HTTP_10);
    }

    #[test]
    fn encoded_dot_segments_are_decoded_for_the_file_handler() {
        let req = parse("GET /%2e%2e/%2e%2e/etc/passwd HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/../../etc/passwd");
    }

    #[test]
    fn absolute_form_target_reduced_to_path() {
        let req = parse("GET http://localhost:8080/status?x=1 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/status");
    }

    #[test]
    fn accepts_bare_lf_line_endings() {
        let req = parse("GET /json-data HTTP/1.1\nHost: x\n\n").unwrap();
        assert_eq!(req.path, "/json-data");
    }

    #[test]
    fn rejects_garbage_request_line() {
        assert!(matches!(
            parse("HELLO\r\n\r\n"),
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(
            parse("GET /a HTTP/9.9\r\n\r\n"),
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(
            parse("GET relative HTTP/1.1\r\n\r\n"),
            Err(RequestError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_bad_header() {
        assert!(matches!(
            parse("GET / HTTP/1.1\r\nno-colon-here\r\n\r\n"),
            Err(RequestError::Malformed(_))
        ));
    }

    #[test]
    fn tolerates_leading_blank_line() {
        let req = parse("\r\nGET /status HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/status");
    }

    #[test]
    fn head_split_across_reads() {
        let raw = b"GET /json-data HTTP/1.1\r\nHost: x\r\n\r\n".to_vec();
        // A 4-byte buffer forces many fill_buf rounds.
        let mut reader = std::io::BufReader::with_capacity(4, Cursor::new(raw));
        let req = parse_request(&mut reader).unwrap();
        assert_eq!(req.path, "/json-data");
        assert_eq!(req.header("host"), Some("x"));
    }

    #[test]
    fn too_many_headers_is_malformed() {
        let mut raw = String::from("GET / HTTP/1.1\r\n");
        for i in 0..=MAX_HEADERS {
            raw.push_str(&format!("X-{i}: v\r\n"));
        }
        raw.push_str("\r\n");
        assert!(matches!(parse(&raw), Err(RequestError::Malformed(_))));
    }

    #[test]
    fn truncated_head_is_io_error() {
        assert!(matches!(
            parse("GET /status HTTP/1.1\r\nHost: x\r\n"),
            Err(RequestError::Io(_))
        ));
    }

    #[test]
    fn empty_stream_is_io_error() {
        assert!(matches!(parse(""), Err(RequestError::Io(_))));
    }

    #[test]
    fn oversized_head_is_rejected() {
        let raw = format!(
            "GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n",
            "a".repeat(MAX_HEAD_BYTES)
        );
        assert!(matches!(parse(&raw), Err(RequestError::TooLarge { .. })));
    }

    #[test]
    fn parse_query_params_decodes() {
        let q = parse_query_params("/p?x=1&y=hello%20world#frag");
        assert_eq!(q.get("x"), Some(&"1".to_string()));
        assert_eq!(q.get("y"), Some(&"hello world".to_string()));
    }
}
