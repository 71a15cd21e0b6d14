#![allow(dead_code)]

pub mod test_server {
    use obs_sse_server::ServerState;
    use std::fs;
    use std::net::SocketAddr;
    use tempfile::TempDir;

    pub const OVERLAY_HTML: &str = "<html><body><div id=\"counter\">0</div></body></html>\n";
    pub const APP_JS: &str = "new EventSource('/sse-stream');\n";

    /// Serving root with a couple of overlay files, kept alive by the
    /// returned `TempDir`.
    pub fn serving_root() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("overlay.html"), OVERLAY_HTML).unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/app.js"), APP_JS).unwrap();
        dir
    }

    pub fn start_server() -> (ServerState, SocketAddr, TempDir) {
        let root = serving_root();
        let state = ServerState::new();
        let addr = state.start("127.0.0.1", 0, root.path()).unwrap();
        (state, addr, root)
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// Send `raw` and read until the server closes the connection.
    pub fn send_request(addr: &SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        stream.write_all(raw.as_bytes()).unwrap();
        let mut buf = Vec::new();
        let mut tmp = [0u8; 4096];
        loop {
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn get(addr: &SocketAddr, path: &str) -> String {
        send_request(addr, &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n"))
    }

    pub fn status(resp: &str) -> u16 {
        resp.lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0)
    }

    pub fn header<'a>(resp: &'a str, name: &str) -> Option<&'a str> {
        let head = resp.split("\r\n\r\n").next()?;
        head.lines().skip(1).find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }

    pub fn body(resp: &str) -> &str {
        resp.split_once("\r\n\r\n").map_or("", |(_, b)| b)
    }
}

pub mod sse {
    use std::io::{ErrorKind, Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::{Duration, Instant};

    /// Raw event-stream client.
    pub struct SseClient {
        pub stream: TcpStream,
        buf: Vec<u8>,
    }

    impl SseClient {
        /// Connect, send the request and consume the response head.
        pub fn connect(addr: &SocketAddr) -> Self {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream
                .set_read_timeout(Some(Duration::from_millis(50)))
                .unwrap();
            stream
                .write_all(b"GET /sse-stream HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
                .unwrap();
            let mut client = Self {
                stream,
                buf: Vec::new(),
            };
            let head = client
                .read_until(b"\r\n\r\n", Duration::from_secs(2))
                .expect("no response head");
            let head = String::from_utf8(head).unwrap();
            assert!(head.starts_with("HTTP/1.1 200"), "unexpected head: {head}");
            assert!(
                head.to_ascii_lowercase()
                    .contains("content-type: text/event-stream"),
                "unexpected head: {head}"
            );
            client
        }

        fn read_until(&mut self, delim: &[u8], timeout: Duration) -> Option<Vec<u8>> {
            let deadline = Instant::now() + timeout;
            loop {
                if let Some(pos) = self.buf.windows(delim.len()).position(|w| w == delim) {
                    let rest = self.buf.split_off(pos + delim.len());
                    return Some(std::mem::replace(&mut self.buf, rest));
                }
                if Instant::now() >= deadline {
                    return None;
                }
                let mut tmp = [0u8; 1024];
                match self.stream.read(&mut tmp) {
                    Ok(0) => return None,
                    Ok(n) => self.buf.extend_from_slice(&tmp[..n]),
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                    Err(_) => return None,
                }
            }
        }

        /// Next complete frame, including its terminating blank line.
        pub fn next_frame(&mut self, timeout: Duration) -> Option<String> {
            self.read_until(b"\n\n", timeout)
                .map(|raw| String::from_utf8(raw).unwrap())
        }

        /// True once the server has closed the stream.
        pub fn wait_closed(&mut self, timeout: Duration) -> bool {
            let deadline = Instant::now() + timeout;
            let mut tmp = [0u8; 1024];
            while Instant::now() < deadline {
                match self.stream.read(&mut tmp) {
                    Ok(0) => return true,
                    Ok(_) => {}
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                    Err(_) => return true,
                }
            }
            false
        }
    }

    /// `event: <name>\ndata: <data>\n\n`
    pub fn frame(name: &str, data: &str) -> String {
        format!("event: {name}\ndata: {data}\n\n")
    }
}
