//! Minimal HTTP/1.1 transport.
//!
//! No async runtime: one thread accepts connections and each connection is
//! served on its own thread. Requests are read by `Content-Length`, and
//! connections are kept alive until the peer closes them or asks for
//! `Connection: close`.
//!
//! `POST` to the endpoint path goes through the [`Router`]; anything else gets a
//! plain-text 404 or 405.
//!
//! ```no_run
//! use std::sync::Arc;
//! use thread_session::admission::{AdmissionPolicy, ModeSwitch};
//! use thread_session::dispatch::Router;
//! use thread_session::http::Server;
//! use thread_session::mcp::tools::ToolRegistry;
//! use thread_session::session::SessionRegistry;
//!
//! let policy = AdmissionPolicy::new(Arc::new(SessionRegistry::new()), ModeSwitch::environment());
//! let router = Router::new(policy, Arc::new(ToolRegistry::new()));
//! let server = Server::bind("127.0.0.1:8000", router, "/mcp").unwrap();
//! println!("listening on {}", server.local_addr());
//! server.join();
//! ```

use crate::dispatch::Router;
use logwise::privacy::LogIt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::JoinHandle;

const MAX_HEADER_LINES: usize = 100;
const MAX_LINE_BYTES: usize = 8 * 1024;
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Request headers, in arrival order, with names as the client spelled them.
///
/// Lookups with [`get`](Self::get) are exact; callers that want case-insensitive
/// matching ask for it explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// The first value whose header name is exactly `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// The first value whose header name matches `name` ignoring ASCII case.
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

#[derive(Debug, thiserror::Error)]
enum HttpError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed request: {0}")]
    Malformed(String),
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    headers: Headers,
    body: Vec<u8>,
}

/// Reads one CRLF- or LF-terminated line of at most [`MAX_LINE_BYTES`].
///
/// `Ok(None)` means end of stream before any byte was read.
fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>, HttpError> {
    let mut line = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_BYTES as u64 + 1)
        .read_until(b'\n', &mut line)?;
    if read == 0 {
        return Ok(None);
    }
    if line.len() > MAX_LINE_BYTES {
        return Err(HttpError::Malformed(format!("line longer than {MAX_LINE_BYTES} bytes")));
    }
    String::from_utf8(line)
        .map(Some)
        .map_err(|_| HttpError::Malformed("line is not valid UTF-8".to_string()))
}

/// Reads one request. `Ok(None)` means the peer closed the connection cleanly.
fn read_request<R: BufRead>(reader: &mut R) -> Result<Option<HttpRequest>, HttpError> {
    let Some(line) = read_line(reader)? else {
        return Ok(None);
    };
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(_version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::Malformed(format!("bad request line {:?}", line.trim_end())));
    };
    let method = method.to_string();
    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut headers = Headers::new();
    loop {
        let Some(line) = read_line(reader)? else {
            return Err(HttpError::Malformed("connection closed inside headers".to_string()));
        };
        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        if headers.entries.len() == MAX_HEADER_LINES {
            return Err(HttpError::Malformed("too many headers".to_string()));
        }
        let Some((name, value)) = header.split_once(':') else {
            return Err(HttpError::Malformed(format!("bad header line {header:?}")));
        };
        headers.insert(name.trim(), value.trim());
    }

    let content_length = match headers.get_ignore_case("Content-Length") {
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| HttpError::Malformed(format!("bad Content-Length {value:?}")))?,
        None => 0,
    };
    if content_length > MAX_BODY_BYTES {
        return Err(HttpError::Malformed(format!("body of {content_length} bytes is too large")));
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body)?;

    Ok(Some(HttpRequest {
        method,
        path,
        headers,
        body,
    }))
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

fn write_response<W: Write>(
    stream: &mut W,
    status: u16,
    content_type: &str,
    body: &[u8],
    keep_alive: bool,
) -> io::Result<()> {
    let connection = if keep_alive { "keep-alive" } else { "close" };
    write!(
        stream,
        "HTTP/1.1 {status} {}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: {connection}\r\n\r\n",
        reason_phrase(status),
        body.len()
    )?;
    stream.write_all(body)?;
    stream.flush()
}

struct Endpoint {
    router: Router,
    path: String,
}

impl Endpoint {
    /// Status, content type and body for `request`.
    fn respond(&self, request: &HttpRequest) -> (u16, &'static str, Vec<u8>) {
        if request.path != self.path {
            return (404, "text/plain", b"404 Not Found".to_vec());
        }
        if request.method != "POST" {
            return (405, "text/plain", b"405 Method Not Allowed".to_vec());
        }
        let reply = self.router.handle(&request.headers, &request.body);
        match serde_json::to_vec(&reply.response) {
            Ok(body) => (reply.status, "application/json", body),
            Err(e) => {
                logwise::error_sync!("Failed to serialize response: {e}", e = LogIt(&e));
                (500, "text/plain", b"500 Internal Server Error".to_vec())
            }
        }
    }
}

fn serve_connection(stream: TcpStream, endpoint: &Endpoint) -> Result<(), HttpError> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    loop {
        let request = match read_request(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(HttpError::Malformed(reason)) => {
                logwise::warn_sync!("Malformed HTTP request: {reason}", reason = LogIt(&reason));
                write_response(&mut writer, 400, "text/plain", reason.as_bytes(), false)?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let keep_alive = !request
            .headers
            .get_ignore_case("Connection")
            .is_some_and(|value| value.eq_ignore_ascii_case("close"));
        let (status, content_type, body) = endpoint.respond(&request);
        write_response(&mut writer, status, content_type, &body, keep_alive)?;
        if !keep_alive {
            return Ok(());
        }
    }
}

/// A running HTTP server.
pub struct Server {
    local_addr: SocketAddr,
    accept_thread: JoinHandle<()>,
}

impl Server {
    /// Binds `addr` and starts accepting in the background.
    ///
    /// Requests are served at `path` (for example `"/mcp"`).
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        router: Router,
        path: impl Into<String>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let endpoint = Arc::new(Endpoint {
            router,
            path: path.into(),
        });
        logwise::info_sync!("MCP/HTTP listening on {addr}", addr = LogIt(&local_addr));
        let accept_thread = std::thread::Builder::new()
            .name("thread-session-server".to_string())
            .spawn(move || {
                for stream in listener.incoming() {
                    match stream {
                        Ok(stream) => Self::on_accept(stream, endpoint.clone()),
                        Err(e) => {
                            logwise::warn_sync!("Failed to accept connection: {e}", e = LogIt(&e))
                        }
                    }
                }
            })?;
        Ok(Server {
            local_addr,
            accept_thread,
        })
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Blocks until the accept loop ends, which in practice is never.
    pub fn join(self) {
        if self.accept_thread.join().is_err() {
            logwise::error_sync!("Accept thread panicked");
        }
    }

    fn on_accept(stream: TcpStream, endpoint: Arc<Endpoint>) {
        let peer = stream.peer_addr().ok();
        let label = peer.map_or_else(|| "unknown".to_string(), |p| p.to_string());
        let spawned = std::thread::Builder::new()
            .name(format!("thread-session-{label}"))
            .spawn(move || {
                if let Err(e) = serve_connection(stream, &endpoint) {
                    logwise::warn_sync!(
                        "Connection from {peer} ended: {e}",
                        peer = LogIt(&peer),
                        e = LogIt(&e)
                    );
                }
            });
        if let Err(e) = spawned {
            logwise::error_sync!("Failed to spawn connection thread: {e}", e = LogIt(&e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(raw: &str) -> Result<Option<HttpRequest>, HttpError> {
        read_request(&mut Cursor::new(raw.as_bytes().to_vec()))
    }

    #[test]
    fn reads_request_with_body() {
        let raw = "POST /mcp?x=1 HTTP/1.1\r\nX-Session-ID: t1\r\nContent-Length: 2\r\n\r\n{}";
        let request = parse(raw).unwrap().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/mcp");
        assert_eq!(request.headers.get("X-Session-ID"), Some("t1"));
        assert_eq!(request.headers.get("x-session-id"), None);
        assert_eq!(request.body, b"{}");
    }

    #[test]
    fn missing_content_length_means_empty_body() {
        let request = parse("GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap().unwrap();
        assert!(request.body.is_empty());
        assert_eq!(request.headers.get_ignore_case("HOST"), Some("x"));
    }

    #[test]
    fn clean_close_is_not_an_error() {
        assert!(parse("").unwrap().is_none());
    }

    #[test]
    fn malformed_requests_are_rejected() {
        for raw in [
            "NONSENSE\r\n\r\n",
            "POST /mcp HTTP/1.1\r\nno-colon\r\n\r\n",
            "POST /mcp HTTP/1.1\r\nContent-Length: lots\r\n\r\n",
            "POST /mcp HTTP/1.1\r\nHost: x\r\n",
        ] {
            assert!(matches!(parse(raw), Err(HttpError::Malformed(_))), "{raw:?}");
        }
    }

    #[test]
    fn oversized_lines_are_rejected() {
        let junk = "a".repeat(MAX_LINE_BYTES);
        let long_header = format!("POST /mcp HTTP/1.1\r\nX-Junk: {junk}\r\n\r\n");
        assert!(matches!(parse(&long_header), Err(HttpError::Malformed(_))));

        let long_target = format!("GET /{junk} HTTP/1.1\r\n\r\n");
        assert!(matches!(parse(&long_target), Err(HttpError::Malformed(_))));
    }

    #[test]
    fn non_utf8_header_is_malformed() {
        let mut raw = b"POST /mcp HTTP/1.1\r\nX-Junk: ".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe]);
        raw.extend_from_slice(b"\r\n\r\n");
        let parsed = read_request(&mut Cursor::new(raw));
        assert!(matches!(parsed, Err(HttpError::Malformed(_))));
    }

    #[test]
    fn response_carries_length_and_connection() {
        let mut out = Vec::new();
        write_response(&mut out, 404, "text/plain", b"nope", false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nnope"));
    }
}
