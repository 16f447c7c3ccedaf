//! Test HTTP server implementation.
//!
//! WHY: Provides a real HTTP server for client integration tests, including
//! the misbehaving peers (slow, silent, non-HTTP) that unit tests only mock.
//!
//! WHAT: `TestHttpServer` that listens on localhost, records each request and
//! answers according to its behaviour.
//!
//! HOW: A non-blocking accept loop on a background thread hands every
//! connection to its own thread. Requests are parsed just far enough to
//! read the head and a `Content-Length` body.
//!
//! NOTE: This is a simplified test server. It reads one request per
//! connection and always closes afterwards.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::fixtures;

type ResponseHandler = Arc<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// Request as received by the test server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request target (e.g., "/test?q=1")
    pub path: String,
    /// HTTP version (e.g., "HTTP/1.0")
    pub proto: String,
    /// Request headers, in the order received
    pub headers: Vec<(String, String)>,
    /// Body, read according to `Content-Length`
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// First value of the named header, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// How many times the named header was sent.
    #[must_use]
    pub fn header_count(&self, name: &str) -> usize {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .count()
    }
}

/// Simple HTTP response representation for testing.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code (e.g., 200)
    pub status: u16,
    /// Status text (e.g., "OK")
    pub status_text: String,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create 200 OK response with body.
    #[must_use]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        let body_bytes = body.into();
        Self {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("Content-Length".to_string(), body_bytes.len().to_string()),
            ],
            body: body_bytes,
        }
    }

    /// Create custom status response.
    #[must_use]
    pub fn status(code: u16, text: &str) -> Self {
        Self {
            status: code,
            status_text: text.to_string(),
            headers: vec![("Content-Length".to_string(), "0".to_string())],
            body: Vec::new(),
        }
    }

    /// Adds a header, builder style.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Render response to HTTP/1.0 format.
    #[must_use]
    pub fn render(&self) -> Vec<u8> {
        let mut response = format!("HTTP/1.0 {} {}\r\n", self.status, self.status_text);

        for (key, value) in &self.headers {
            response.push_str(key);
            response.push_str(": ");
            response.push_str(value);
            response.push_str("\r\n");
        }

        response.push_str("\r\n");

        let mut bytes = response.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

#[derive(Clone)]
enum Behaviour {
    Handler(ResponseHandler),
    Raw(Arc<Vec<u8>>),
    Chunks(Arc<Vec<Vec<u8>>>, Duration),
    Silent,
}

struct Shared {
    behaviour: Behaviour,
    tls: Option<Arc<rustls::ServerConfig>>,
    running: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

/// Test HTTP server for integration testing.
///
/// # Purpose (WHY)
///
/// Provides a real HTTP server for testing HTTP clients without external
/// dependencies, and records what the client actually put on the wire.
///
/// # What it does
///
/// Starts a local server on a random port, accepts connections, reads one
/// request from each and responds according to how it was started. Runs in
/// a background thread; stops accepting when dropped.
///
/// # Examples
///
/// ```rust
/// use foundation_testing::http::TestHttpServer;
///
/// let server = TestHttpServer::start();
/// assert!(server.url("/test").starts_with("http://127.0.0.1:"));
///
/// // Server automatically stops when dropped
/// ```
pub struct TestHttpServer {
    addr: SocketAddr,
    scheme: &'static str,
    _handle: Option<thread::JoinHandle<()>>,
    running: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl TestHttpServer {
    /// Start a server that answers 200 OK with body `OK` to every request.
    #[must_use]
    pub fn start() -> Self {
        Self::with_response(|_req| HttpResponse::ok(b"OK"))
    }

    /// Start server with custom response handler.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use foundation_testing::http::{HttpResponse, TestHttpServer};
    ///
    /// let server = TestHttpServer::with_response(|req| {
    ///     if req.path == "/missing" {
    ///         HttpResponse::status(404, "Not Found")
    ///     } else {
    ///         HttpResponse::ok(b"Success")
    ///     }
    /// });
    /// ```
    #[must_use]
    pub fn with_response<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        Self::spawn(Behaviour::Handler(Arc::new(handler)), None)
    }

    /// Start a server that writes `bytes` verbatim after reading a request.
    ///
    /// Useful for malformed or non-HTTP replies.
    #[must_use]
    pub fn with_raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self::spawn(Behaviour::Raw(Arc::new(bytes.into())), None)
    }

    /// Start a server that writes each chunk, then sleeps `delay`.
    #[must_use]
    pub fn with_chunks(chunks: Vec<Vec<u8>>, delay: Duration) -> Self {
        Self::spawn(Behaviour::Chunks(Arc::new(chunks), delay), None)
    }

    /// Start a server that reads the request and never answers.
    ///
    /// Connections are held open until the server is dropped.
    #[must_use]
    pub fn silent() -> Self {
        Self::spawn(Behaviour::Silent, None)
    }

    /// Start a TLS server presenting the `localhost` fixture certificate.
    ///
    /// Clients must trust [`fixtures::ca_cert_path`] and connect to the
    /// host name `localhost` for verification to succeed.
    ///
    /// # Panics
    ///
    /// Panics if the fixture certificate or key cannot be loaded.
    #[must_use]
    pub fn start_tls<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        let config = load_server_config(&fixtures::server_cert_path(), &fixtures::server_key_path())
            .expect("Failed to load TLS fixtures");
        Self::spawn(Behaviour::Handler(Arc::new(handler)), Some(config))
    }

    fn spawn(behaviour: Behaviour, tls: Option<Arc<rustls::ServerConfig>>) -> Self {
        let listener =
            TcpListener::bind("127.0.0.1:0").expect("Failed to bind test HTTP server to localhost");
        let addr = listener
            .local_addr()
            .expect("Failed to read test HTTP server address");
        let scheme = if tls.is_some() { "https" } else { "http" };

        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::new(Shared {
            behaviour,
            tls,
            running: Arc::clone(&running),
            requests: Arc::clone(&requests),
        });

        let handle = thread::spawn(move || {
            // Set non-blocking so we can check running flag
            listener
                .set_nonblocking(true)
                .expect("Failed to set non-blocking");

            while shared.running.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, peer)) => {
                        tracing::info!(%peer, "test server accepted connection");
                        let shared = Arc::clone(&shared);
                        // Handle each connection in separate thread
                        thread::spawn(move || {
                            if let Err(err) = handle_connection(stream, &shared) {
                                tracing::info!(error = %err, "test server connection error");
                            }
                        });
                    }
                    Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                        // No connection available, sleep briefly and check again
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(err) => {
                        tracing::info!(error = %err, "test server accept error");
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            scheme,
            _handle: Some(handle),
            running,
            requests,
        }
    }

    /// Socket address the server listens on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get full URL for a path on this test server.
    ///
    /// TLS servers use the host name `localhost` so the certificate matches.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use foundation_testing::http::TestHttpServer;
    ///
    /// let server = TestHttpServer::start();
    /// assert!(server.url("/test").ends_with("/test"));
    /// ```
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Base URL without path (e.g., "<http://127.0.0.1:54321>").
    #[must_use]
    pub fn base_url(&self) -> String {
        match self.scheme {
            "https" => format!("https://localhost:{}", self.addr.port()),
            _ => format!("http://{}", self.addr),
        }
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits up to `timeout` for at least `count` requests to arrive.
    #[must_use]
    pub fn wait_for_requests(&self, count: usize, timeout: Duration) -> Vec<HttpRequest> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let requests = self.requests();
            if requests.len() >= count || std::time::Instant::now() >= deadline {
                return requests;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        // Signal server thread to stop
        self.running.store(false, Ordering::Relaxed);
        // Thread will exit on next loop iteration
    }
}

/// An address on localhost that nothing is listening on.
///
/// # Panics
///
/// Panics if no ephemeral port can be bound.
#[must_use]
pub fn unused_local_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind probe listener");
    listener
        .local_addr()
        .expect("Failed to read probe listener address")
}

fn load_server_config(
    cert: &Path,
    key: &Path,
) -> Result<Arc<rustls::ServerConfig>, Box<dyn std::error::Error + Send + Sync>> {
    let mut cert_pem = Vec::new();
    File::open(cert)?.read_to_end(&mut cert_pem)?;
    let mut key_pem = Vec::new();
    File::open(key)?.read_to_end(&mut key_pem)?;

    let certs: Result<Vec<CertificateDer<'static>>, rustls::pki_types::pem::Error> =
        CertificateDer::pem_slice_iter(&cert_pem).collect();
    let private_key = PrivateKeyDer::from_pem_slice(&key_pem)?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs?, private_key)?;

    Ok(Arc::new(config))
}

fn handle_connection(stream: TcpStream, shared: &Shared) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;

    match &shared.tls {
        Some(config) => {
            let connection = rustls::ServerConnection::new(Arc::clone(config))
                .map_err(io::Error::other)?;
            let mut tls = rustls::StreamOwned::new(connection, stream);
            serve(&mut tls, shared)?;
            tls.conn.send_close_notify();
            tls.flush()
        }
        None => {
            let mut stream = stream;
            serve(&mut stream, shared)
        }
    }
}

fn serve<S: Read + Write>(stream: &mut S, shared: &Shared) -> io::Result<()> {
    let request = read_request(stream)?;
    tracing::info!(
        method = %request.method,
        path = %request.path,
        body = request.body.len(),
        "test server received request"
    );

    shared
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(request.clone());

    match &shared.behaviour {
        Behaviour::Handler(handler) => {
            let response = handler(&request);
            stream.write_all(&response.render())?;
        }
        Behaviour::Raw(bytes) => stream.write_all(bytes)?,
        Behaviour::Chunks(chunks, delay) => {
            for chunk in chunks.iter() {
                stream.write_all(chunk)?;
                stream.flush()?;
                thread::sleep(*delay);
            }
        }
        Behaviour::Silent => {
            while shared.running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    stream.flush()
}

fn read_request<S: Read>(stream: &mut S) -> io::Result<HttpRequest> {
    let mut reader = BufReader::new(stream);

    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before request line",
        ));
    }

    let mut intro = line.trim_end().splitn(3, ' ');
    let method = intro.next().unwrap_or_default().to_string();
    let path = intro.next().unwrap_or_default().to_string();
    let proto = intro.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;

    Ok(HttpRequest {
        method,
        path,
        proto,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(addr: SocketAddr, request: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(request).unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        reply
    }

    /// WHY: Verify TestHttpServer can start and provides valid URL
    /// WHAT: Tests basic construction and URL generation
    #[test]
    fn test_server_start() {
        let server = TestHttpServer::start();
        assert!(server.base_url().starts_with("http://127.0.0.1:"));
        assert!(server.url("/test").ends_with("/test"));
    }

    /// WHY: Tests rely on the server recording exactly what was sent
    /// WHAT: Sends a POST by hand and checks the recorded request and reply
    #[test]
    fn test_records_request_and_replies() {
        let server = TestHttpServer::with_response(|req| {
            HttpResponse::ok(req.body.clone()).with_header("X-Echo", &req.path)
        });

        let reply = roundtrip(
            server.addr(),
            b"POST /echo HTTP/1.0\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello",
        );

        assert!(reply.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(reply.contains("X-Echo: /echo\r\n"));
        assert!(reply.ends_with("\r\n\r\nhello"));

        let requests = server.wait_for_requests(1, Duration::from_secs(5));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].proto, "HTTP/1.0");
        assert_eq!(requests[0].header("host"), Some("localhost"));
        assert_eq!(requests[0].header_count("Content-Length"), 1);
        assert_eq!(requests[0].body, b"hello");
    }

    /// WHY: Raw mode must send bytes exactly as given
    /// WHAT: Non-HTTP bytes come back verbatim
    #[test]
    fn test_raw_reply() {
        let server = TestHttpServer::with_raw("SSH-2.0-OpenSSH_9.6\r\n");
        let reply = roundtrip(server.addr(), b"GET / HTTP/1.0\r\n\r\n");
        assert_eq!(reply, "SSH-2.0-OpenSSH_9.6\r\n");
    }

    /// WHY: Verify HttpResponse::status renders an empty body
    /// WHAT: Tests status line and Content-Length of a 404
    #[test]
    fn test_http_response_status_render() {
        let rendered = HttpResponse::status(404, "Not Found").render();
        assert_eq!(
            rendered,
            b"HTTP/1.0 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_vec()
        );
    }

    /// WHY: The TLS fixtures must form a usable server configuration
    /// WHAT: Loads the localhost certificate and key
    #[test]
    fn test_load_tls_fixtures() {
        let config = load_server_config(&fixtures::server_cert_path(), &fixtures::server_key_path());
        assert!(config.is_ok());

        let server = TestHttpServer::start_tls(|_| HttpResponse::ok(b"secure"));
        assert!(server.base_url().starts_with("https://localhost:"));
    }

    /// WHY: Fallback tests need an address that refuses connections
    /// WHAT: Connecting to the unused address fails
    #[test]
    fn test_unused_local_addr_refuses() {
        let addr = unused_local_addr();
        assert!(TcpStream::connect_timeout(&addr, Duration::from_secs(1)).is_err());
    }
}
