//! HTTP client integration tests using foundation_testing::TestHttpServer.
//!
//! WHY: Validates the client against a real server over real sockets,
//! including peers that are slow, silent or not HTTP at all.
//!
//! WHAT: Integration tests for the request wire format, response assembly,
//! endpoint fallback, the watchdog and the size ceiling.
//!
//! HOW: Uses foundation_testing::TestHttpServer (built on stdlib threads)
//! and collects each completion through a tokio channel.

use foundation_http::{
    ClientConfig, Completion, DnsResolver, ErrorKind, HttpClient, HttpClientError, Message,
    MockDnsResolver, SessionQueue, StaticSocketAddr,
};
use foundation_testing::http::{unused_local_addr, HttpRequest, HttpResponse, TestHttpServer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

fn subscribe<R: DnsResolver>(client: &HttpClient<R>) -> mpsc::UnboundedReceiver<Completion> {
    let (sender, receiver) = mpsc::unbounded_channel();
    client.on_done(move |outcome| {
        let _ = sender.send(outcome.clone());
    });
    receiver
}

async fn completion(receiver: &mut mpsc::UnboundedReceiver<Completion>) -> Completion {
    tokio::time::timeout(Duration::from_secs(15), receiver.recv())
        .await
        .expect("completion within 15 seconds")
        .expect("completion channel open")
}

fn only_request(server: &TestHttpServer) -> HttpRequest {
    let mut requests = server.wait_for_requests(1, Duration::from_secs(5));
    assert_eq!(requests.len(), 1, "expected exactly one request");
    requests.remove(0)
}

// ========================================================================
// Request and response flow
// ========================================================================

/// WHY: Verify a plain GET round trip against a real server
/// WHAT: Status, headers and body arrive; the request line is HTTP/1.0
#[tokio::test]
async fn test_get_request() {
    let server = TestHttpServer::with_response(|_| HttpResponse::ok(b"hello world"));
    let mut client = HttpClient::new();
    let mut receiver = subscribe(&client);

    client.get(&server.url("/greeting?lang=en")).unwrap();
    let response = completion(&mut receiver).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.body_text(), "hello world");

    let request = only_request(&server);
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/greeting?lang=en");
    assert_eq!(request.proto, "HTTP/1.0");
    let expected_host = format!("127.0.0.1:{}", server.addr().port());
    assert_eq!(request.header("Host"), Some(expected_host.as_str()));
    assert_eq!(request.header("Connection"), Some("close"));
    assert_eq!(request.header_count("Content-Length"), 0);
}

/// WHY: Non-2xx statuses are responses, not errors
/// WHAT: A 404 completes successfully with status 404
#[tokio::test]
async fn test_status_codes_are_not_errors() {
    let server = TestHttpServer::with_response(|req| match req.path.as_str() {
        "/missing" => HttpResponse::status(404, "Not Found"),
        _ => HttpResponse::ok(b"OK"),
    });
    let mut client = HttpClient::new();
    let mut receiver = subscribe(&client);

    client.get(&server.url("/missing")).unwrap();
    let response = completion(&mut receiver).await.unwrap();

    assert_eq!(response.status(), 404);
    assert!(response.body().is_empty());
}

/// WHY: POST bodies need exactly one Content-Length equal to the byte length
/// WHAT: The server sees one synthesized header and the full body
#[tokio::test]
async fn test_post_synthesizes_content_length() {
    let server = TestHttpServer::with_response(|req| HttpResponse::ok(req.body.clone()));
    let mut client = HttpClient::new();
    let mut receiver = subscribe(&client);
    let message = Message::new()
        .with_header("Content-Type", "application/json")
        .with_body(r#"{"name":"ewe"}"#);

    client.post(&server.url("/items"), &message).unwrap();
    let response = completion(&mut receiver).await.unwrap();
    assert_eq!(response.body_text(), r#"{"name":"ewe"}"#);

    let request = only_request(&server);
    assert_eq!(request.method, "POST");
    assert_eq!(request.header_count("Content-Length"), 1);
    assert_eq!(request.header("Content-Length"), Some("14"));
    assert_eq!(request.header("Content-Type"), Some("application/json"));
}

/// WHY: A caller supplied Content-Length must not be duplicated
/// WHAT: PUT with its own lower-case header sends it exactly once
#[tokio::test]
async fn test_put_keeps_caller_content_length() {
    let server = TestHttpServer::start();
    let mut client = HttpClient::new();
    let mut receiver = subscribe(&client);
    let message = Message::new()
        .with_header("content-length", "4")
        .with_body("data");

    client.put(&server.url("/items/1"), &message).unwrap();
    assert!(completion(&mut receiver).await.is_ok());

    let request = only_request(&server);
    assert_eq!(request.method, "PUT");
    assert_eq!(request.header_count("Content-Length"), 1);
    assert_eq!(request.body, b"data");
}

/// WHY: DELETE carries a body like POST and PUT
/// WHAT: An empty DELETE body is announced with Content-Length 0
#[tokio::test]
async fn test_delete_request() {
    let server = TestHttpServer::with_response(|_| HttpResponse::status(204, "No Content"));
    let mut client = HttpClient::new();
    let mut receiver = subscribe(&client);

    client.delete(&server.url("/items/1"), &Message::new()).unwrap();
    let response = completion(&mut receiver).await.unwrap();
    assert_eq!(response.status(), 204);

    let request = only_request(&server);
    assert_eq!(request.method, "DELETE");
    assert_eq!(request.header("Content-Length"), Some("0"));
}

/// WHY: Caller headers go out verbatim, duplicates and order included
/// WHAT: get_with_headers with two Accept headers
#[tokio::test]
async fn test_get_with_headers_preserves_order() {
    let server = TestHttpServer::start();
    let mut client = HttpClient::new();
    let mut receiver = subscribe(&client);

    client
        .get_with_headers(
            &server.url("/"),
            [("Accept", "text/html"), ("Accept", "application/json")],
        )
        .unwrap();
    assert!(completion(&mut receiver).await.is_ok());

    let request = only_request(&server);
    let accepts: Vec<_> = request
        .headers
        .iter()
        .filter(|(name, _)| name == "Accept")
        .map(|(_, value)| value.as_str())
        .collect();
    assert_eq!(accepts, ["text/html", "application/json"]);
}

/// WHY: Bodies arrive in pieces and must be reassembled in order
/// WHAT: A server writing the head and two body chunks with pauses
#[tokio::test]
async fn test_body_delivered_in_chunks() {
    let server = TestHttpServer::with_chunks(
        vec![
            b"HTTP/1.0 200 OK\r\nX-Stream: yes\r\n\r\n".to_vec(),
            b"part-one,".to_vec(),
            b"part-two".to_vec(),
        ],
        Duration::from_millis(50),
    );
    let mut client = HttpClient::new();
    let mut receiver = subscribe(&client);

    client.get(&server.url("/stream")).unwrap();
    let response = completion(&mut receiver).await.unwrap();

    assert_eq!(response.header("X-Stream"), Some("yes"));
    assert_eq!(response.body_text(), "part-one,part-two");
}

// ========================================================================
// Failure paths
// ========================================================================

/// WHY: Endpoints are tried in order until one accepts
/// WHAT: A refusing address followed by the live server still succeeds
#[tokio::test]
async fn test_fallback_to_second_endpoint() {
    let server = TestHttpServer::with_response(|_| HttpResponse::ok(b"second"));
    let resolver = StaticSocketAddr::from_addrs(vec![unused_local_addr(), server.addr()]);
    let mut client = HttpClient::with_resolver(resolver);
    let mut receiver = subscribe(&client);

    client.get("http://service.test/").unwrap();
    let response = completion(&mut receiver).await.unwrap();

    assert_eq!(response.body_text(), "second");
    assert_eq!(only_request(&server).header("Host"), Some("service.test"));
}

/// WHY: Exhausting every endpoint reports the connect failure
/// WHAT: A single refusing address yields a Connection error
#[tokio::test]
async fn test_connection_refused() {
    let resolver = StaticSocketAddr::new(unused_local_addr());
    let mut client = HttpClient::with_resolver(resolver);
    let mut receiver = subscribe(&client);

    client.get("http://service.test/").unwrap();
    let err = completion(&mut receiver).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
}

/// WHY: Unknown hosts fail at resolution
/// WHAT: MockDnsResolver without an answer yields a Resolution error
#[tokio::test]
async fn test_resolution_failure() {
    let mut client = HttpClient::with_resolver(MockDnsResolver::new());
    let mut receiver = subscribe(&client);

    client.get("http://unknown.test/").unwrap();
    let err = completion(&mut receiver).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Resolution);
}

/// WHY: A silent peer must not hang the request forever
/// WHAT: One second timeout against a server that never answers
#[tokio::test]
async fn test_timeout_against_silent_server() {
    let server = TestHttpServer::silent();
    let mut client = HttpClient::new();
    client.set_timeout(1);
    let mut receiver = subscribe(&client);
    let started = Instant::now();

    client.get(&server.url("/")).unwrap();
    let err = completion(&mut receiver).await.unwrap_err();

    assert!(matches!(err, HttpClientError::TimedOut));
    assert!(started.elapsed() >= Duration::from_millis(900));
    assert!(started.elapsed() < Duration::from_secs(10));
}

/// WHY: Non-HTTP peers are reported as protocol errors
/// WHAT: A server answering with an SSH banner
#[tokio::test]
async fn test_malformed_status_line() {
    let server = TestHttpServer::with_raw("SSH-2.0-OpenSSH_9.6\r\n\r\n");
    let mut client = HttpClient::new();
    let mut receiver = subscribe(&client);

    client.get(&server.url("/")).unwrap();
    let err = completion(&mut receiver).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Protocol);
}

/// WHY: The default ceiling is 64 KiB
/// WHAT: A 100 KiB body fails by default and succeeds when unlimited
#[tokio::test]
async fn test_response_size_ceiling() {
    let body = vec![b'x'; 100 * 1024];
    let server = TestHttpServer::with_response(move |_| HttpResponse::ok(body.clone()));

    let mut client = HttpClient::new();
    let mut receiver = subscribe(&client);
    client.get(&server.url("/large")).unwrap();
    let err = completion(&mut receiver).await.unwrap_err();
    assert!(matches!(err, HttpClientError::ResponseTooLarge { limit: 65536 }));

    let mut unlimited = HttpClient::new().with_config(ClientConfig {
        max_response_size: 0,
        ..ClientConfig::default()
    });
    let mut receiver = subscribe(&unlimited);
    unlimited.get(&server.url("/large")).unwrap();
    let response = completion(&mut receiver).await.unwrap();
    assert_eq!(response.body().len(), 100 * 1024);
}

// ========================================================================
// Session dispatch
// ========================================================================

/// WHY: Completions can be routed through a session queue
/// WHAT: The subscriber runs on the session worker and sees the response
#[tokio::test]
async fn test_completion_through_session_queue() {
    let server = TestHttpServer::start();
    let queue = Arc::new(SessionQueue::new(Handle::current()));
    let client = HttpClient::new().with_session(queue.clone(), "session-1");
    let mut receiver = subscribe(&client);
    let mut client = client;

    client.get(&server.url("/")).unwrap();
    let response = completion(&mut receiver).await.unwrap();

    assert_eq!(response.body_text(), "OK");
    assert_eq!(queue.session_count(), 1);
}
