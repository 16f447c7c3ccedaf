//! HTTP test server utilities.
//!
//! WHY: Provides a real HTTP server built on stdlib TCP so client tests
//! exercise actual sockets, including slow and silent peers.
//!
//! WHAT: `TestHttpServer` for integration testing HTTP clients, plain or TLS.
//!
//! HOW: Uses stdlib's `TcpListener` with one thread per connection and
//! hand-crafted HTTP/1.0 responses; TLS goes through `rustls::StreamOwned`.

mod server;

pub use server::{unused_local_addr, HttpRequest, HttpResponse, TestHttpServer};
