//! Test support for the foundation HTTP client.
//!
//! This crate provides:
//! - **Test HTTP server**: a thread-backed server that records every request
//!   and answers with a handler, raw bytes, delayed chunks or not at all
//! - **TLS variant**: the same server behind rustls, using the bundled
//!   `localhost` certificate
//! - **Fixtures**: paths to the test CA, server certificate and key
//!
//! # Examples
//!
//! ```rust
//! use foundation_testing::http::{HttpResponse, TestHttpServer};
//!
//! let server = TestHttpServer::with_response(|_req| HttpResponse::ok(b"hello"));
//! assert!(server.url("/greeting").ends_with("/greeting"));
//! assert!(server.requests().is_empty());
//! ```

#![allow(clippy::module_name_repetitions)] // Common for testing crates

pub mod fixtures;
pub mod http;
