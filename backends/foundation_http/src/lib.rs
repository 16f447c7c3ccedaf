//! Asynchronous single-request HTTP/HTTPS client.
//!
//! An [`HttpClient`] resolves the host, connects to the first endpoint that
//! accepts, optionally negotiates TLS, writes an HTTP/1.0 request and reads
//! the response until the peer closes. The outcome is delivered once to the
//! client's completion subscribers.

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::module_inception)]

pub mod client;
pub mod config;
pub mod dispatch;
pub mod dns;
pub mod errors;
pub mod message;
pub mod tls;
pub mod transport;
pub mod url;

pub use client::{Completion, CompletionSignal, HttpClient};
pub use config::ClientConfig;
pub use dispatch::{SessionDispatcher, SessionQueue};
pub use dns::{DnsResolver, MockDnsResolver, StaticSocketAddr, SystemDnsResolver};
pub use errors::{DnsError, ErrorKind, HttpClientError};
pub use message::{Header, Message, Method, Response};
pub use url::{ParsedUrl, Scheme};
