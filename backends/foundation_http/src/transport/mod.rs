//! Byte transports driven by the connection state machine.
//!
//! WHY: The state machine must not care whether it talks over plain TCP or
//! TLS, and tests need to script the peer without sockets.
//!
//! WHAT: The `Transport` trait plus `PlainTransport`, `SecureTransport` and
//! `MockTransport` implementations.
//!
//! HOW: Each implementation owns its stream and a `ReadBuffer`; delimiter
//! search and over-read handling live in the buffer so all variants behave
//! the same way.

mod buffer;
mod mock;
mod plain;
mod secure;

pub use buffer::{ReadBuffer, ReadLimitExceeded};
pub use mock::{MockLog, MockTransport};
pub use plain::PlainTransport;
pub use secure::SecureTransport;

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::net::SocketAddr;

/// One connection's worth of byte I/O.
///
/// Only one operation is ever in flight at a time; the state machine awaits
/// each call before issuing the next.
#[async_trait]
pub trait Transport: Send {
    /// Opens the underlying stream to `endpoint`.
    async fn connect(&mut self, endpoint: SocketAddr) -> io::Result<()>;

    /// Negotiates TLS. Plain transports succeed immediately.
    async fn handshake(&mut self) -> io::Result<()>;

    /// Writes the whole buffer, returning the number of bytes written.
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Reads until `delimiter` and returns everything up to and including it.
    ///
    /// `max_len` caps how many bytes may pile up while the delimiter is
    /// still missing; see [`ReadBuffer::read_until`].
    async fn read_until(
        &mut self,
        delimiter: &[u8],
        max_len: Option<usize>,
    ) -> io::Result<Bytes>;

    /// Reads at least one byte. `Ok(None)` is end of stream.
    async fn read_some(&mut self) -> io::Result<Option<Bytes>>;

    /// Hands out bytes already received beyond the last delimited read.
    fn take_buffered(&mut self) -> Bytes;

    /// Closes the stream and drops buffered input. Idempotent.
    fn shutdown_and_close(&mut self);
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "transport is not connected")
}

/// Whether a body read error is really the peer closing the stream.
///
/// `UnexpectedEof` is what rustls reports when the peer drops TCP without a
/// TLS close_notify; `NotConnected` is what a locally closed transport
/// reports.
#[must_use]
pub fn is_graceful_close(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::NotConnected
    )
}

/// Whether a delimited read gave up because it outgrew its `max_len`.
#[must_use]
pub fn is_read_limit_exceeded(err: &io::Error) -> bool {
    err.get_ref()
        .is_some_and(|inner| inner.is::<ReadLimitExceeded>())
}
