use super::{not_connected, ReadBuffer, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

#[derive(Debug, Clone)]
enum Incoming {
    Data(Bytes),
    Stall,
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
struct ScriptedPeer {
    incoming: VecDeque<Incoming>,
}

impl AsyncRead for ScriptedPeer {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.incoming.pop_front() {
            None => Poll::Ready(Ok(())),
            Some(Incoming::Stall) => {
                self.incoming.push_front(Incoming::Stall);
                Poll::Pending
            }
            Some(Incoming::Fail(kind)) => Poll::Ready(Err(io::Error::from(kind))),
            Some(Incoming::Data(mut data)) => {
                let take = data.len().min(buf.remaining());
                buf.put_slice(&data.split_to(take));
                if !data.is_empty() {
                    self.incoming.push_front(Incoming::Data(data));
                }
                Poll::Ready(Ok(()))
            }
        }
    }
}

/// What a [`MockTransport`] observed, shared with the test that built it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MockLog {
    /// Every endpoint `connect` was called with, in order.
    pub connects: Vec<SocketAddr>,
    pub handshakes: usize,
    /// Every buffer passed to `write_all`.
    pub writes: Vec<Bytes>,
    /// Number of `read_until` and `read_some` calls issued.
    pub reads: usize,
    pub shutdowns: usize,
}

/// Scripted transport for exercising the state machine without sockets.
///
/// Connects fail for endpoints marked with `refuse`, the handshake can be
/// made to fail, writes can stall forever, and reads replay the queued
/// chunks one at a time before reporting end of stream.
#[derive(Debug, Default)]
pub struct MockTransport {
    refused: HashSet<SocketAddr>,
    handshake_error: Option<String>,
    stall_write: bool,
    peer: ScriptedPeer,
    buffer: ReadBuffer,
    connected: bool,
    log: Arc<Mutex<MockLog>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `connect` to this endpoint fail with `ConnectionRefused`.
    #[must_use]
    pub fn refuse(mut self, endpoint: SocketAddr) -> Self {
        self.refused.insert(endpoint);
        self
    }

    #[must_use]
    pub fn with_handshake_error(mut self, reason: &str) -> Self {
        self.handshake_error = Some(reason.to_string());
        self
    }

    /// Makes `write_all` never complete.
    #[must_use]
    pub fn stall_write(mut self) -> Self {
        self.stall_write = true;
        self
    }

    /// Queues one chunk the peer will deliver in a single read.
    #[must_use]
    pub fn respond(mut self, chunk: impl Into<Bytes>) -> Self {
        self.peer.incoming.push_back(Incoming::Data(chunk.into()));
        self
    }

    /// After the queued chunks, reads never complete.
    #[must_use]
    pub fn stall_reads(mut self) -> Self {
        self.peer.incoming.push_back(Incoming::Stall);
        self
    }

    /// After the queued chunks, the next read fails with `kind`.
    #[must_use]
    pub fn fail_read(mut self, kind: io::ErrorKind) -> Self {
        self.peer.incoming.push_back(Incoming::Fail(kind));
        self
    }

    /// Handle to the call log; stays valid after the transport is moved.
    #[must_use]
    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        Arc::clone(&self.log)
    }

    fn record(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, endpoint: SocketAddr) -> io::Result<()> {
        self.record().connects.push(endpoint);
        if self.refused.contains(&endpoint) {
            self.connected = false;
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{endpoint} refused"),
            ));
        }
        self.connected = true;
        Ok(())
    }

    async fn handshake(&mut self) -> io::Result<()> {
        self.record().handshakes += 1;
        match &self.handshake_error {
            Some(reason) => Err(io::Error::new(io::ErrorKind::InvalidData, reason.clone())),
            None => Ok(()),
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.connected {
            return Err(not_connected());
        }
        if self.stall_write {
            std::future::pending::<()>().await;
        }
        self.record().writes.push(Bytes::copy_from_slice(buf));
        Ok(buf.len())
    }

    async fn read_until(
        &mut self,
        delimiter: &[u8],
        max_len: Option<usize>,
    ) -> io::Result<Bytes> {
        self.record().reads += 1;
        if !self.connected {
            return Err(not_connected());
        }
        self.buffer.read_until(&mut self.peer, delimiter, max_len).await
    }

    async fn read_some(&mut self) -> io::Result<Option<Bytes>> {
        self.record().reads += 1;
        if !self.connected {
            return Err(not_connected());
        }
        self.buffer.read_some(&mut self.peer).await
    }

    fn take_buffered(&mut self) -> Bytes {
        self.buffer.take()
    }

    fn shutdown_and_close(&mut self) {
        self.record().shutdowns += 1;
        self.connected = false;
        self.buffer.clear();
    }
}
