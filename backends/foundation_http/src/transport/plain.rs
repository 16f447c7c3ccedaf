use super::{not_connected, ReadBuffer, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Plain TCP transport used for `http://` URLs.
#[derive(Debug, Default)]
pub struct PlainTransport {
    stream: Option<TcpStream>,
    buffer: ReadBuffer,
}

impl PlainTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(not_connected)
    }
}

#[async_trait]
impl Transport for PlainTransport {
    async fn connect(&mut self, endpoint: SocketAddr) -> io::Result<()> {
        self.shutdown_and_close();
        let stream = TcpStream::connect(endpoint).await?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn handshake(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<usize> {
        let stream = self.stream()?;
        stream.write_all(buf).await?;
        stream.flush().await?;
        Ok(buf.len())
    }

    async fn read_until(
        &mut self,
        delimiter: &[u8],
        max_len: Option<usize>,
    ) -> io::Result<Bytes> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        self.buffer.read_until(stream, delimiter, max_len).await
    }

    async fn read_some(&mut self) -> io::Result<Option<Bytes>> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        self.buffer.read_some(stream).await
    }

    fn take_buffered(&mut self) -> Bytes {
        self.buffer.take()
    }

    fn shutdown_and_close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("closed plain transport");
        }
        self.buffer.clear();
    }
}
