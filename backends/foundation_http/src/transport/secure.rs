use super::{not_connected, ReadBuffer, Transport};
use crate::errors::HttpClientError;
use async_trait::async_trait;
use bytes::Bytes;
use rustls::pki_types::ServerName;
use std::io;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

enum SecureStream {
    Closed,
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// TLS transport used for `https://` URLs.
///
/// `connect` only opens TCP; the TLS session is negotiated by `handshake`,
/// which verifies the peer certificate against the connector's trust store
/// and the host name given at construction.
pub struct SecureTransport {
    connector: TlsConnector,
    server_name: ServerName<'static>,
    stream: SecureStream,
    buffer: ReadBuffer,
}

impl SecureTransport {
    /// Creates a transport that will verify the peer as `host`.
    ///
    /// # Errors
    ///
    /// Returns `HttpClientError::TlsConfig` if `host` is neither a valid DNS
    /// name nor an IP address.
    pub fn new(host: &str, connector: TlsConnector) -> Result<Self, HttpClientError> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|err| HttpClientError::TlsConfig(format!("{host}: {err}")))?;

        Ok(Self {
            connector,
            server_name,
            stream: SecureStream::Closed,
            buffer: ReadBuffer::new(),
        })
    }

    fn tls(&mut self) -> io::Result<&mut TlsStream<TcpStream>> {
        match &mut self.stream {
            SecureStream::Tls(stream) => Ok(stream.as_mut()),
            SecureStream::Closed | SecureStream::Tcp(_) => Err(not_connected()),
        }
    }
}

impl std::fmt::Debug for SecureTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.stream {
            SecureStream::Closed => "closed",
            SecureStream::Tcp(_) => "tcp",
            SecureStream::Tls(_) => "tls",
        };
        f.debug_struct("SecureTransport")
            .field("server_name", &self.server_name)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for SecureTransport {
    async fn connect(&mut self, endpoint: SocketAddr) -> io::Result<()> {
        self.shutdown_and_close();
        let stream = TcpStream::connect(endpoint).await?;
        stream.set_nodelay(true)?;
        self.stream = SecureStream::Tcp(stream);
        Ok(())
    }

    async fn handshake(&mut self) -> io::Result<()> {
        let SecureStream::Tcp(tcp) = std::mem::replace(&mut self.stream, SecureStream::Closed)
        else {
            return Err(not_connected());
        };

        tracing::debug!(server_name = ?self.server_name, "starting TLS handshake");
        let tls = self
            .connector
            .connect(self.server_name.clone(), tcp)
            .await?;
        self.stream = SecureStream::Tls(Box::new(tls));
        Ok(())
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<usize> {
        let stream = self.tls()?;
        stream.write_all(buf).await?;
        stream.flush().await?;
        Ok(buf.len())
    }

    async fn read_until(
        &mut self,
        delimiter: &[u8],
        max_len: Option<usize>,
    ) -> io::Result<Bytes> {
        let SecureStream::Tls(stream) = &mut self.stream else {
            return Err(not_connected());
        };
        self.buffer.read_until(stream.as_mut(), delimiter, max_len).await
    }

    async fn read_some(&mut self) -> io::Result<Option<Bytes>> {
        let SecureStream::Tls(stream) = &mut self.stream else {
            return Err(not_connected());
        };
        self.buffer.read_some(stream.as_mut()).await
    }

    fn take_buffered(&mut self) -> Bytes {
        self.buffer.take()
    }

    fn shutdown_and_close(&mut self) {
        if !matches!(self.stream, SecureStream::Closed) {
            tracing::debug!(server_name = ?self.server_name, "closed secure transport");
        }
        self.stream = SecureStream::Closed;
        self.buffer.clear();
    }
}
