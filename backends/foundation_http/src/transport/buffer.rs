use bytes::{Bytes, BytesMut};
use memchr::memmem;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 8 * 1024;

/// Carried inside the `io::Error` returned when a delimited read outgrows
/// its allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimitExceeded {
    pub max_len: usize,
}

impl fmt::Display for ReadLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no delimiter within {} bytes", self.max_len)
    }
}

impl std::error::Error for ReadLimitExceeded {}

/// Receive buffer shared by every transport.
///
/// Bytes read past a delimiter stay here and are served to the next read,
/// so nothing the peer sent is ever dropped between stages.
#[derive(Debug, Default)]
pub struct ReadBuffer {
    pending: BytesMut,
}

impl ReadBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes received but not yet handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Takes everything currently buffered.
    pub fn take(&mut self) -> Bytes {
        self.pending.split().freeze()
    }

    fn split_through(&mut self, delimiter: &[u8]) -> Option<Bytes> {
        memmem::find(&self.pending, delimiter)
            .map(|at| self.pending.split_to(at + delimiter.len()).freeze())
    }

    /// Reads from `source` until `delimiter` is buffered, returning every
    /// byte up to and including it.
    ///
    /// With `max_len` set, gives up as soon as more than `max_len` bytes are
    /// pending without the delimiter, so a peer cannot grow the buffer
    /// past the caller's allowance.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the source ends before the delimiter shows up,
    /// `InvalidData` wrapping [`ReadLimitExceeded`] once `max_len` is
    /// passed, or whatever error the source reports.
    pub async fn read_until<S>(
        &mut self,
        source: &mut S,
        delimiter: &[u8],
        max_len: Option<usize>,
    ) -> io::Result<Bytes>
    where
        S: AsyncRead + Unpin + ?Sized,
    {
        loop {
            if let Some(found) = self.split_through(delimiter) {
                return Ok(found);
            }

            if let Some(max_len) = max_len.filter(|&max_len| self.pending.len() > max_len) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    ReadLimitExceeded { max_len },
                ));
            }

            self.pending.reserve(READ_CHUNK);
            if source.read_buf(&mut self.pending).await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended before delimiter",
                ));
            }
        }
    }

    /// Returns buffered bytes if any, otherwise reads at least one byte.
    ///
    /// `Ok(None)` means the source reached end of stream.
    ///
    /// # Errors
    ///
    /// Whatever error the source reports.
    pub async fn read_some<S>(&mut self, source: &mut S) -> io::Result<Option<Bytes>>
    where
        S: AsyncRead + Unpin + ?Sized,
    {
        if !self.pending.is_empty() {
            return Ok(Some(self.take()));
        }

        self.pending.reserve(READ_CHUNK);
        match source.read_buf(&mut self.pending).await? {
            0 => Ok(None),
            _ => Ok(Some(self.take())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// WHY: Over-read bytes must not be lost between reads
    /// WHAT: Two delimited reads and a trailing read_some over one source
    #[tokio::test]
    async fn test_read_until_keeps_overread() {
        let mut source: &[u8] = b"HTTP/1.0 200 OK\r\nA: 1\r\n\r\nbody";
        let mut buffer = ReadBuffer::new();

        let line = buffer.read_until(&mut source, b"\r\n", None).await.unwrap();
        assert_eq!(&line[..], b"HTTP/1.0 200 OK\r\n");

        let headers = buffer.read_until(&mut source, b"\r\n\r\n", None).await.unwrap();
        assert_eq!(&headers[..], b"A: 1\r\n\r\n");

        assert_eq!(buffer.len(), 4);
        let rest = buffer.read_some(&mut source).await.unwrap().unwrap();
        assert_eq!(&rest[..], b"body");
        assert!(buffer.read_some(&mut source).await.unwrap().is_none());
    }

    /// WHY: A delimiter split across reads must still be found
    /// WHAT: Chains two sources so CRLF straddles the boundary
    #[tokio::test]
    async fn test_read_until_across_chunks() {
        let mut source = AsyncReadExt::chain(&b"abc\r"[..], &b"\ndef"[..]);
        let mut buffer = ReadBuffer::new();

        let found = buffer.read_until(&mut source, b"\r\n", None).await.unwrap();
        assert_eq!(&found[..], b"abc\r\n");
    }

    /// WHY: Stream end before the delimiter is an error, not a short line
    /// WHAT: Tests UnexpectedEof
    #[tokio::test]
    async fn test_read_until_eof() {
        let mut source: &[u8] = b"partial";
        let mut buffer = ReadBuffer::new();

        let err = buffer.read_until(&mut source, b"\r\n", None).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    /// WHY: An endless line must not grow the buffer without bound
    /// WHAT: 64 KiB without CRLF against a 100 byte allowance stops early
    #[tokio::test]
    async fn test_read_until_stops_past_max_len() {
        let data = vec![b'a'; 64 * 1024];
        let mut source: &[u8] = &data;
        let mut buffer = ReadBuffer::new();

        let err = buffer
            .read_until(&mut source, b"\r\n", Some(100))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(
            err.get_ref().and_then(|inner| inner.downcast_ref::<ReadLimitExceeded>()),
            Some(&ReadLimitExceeded { max_len: 100 })
        );
        assert!(!source.is_empty());
        assert!(buffer.len() < data.len());
    }

    /// WHY: A line that fits the allowance is read as usual
    /// WHAT: Delimiter found within max_len returns the line
    #[tokio::test]
    async fn test_read_until_within_max_len() {
        let mut source: &[u8] = b"HTTP/1.0 200 OK\r\nrest";
        let mut buffer = ReadBuffer::new();

        let line = buffer
            .read_until(&mut source, b"\r\n", Some(17))
            .await
            .unwrap();
        assert_eq!(&line[..], b"HTTP/1.0 200 OK\r\n");
    }
}
