use derive_more::From;
use std::io;
use std::sync::Arc;

/// DNS resolution errors.
///
/// These errors occur during DNS hostname resolution.
#[derive(From, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    /// DNS resolution failed for the given hostname.
    #[from(ignore)]
    ResolutionFailed(String),

    /// Invalid hostname provided.
    #[from(ignore)]
    InvalidHost(String),

    /// No addresses found for the given hostname.
    #[from(ignore)]
    NoAddressesFound(String),

    /// I/O error during DNS resolution.
    #[from(ignore)]
    IoError(String),
}

impl From<io::Error> for DnsError {
    fn from(err: io::Error) -> Self {
        DnsError::IoError(err.to_string())
    }
}

impl std::error::Error for DnsError {}

impl core::fmt::Display for DnsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResolutionFailed(host) => {
                write!(f, "DNS resolution failed for host: {host}")
            }
            Self::InvalidHost(host) => {
                write!(f, "Invalid hostname: {host}")
            }
            Self::NoAddressesFound(host) => {
                write!(f, "No addresses found for host: {host}")
            }
            Self::IoError(err) => {
                write!(f, "I/O error during DNS resolution: {err}")
            }
        }
    }
}

/// Category of an [`HttpClientError`].
///
/// Subscribers usually only care about which stage failed, not the
/// underlying cause, so this is what tests and callers match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected synchronously before any asynchronous work started.
    Input,
    /// Host name lookup failed.
    Resolution,
    /// Every resolved endpoint refused or failed the connection.
    Connection,
    /// TLS negotiation or certificate verification failed.
    Handshake,
    /// Write or read failure that is not a graceful close.
    Io,
    /// The peer did not speak HTTP.
    Protocol,
    /// The response grew past the configured ceiling.
    SizeLimit,
    /// The watchdog expired before the pending operation finished.
    Timeout,
    /// The owner aborted the request.
    Aborted,
}

/// HTTP client errors.
///
/// Input variants are returned synchronously by the client facade. Every
/// other variant is only ever observed through the completion event.
#[derive(From, Debug, Clone)]
pub enum HttpClientError {
    /// URL without `://` or without a host.
    #[from(ignore)]
    InvalidUrl(String),

    /// Scheme other than `http` or `https`.
    #[from(ignore)]
    UnsupportedScheme(String),

    /// Explicit port that is not a number in `0..=65535`.
    #[from(ignore)]
    InvalidPort(String),

    /// No tokio runtime was configured or reachable from the caller.
    NoRuntime,

    /// The configured trust file or trust directory could not be loaded.
    #[from(ignore)]
    TlsConfig(String),

    /// DNS resolution error.
    #[from]
    Dns(DnsError),

    /// Last connect error once all endpoints were exhausted.
    #[from(ignore)]
    Connect(Arc<io::Error>),

    /// TLS handshake failed.
    #[from(ignore)]
    Handshake(String),

    /// I/O error while writing the request or reading the response.
    #[from(ignore)]
    Io(Arc<io::Error>),

    /// Status line did not start with `HTTP/` or had no numeric status.
    #[from(ignore)]
    MalformedStatusLine(String),

    /// Response exceeded the configured size ceiling.
    #[from(ignore)]
    ResponseTooLarge { limit: usize },

    /// Watchdog expired.
    TimedOut,

    /// Request was aborted by its owner.
    Aborted,
}

impl HttpClientError {
    /// Wraps a connect failure.
    #[must_use]
    pub fn connect(err: io::Error) -> Self {
        Self::Connect(Arc::new(err))
    }

    /// Returns the category this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_)
            | Self::UnsupportedScheme(_)
            | Self::InvalidPort(_)
            | Self::NoRuntime
            | Self::TlsConfig(_) => ErrorKind::Input,
            Self::Dns(_) => ErrorKind::Resolution,
            Self::Connect(_) => ErrorKind::Connection,
            Self::Handshake(_) => ErrorKind::Handshake,
            Self::Io(_) => ErrorKind::Io,
            Self::MalformedStatusLine(_) => ErrorKind::Protocol,
            Self::ResponseTooLarge { .. } => ErrorKind::SizeLimit,
            Self::TimedOut => ErrorKind::Timeout,
            Self::Aborted => ErrorKind::Aborted,
        }
    }
}

impl From<io::Error> for HttpClientError {
    fn from(err: io::Error) -> Self {
        HttpClientError::Io(Arc::new(err))
    }
}

impl std::error::Error for HttpClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dns(err) => Some(err),
            Self::Connect(err) | Self::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl core::fmt::Display for HttpClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl(url) => write!(f, "Invalid URL: {url}"),
            Self::UnsupportedScheme(scheme) => write!(
                f,
                "Invalid URL scheme: {scheme} (only HTTP and HTTPS are supported)"
            ),
            Self::InvalidPort(port) => write!(f, "Invalid port: {port}"),
            Self::NoRuntime => write!(f, "No tokio runtime available for async I/O"),
            Self::TlsConfig(msg) => write!(f, "TLS trust store error: {msg}"),
            Self::Dns(err) => write!(f, "DNS error: {err}"),
            Self::Connect(err) => write!(f, "Connection failed: {err}"),
            Self::Handshake(msg) => write!(f, "TLS handshake failed: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::MalformedStatusLine(line) => write!(f, "Malformed status line: {line:?}"),
            Self::ResponseTooLarge { limit } => {
                write!(f, "Response exceeded maximum size of {limit} bytes")
            }
            Self::TimedOut => write!(f, "Operation timed out"),
            Self::Aborted => write!(f, "Request aborted"),
        }
    }
}
