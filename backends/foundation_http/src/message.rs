//! Request and response message types.

use std::borrow::Cow;
use std::fmt;

/// HTTP method supported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Returns the method name as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Whether the message body (and a `Content-Length`) is sent.
    #[must_use]
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single header line. Names are kept exactly as given or received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl<N: Into<String>, V: Into<String>> From<(N, V)> for Header {
    fn from((name, value): (N, V)) -> Self {
        Self::new(name, value)
    }
}

/// Headers plus body.
///
/// Used for the caller's outgoing request and, wrapped in [`Response`], for
/// the assembled reply. Header order is preserved and duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    headers: Vec<Header>,
    body: Vec<u8>,
}

impl Message {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message carrying the given headers and no body.
    pub fn with_headers<I, H>(headers: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<Header>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            body: Vec::new(),
        }
    }

    /// Appends a header, builder style.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    /// Replaces the body, builder style.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push(Header::new(name, value));
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    pub(crate) fn append_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    #[must_use]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// First value of the named header, compared ASCII case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(Header::value)
    }

    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// The assembled reply of one request.
///
/// Owned by the connection state machine while the request is in flight
/// and moved to the caller on completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    status: u32,
    message: Message,
}

impl Response {
    #[must_use]
    pub fn status(&self) -> u32 {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &[Header] {
        self.message.headers()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.message.header(name)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.message.body()
    }

    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        self.message.body_text()
    }

    /// Consumes the response, returning its headers and body.
    #[must_use]
    pub fn into_message(self) -> Message {
        self.message
    }

    pub(crate) fn set_status(&mut self, status: u32) {
        self.status = status;
    }

    pub(crate) fn add_header(&mut self, name: String, value: String) {
        self.message.headers.push(Header { name, value });
    }

    pub(crate) fn append_body(&mut self, bytes: &[u8]) {
        self.message.append_body(bytes);
    }
}
