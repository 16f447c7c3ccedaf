//! URL parsing for the client facade.
//!
//! Only the `scheme://host[:port][/path]` shape is understood. Anything else
//! is rejected before a request is started.

use crate::errors::HttpClientError;
use std::fmt;

/// URL scheme.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
    /// Parsed but not supported by the client.
    Other(String),
}

impl Scheme {
    fn from_str(scheme: &str) -> Self {
        if scheme.eq_ignore_ascii_case("http") {
            Self::Http
        } else if scheme.eq_ignore_ascii_case("https") {
            Self::Https
        } else {
            Self::Other(scheme.to_string())
        }
    }

    /// Returns the well-known port of this scheme.
    ///
    /// Unsupported schemes report 80; the facade rejects them anyway.
    #[must_use]
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Https => 443,
            Self::Http | Self::Other(_) => 80,
        }
    }

    #[must_use]
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http)
    }

    #[must_use]
    pub fn is_https(&self) -> bool {
        matches!(self, Self::Https)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Other(scheme) => scheme,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL split into the parts a request needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedUrl {
    scheme: Scheme,
    host: String,
    port: u16,
    explicit_port: bool,
    path: String,
}

impl ParsedUrl {
    /// Parses `scheme://host[:port][/path]`.
    ///
    /// An absent path becomes `/`. A query string without a path
    /// (`http://host?q=1`) becomes `/?q=1`. IPv6 literals must be bracketed.
    ///
    /// # Errors
    ///
    /// Returns `HttpClientError::InvalidUrl` if `://` is missing or the host
    /// is empty, and `HttpClientError::InvalidPort` if an explicit port is
    /// not a valid `u16`.
    pub fn parse(url: &str) -> Result<Self, HttpClientError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| HttpClientError::InvalidUrl(url.to_string()))?;

        if scheme.is_empty() {
            return Err(HttpClientError::InvalidUrl(url.to_string()));
        }
        let scheme = Scheme::from_str(scheme);

        let (authority, path) = match rest.find(['/', '?']) {
            Some(index) if rest.as_bytes()[index] == b'?' => {
                (&rest[..index], format!("/{}", &rest[index..]))
            }
            Some(index) => (&rest[..index], rest[index..].to_string()),
            None => (rest, "/".to_string()),
        };

        let (host, port) = split_authority(authority)?;
        if host.is_empty() {
            return Err(HttpClientError::InvalidUrl(url.to_string()));
        }

        let explicit_port = port.is_some();
        let port = port.unwrap_or_else(|| scheme.default_port());

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            explicit_port,
            path,
        })
    }

    #[must_use]
    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Host name or address, without IPv6 brackets.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, or the scheme default.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path including the leading slash and any query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value for the `Host` request header.
    ///
    /// The port is only included when it differs from the scheme default.
    #[must_use]
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        if self.explicit_port && self.port != self.scheme.default_port() {
            format!("{host}:{}", self.port)
        } else {
            host
        }
    }
}

fn split_authority(authority: &str) -> Result<(&str, Option<u16>), HttpClientError> {
    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| HttpClientError::InvalidUrl(authority.to_string()))?;
        match after {
            "" => (host, None),
            _ => match after.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return Err(HttpClientError::InvalidUrl(authority.to_string())),
            },
        }
    } else {
        match authority.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    let port = port
        .map(|port| {
            port.parse::<u16>()
                .map_err(|_| HttpClientError::InvalidPort(port.to_string()))
        })
        .transpose()?;

    Ok((host, port))
}
