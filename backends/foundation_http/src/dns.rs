use crate::errors::DnsError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

/// Trait for DNS resolution.
///
/// Allows pluggable DNS resolvers for testing and customization.
#[async_trait]
pub trait DnsResolver: Send + Sync + Clone + 'static {
    /// Resolves a hostname and port to socket addresses.
    ///
    /// The order of the returned addresses is the order in which the
    /// connection state machine tries them.
    ///
    /// # Errors
    ///
    /// Returns `DnsError` if resolution fails.
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, DnsError>;
}

/// Resolver that ignores the host and returns a fixed list of endpoints.
///
/// Useful for testing scenarios where specific addresses are required.
#[derive(Debug, Clone)]
pub struct StaticSocketAddr(Vec<SocketAddr>);

impl Default for StaticSocketAddr {
    /// Returns the localhost address as default.
    fn default() -> Self {
        Self(vec![SocketAddr::from(([127, 0, 0, 1], 80))])
    }
}

impl StaticSocketAddr {
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self(vec![addr])
    }

    /// Endpoints are handed out in the given order.
    #[must_use]
    pub fn from_addrs(addrs: Vec<SocketAddr>) -> Self {
        Self(addrs)
    }
}

#[async_trait]
impl DnsResolver for StaticSocketAddr {
    async fn resolve(&self, _host: &str, _port: u16) -> Result<Vec<SocketAddr>, DnsError> {
        Ok(self.0.clone())
    }
}

/// System DNS resolver using `tokio::net::lookup_host`.
///
/// This is the default resolver that uses the system's DNS resolver.
#[derive(Debug, Clone, Default)]
pub struct SystemDnsResolver;

impl SystemDnsResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DnsResolver for SystemDnsResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, DnsError> {
        if host.is_empty() {
            return Err(DnsError::InvalidHost(host.to_string()));
        }

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|err| DnsError::ResolutionFailed(format!("{host}: {err}")))?
            .collect();

        if addrs.is_empty() {
            return Err(DnsError::NoAddressesFound(host.to_string()));
        }

        Ok(addrs)
    }
}

/// Mock DNS resolver for testing.
///
/// Allows configuring responses for specific hostnames.
#[derive(Debug, Clone)]
pub struct MockDnsResolver {
    responses: Arc<Mutex<HashMap<String, Result<Vec<SocketAddr>, DnsError>>>>,
}

impl MockDnsResolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Configures a successful response for a hostname.
    #[must_use]
    pub fn with_response(self, host: &str, addrs: Vec<SocketAddr>) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(host.to_string(), Ok(addrs));
        }
        self
    }

    /// Configures an error response for a hostname.
    #[must_use]
    pub fn with_error(self, host: &str, error: DnsError) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(host.to_string(), Err(error));
        }
        self
    }
}

impl Default for MockDnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsResolver for MockDnsResolver {
    async fn resolve(&self, host: &str, _port: u16) -> Result<Vec<SocketAddr>, DnsError> {
        let responses = self
            .responses
            .lock()
            .map_err(|_| DnsError::ResolutionFailed("lock poisoned".to_string()))?;

        responses
            .get(host)
            .cloned()
            .unwrap_or_else(|| Err(DnsError::NoAddressesFound(host.to_string())))
    }
}
