use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default watchdog timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 10;

/// Default response size ceiling, in bytes.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 64 * 1024;

/// Configuration for the HTTP client.
///
/// WHY: Keeps every knob a request reads in one place so it can be loaded
/// from a file or shared across clients.
///
/// WHAT: Watchdog timeout, response size ceiling and the TLS trust locations.
///
/// HOW: Created via `Default`, `from_toml_str`, or the client's setters.
/// Missing TOML keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Watchdog timeout per operation. Zero or negative disables the watchdog.
    pub timeout_seconds: i64,
    /// Maximum response size in bytes (0 = unlimited).
    pub max_response_size: usize,
    /// PEM file with extra trusted certificates.
    pub verify_file: Option<PathBuf>,
    /// Directory whose PEM files are added to the trusted certificates.
    pub verify_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            verify_file: None,
            verify_path: None,
        }
    }
}

impl ClientConfig {
    /// Parses a configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the document is malformed or a key has the
    /// wrong type.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// The watchdog duration, or `None` when no timer should be armed.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        u64::try_from(self.timeout_seconds)
            .ok()
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs)
    }
}
