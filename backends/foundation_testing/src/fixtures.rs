//! Paths to the TLS fixtures shipped with this crate.
//!
//! `ca.pem` is a self-signed test CA. `localhost.pem` is signed by it and is
//! valid for `DNS:localhost` and `IP:127.0.0.1`; `localhost.key` is its PKCS#8
//! private key.

use std::path::PathBuf;

/// Directory holding the fixture files.
#[must_use]
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// The test CA certificate, for use as a client trust file.
#[must_use]
pub fn ca_cert_path() -> PathBuf {
    fixtures_dir().join("ca.pem")
}

#[must_use]
pub fn server_cert_path() -> PathBuf {
    fixtures_dir().join("localhost.pem")
}

#[must_use]
pub fn server_key_path() -> PathBuf {
    fixtures_dir().join("localhost.key")
}
