//! Trust store setup for the secure transport.
//!
//! The root store starts from the bundled webpki roots and is extended with
//! the certificates found in the configured trust file and trust directory.

use crate::config::ClientConfig;
use crate::errors::HttpClientError;
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// Builds the TLS connector for a request.
///
/// # Errors
///
/// Returns `HttpClientError::TlsConfig` if the trust file cannot be read or
/// holds no certificate, or if the trust directory cannot be listed.
pub fn build_connector(config: &ClientConfig) -> Result<TlsConnector, HttpClientError> {
    let roots = root_store(config.verify_file.as_deref(), config.verify_path.as_deref())?;

    let client_config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(client_config)))
}

fn root_store(
    verify_file: Option<&Path>,
    verify_path: Option<&Path>,
) -> Result<RootCertStore, HttpClientError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(file) = verify_file {
        let certs = read_pem_certs(file)?;
        if certs.is_empty() {
            return Err(HttpClientError::TlsConfig(format!(
                "no certificates found in {}",
                file.display()
            )));
        }

        let (added, ignored) = roots.add_parsable_certificates(certs);
        tracing::debug!(file = %file.display(), added, ignored, "loaded trust file");
    }

    if let Some(dir) = verify_path {
        let entries = std::fs::read_dir(dir)
            .map_err(|err| HttpClientError::TlsConfig(format!("{}: {err}", dir.display())))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            match read_pem_certs(&path) {
                Ok(certs) => {
                    let (added, ignored) = roots.add_parsable_certificates(certs);
                    tracing::debug!(file = %path.display(), added, ignored, "loaded trust directory entry");
                }
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "skipping unreadable trust entry");
                }
            }
        }
    }

    Ok(roots)
}

fn read_pem_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, HttpClientError> {
    let file = File::open(path)
        .map_err(|err| HttpClientError::TlsConfig(format!("{}: {err}", path.display())))?;

    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| HttpClientError::TlsConfig(format!("{}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../foundation_testing/fixtures")
            .join(name)
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "foundation_http_tls_{name}_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// WHY: Without extra trust the bundled roots must still be present
    /// WHAT: Tests that the default store is not empty
    #[test]
    fn test_default_store_has_webpki_roots() {
        let roots = root_store(None, None).unwrap();
        assert_eq!(roots.len(), webpki_roots::TLS_SERVER_ROOTS.len());
    }

    /// WHY: A configured trust file adds its certificates to the store
    /// WHAT: Loads the test CA on top of the defaults
    #[test]
    fn test_verify_file_adds_certificates() {
        let roots = root_store(Some(&fixture("ca.pem")), None).unwrap();
        assert_eq!(roots.len(), webpki_roots::TLS_SERVER_ROOTS.len() + 1);
    }

    /// WHY: A missing trust file is a configuration mistake, not a runtime failure
    /// WHAT: Tests the synchronous TlsConfig error
    #[test]
    fn test_missing_verify_file_is_rejected() {
        let err = build_connector(&ClientConfig {
            verify_file: Some(PathBuf::from("/nonexistent/ca.pem")),
            ..ClientConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, HttpClientError::TlsConfig(_)));
    }

    /// WHY: A trust file with no certificate in it is almost certainly wrong
    /// WHAT: A text file without PEM blocks is rejected
    #[test]
    fn test_verify_file_without_certificates_is_rejected() {
        let dir = scratch_dir("empty_file");
        let file = dir.join("not-a-cert.pem");
        std::fs::write(&file, "hello").unwrap();

        let err = root_store(Some(&file), None).unwrap_err();
        assert!(err.to_string().contains("no certificates"));
    }

    /// WHY: Trust directories behave like a CA path: every PEM file counts
    /// WHAT: A directory holding the test CA and a stray file adds one root
    #[test]
    fn test_verify_path_loads_directory() {
        let dir = scratch_dir("dir");
        std::fs::copy(fixture("ca.pem"), dir.join("ca.pem")).unwrap();
        std::fs::write(dir.join("README"), "not a certificate").unwrap();

        let roots = root_store(None, Some(&dir)).unwrap();
        assert_eq!(roots.len(), webpki_roots::TLS_SERVER_ROOTS.len() + 1);

        let err = root_store(None, Some(&dir.join("missing"))).unwrap_err();
        assert!(matches!(err, HttpClientError::TlsConfig(_)));
    }
}
