//! TLS configuration and certificate loading.
//!
//! # Responsibilities
//! - Load the listener certificate for inbound TLS termination
//! - Build the client config used for `https:` upstream targets
//!
//! # Design Decisions
//! - Upstream trust is explicit: only configured CA files, no implicit defaults
//! - Certificate verification is never switched off

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::crypto::aws_lc_rs;
use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};

use crate::config::ConfigError;

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    // Basic validation
    for path in [cert_path, key_path] {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("TLS file not found: {:?}", path),
            ));
        }
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

/// Read every certificate in a PEM file.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(ConfigError::Tls(format!("no certificates in {:?}", path)));
    }
    Ok(certs)
}

/// Build a root store from CA PEM files.
pub fn load_root_store<P: AsRef<Path>>(ca_files: &[P]) -> Result<RootCertStore, ConfigError> {
    let mut roots = RootCertStore::empty();
    for path in ca_files {
        for cert in load_certs(path.as_ref())? {
            roots
                .add(cert)
                .map_err(|e| ConfigError::Tls(format!("{:?}: {}", path.as_ref(), e)))?;
        }
    }
    Ok(roots)
}

/// Client config for `https:` upstreams, trusting exactly `roots`.
pub fn upstream_client_config(roots: RootCertStore) -> Result<Arc<ClientConfig>, ConfigError> {
    let config = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_ca_file() {
        let err = load_root_store(&["/definitely/not/here.pem"]).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_empty_store_builds() {
        let config = upstream_client_config(RootCertStore::empty()).unwrap();
        assert!(config.alpn_protocols.is_empty());
    }

    #[tokio::test]
    async fn test_listener_files_checked() {
        let err = load_tls_config(Path::new("/no/cert.pem"), Path::new("/no/key.pem"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
