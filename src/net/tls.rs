//! TLS configuration and certificate loading.

use axum_server::tls_rustls::RustlsConfig;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::TlsConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("invalid TLS material: {0}")]
    Invalid(std::io::Error),
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    let cert_pem = read(cert_path).await?;
    let key_pem = read(key_path).await?;

    // Check the PEM contents up front so misconfiguration names the bad file.
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_pem.as_slice()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsError::Invalid)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(cert_path.to_path_buf()));
    }
    if rustls_pemfile::private_key(&mut BufReader::new(key_pem.as_slice()))
        .map_err(TlsError::Invalid)?
        .is_none()
    {
        return Err(TlsError::NoPrivateKey(key_path.to_path_buf()));
    }

    tracing::info!(cert = %cert_path.display(), certificates = certs.len(), "TLS material loaded");
    RustlsConfig::from_pem(cert_pem, key_pem)
        .await
        .map_err(TlsError::Invalid)
}

async fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    tokio::fs::read(path).await.map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}
