//! TLS certificate loading.

use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("certificate file not found: {0}")]
    MissingCert(PathBuf),

    #[error("private key file not found: {0}")]
    MissingKey(PathBuf),

    #[error("failed to load TLS material: {0}")]
    Load(#[from] std::io::Error),
}

/// Load the PEM certificate chain and private key named in `config`.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    if !cert_path.exists() {
        return Err(TlsError::MissingCert(cert_path.to_path_buf()));
    }
    if !key_path.exists() {
        return Err(TlsError::MissingKey(key_path.to_path_buf()));
    }

    tracing::debug!(cert = %cert_path.display(), key = %key_path.display(), "Loading TLS material");
    Ok(RustlsConfig::from_pem_file(cert_path, key_path).await?)
}
