//! TCP listener binding.

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid bind address {address}: {source}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },

    #[error("failed to bind: {0}")]
    Bind(#[from] std::io::Error),
}

/// Parse the configured bind address.
pub fn bind_address(config: &ListenerConfig) -> Result<SocketAddr, ListenerError> {
    config
        .bind_address
        .parse()
        .map_err(|source| ListenerError::Address {
            address: config.bind_address.clone(),
            source,
        })
}

/// Bind to the configured address.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let listener = TcpListener::bind(bind_address(config)?).await?;

    tracing::info!(
        address = %listener.local_addr()?,
        max_connections = config.max_connections,
        "Listener bound"
    );
    Ok(listener)
}
