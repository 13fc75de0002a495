//! Error handling module
//!
//! This module defines the error types and result type aliases used by the factory.

use std::io;
use thiserror::Error;

/// Client factory error type
#[derive(Error, Debug)]
pub enum FactoryError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// OpenSSL error
    #[error("OpenSSL error: {0}")]
    Ssl(#[from] openssl::error::ErrorStack),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Websocket handshake or transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The master address is missing or malformed
    #[error("Invalid master address: {0}")]
    Address(String),

    /// TLS trust or identity material cannot be assembled
    #[error("Transport configuration error: {0}")]
    Transport(String),

    /// The cluster-config file cannot be read or parsed
    #[error("Cluster config error: {0}")]
    ClusterConfig(String),

    /// Response body is not something the JSON helpers can decode
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// The API server answered with a non-success status
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },
}

impl FactoryError {
    /// Whether this error aborted construction because of the address
    pub fn is_address_error(&self) -> bool {
        matches!(self, FactoryError::Address(_))
    }

    /// Whether this error comes from incomplete or unusable TLS material
    pub fn is_transport_error(&self) -> bool {
        matches!(self, FactoryError::Transport(_) | FactoryError::Ssl(_))
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `FactoryError`.
pub type Result<T> = std::result::Result<T, FactoryError>;
