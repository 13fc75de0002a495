//! Scheme probe
//!
//! Decides whether a master speaks TLS by attempting a handshake that trusts
//! everything. Any failure (refused connection, plain-text peer, protocol
//! error) reads as "not TLS".

use std::net::TcpStream;
use log::debug;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};

use crate::common::{FactoryError, Result};

/// Detects whether `host:port` accepts TLS connections
#[cfg_attr(test, mockall::automock)]
pub trait SchemeProbe: Send + Sync {
    fn is_tls(&self, host: &str, port: u16) -> bool;
}

/// Probe performing a real, blocking TLS handshake
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsProbe;

impl TlsProbe {
    fn handshake(host: &str, port: u16) -> Result<()> {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let stream = TcpStream::connect((host, port))?;

        let mut builder = SslConnector::builder(SslMethod::tls_client())?;
        builder.set_verify(SslVerifyMode::NONE);
        let connector = builder.build();

        connector
            .configure()?
            .verify_hostname(false)
            .use_server_name_indication(false)
            .connect(host, stream)
            .map_err(|e| FactoryError::Transport(e.to_string()))?;

        Ok(())
    }
}

impl SchemeProbe for TlsProbe {
    fn is_tls(&self, host: &str, port: u16) -> bool {
        match Self::handshake(host, port) {
            Ok(()) => {
                debug!("{}:{} completed a TLS handshake", host, port);
                true
            }
            Err(e) => {
                debug!("{}:{} is not serving TLS: {}", host, port, e);
                false
            }
        }
    }
}
