//! Websocket client for streaming endpoints
//!
//! Shares trust and client identity with the HTTP client but carries no
//! bearer header: only the transport is secured.

use std::pin::Pin;
use log::debug;
use openssl::ssl::{Ssl, SslConnector, SslVersion};
use reqwest::Url;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_openssl::SslStream;
use tokio_tungstenite::WebSocketStream;

use crate::common::{FactoryError, Result};
use crate::config::defaults;
use crate::tls::TransportSecurity;

/// Byte stream underneath a websocket, plain or TLS
pub trait StreamIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> StreamIo for T {}

/// Connected websocket
pub type WebSocket = WebSocketStream<Box<dyn StreamIo>>;

/// Websocket client restricted to TLS 1.2 and 1.3
#[derive(Clone)]
pub struct StreamClient {
    connector: SslConnector,
    base_url: Option<Url>,
    verify_hostname: bool,
}

impl StreamClient {
    pub fn new(security: &TransportSecurity, base_url: Option<&str>) -> Result<Self> {
        let connector = security.ssl_connector(defaults::STREAM_TLS_MIN, defaults::STREAM_TLS_MAX)?;
        let base_url = base_url
            .map(|url| Url::parse(url).map_err(|e| FactoryError::Address(format!("{}: {}", url, e))))
            .transpose()?;

        Ok(Self {
            connector,
            base_url,
            verify_hostname: security.verifies_hostname(),
        })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Lowest and highest negotiable protocol versions
    pub fn protocol_range(&self) -> (SslVersion, SslVersion) {
        (defaults::STREAM_TLS_MIN, defaults::STREAM_TLS_MAX)
    }

    pub fn verifies_hostname(&self) -> bool {
        self.verify_hostname
    }

    /// `ws://` / `wss://` URL for a target
    ///
    /// Absolute targets may use any of `ws`, `wss`, `http` or `https`;
    /// relative ones are joined to the base URL.
    pub fn websocket_url(&self, target: &str) -> Result<Url> {
        let mut url = if target.contains("://") {
            Url::parse(target).map_err(|e| FactoryError::Address(format!("{}: {}", target, e)))?
        } else {
            let base = self.base_url.as_ref().ok_or_else(|| {
                FactoryError::Address(format!("No master address to resolve {} against", target))
            })?;
            let joined = format!(
                "{}/{}",
                base.as_str().trim_end_matches('/'),
                target.trim_start_matches('/')
            );
            Url::parse(&joined).map_err(|e| FactoryError::Address(format!("{}: {}", joined, e)))?
        };

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(FactoryError::Address(format!(
                    "{}: unsupported websocket scheme '{}'",
                    target, other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| FactoryError::Address(format!("{}: cannot use scheme {}", target, scheme)))?;

        Ok(url)
    }

    /// Open a websocket to `target`
    pub async fn connect(&self, target: &str) -> Result<WebSocket> {
        let url = self.websocket_url(target)?;
        let host = url
            .host_str()
            .ok_or_else(|| FactoryError::Address(format!("{}: missing host", url)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| FactoryError::Address(format!("{}: missing port", url)))?;

        let tcp = TcpStream::connect((host.as_str(), port)).await?;

        let io: Box<dyn StreamIo> = if url.scheme() == "wss" {
            Box::new(self.tls_handshake(&host, tcp).await?)
        } else {
            Box::new(tcp)
        };

        let (socket, response) = tokio_tungstenite::client_async(url.as_str(), io).await?;
        debug!("Websocket to {} established ({})", url, response.status());

        Ok(socket)
    }

    async fn tls_handshake(&self, host: &str, tcp: TcpStream) -> Result<Pin<Box<SslStream<TcpStream>>>> {
        let ssl: Ssl = self
            .connector
            .configure()?
            .verify_hostname(self.verify_hostname)
            .into_ssl(host)?;

        let mut stream = Pin::new(Box::new(SslStream::new(ssl, tcp)?));
        stream
            .as_mut()
            .connect()
            .await
            .map_err(|e| FactoryError::Transport(format!("TLS handshake with {} failed: {}", host, e)))?;

        debug!("TLS handshake with {} successful", host);
        Ok(stream)
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("verify_hostname", &self.verify_hostname)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::ssl::{SslAcceptor, SslMethod};
    use tokio::net::TcpListener;
    use crate::config::profile::ConnectionProfile;
    use crate::tls::testing::TestPki;

    fn client(profile: &ConnectionProfile, base_url: Option<&str>) -> StreamClient {
        StreamClient::new(&TransportSecurity::from_profile(profile).unwrap(), base_url).unwrap()
    }

    #[test]
    fn test_websocket_url_mapping() {
        let client = client(&ConnectionProfile::default(), Some("https://master:6443/prefix"));

        assert_eq!(
            client.websocket_url("/api/v1/watch/pods").unwrap().as_str(),
            "wss://master:6443/prefix/api/v1/watch/pods"
        );
        assert_eq!(client.websocket_url("http://other:8080/x").unwrap().as_str(), "ws://other:8080/x");
        assert_eq!(client.websocket_url("wss://other/x").unwrap().as_str(), "wss://other/x");
        assert!(client.websocket_url("ftp://other/x").unwrap_err().is_address_error());
    }

    #[test]
    fn test_relative_target_needs_base() {
        let client = client(&ConnectionProfile::default(), None);
        assert!(client.websocket_url("api").unwrap_err().is_address_error());
    }

    #[test]
    fn test_protocol_range() {
        let client = client(&ConnectionProfile::default(), None);
        assert!(client.protocol_range() == (SslVersion::TLS1_2, SslVersion::TLS1_3));
        assert!(client.verifies_hostname());
    }

    #[tokio::test]
    async fn test_connect_plain() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            tokio_tungstenite::accept_async(tcp).await.unwrap();
        });

        let client = client(&ConnectionProfile::default(), Some(&format!("http://127.0.0.1:{}", port)));
        client.connect("/watch").await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_tls_with_custom_ca() {
        let pki = TestPki::new();
        let (cert, key) = pki.issue("localhost");
        let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
        acceptor.set_certificate(&cert).unwrap();
        acceptor.set_private_key(&key).unwrap();
        let acceptor = acceptor.build();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ssl = Ssl::new(acceptor.context()).unwrap();
            let mut stream = Pin::new(Box::new(SslStream::new(ssl, tcp).unwrap()));
            stream.as_mut().accept().await.unwrap();
            tokio_tungstenite::accept_async(stream).await.unwrap();
        });

        let profile = ConnectionProfile {
            ca_cert_data: Some(pki.ca_pem()),
            ..Default::default()
        };
        let client = client(&profile, None);
        client.connect(&format!("wss://127.0.0.1:{}/watch", port)).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_untrusted_server_is_rejected() {
        let pki = TestPki::new();
        let (cert, key) = pki.issue("localhost");
        let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
        acceptor.set_certificate(&cert).unwrap();
        acceptor.set_private_key(&key).unwrap();
        let acceptor = acceptor.build();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ssl = Ssl::new(acceptor.context()).unwrap();
            let mut stream = Pin::new(Box::new(SslStream::new(ssl, tcp).unwrap()));
            let _ = stream.as_mut().accept().await;
        });

        let other = TestPki::new();
        let profile = ConnectionProfile {
            ca_cert_data: Some(other.ca_pem()),
            ..Default::default()
        };
        match client(&profile, None).connect(&format!("wss://127.0.0.1:{}/watch", port)).await {
            Err(e) => assert!(e.is_transport_error()),
            Ok(_) => panic!("untrusted server was accepted"),
        }
    }
}
