//! HTTP client bound to the master address

use http::Method;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::{FactoryError, Result};
use crate::config::profile::Secret;
use crate::tls::TransportSecurity;

/// Longest response body kept in a [`FactoryError::Status`]
const MAX_ERROR_BODY: usize = 1024;

/// Basic-auth credential pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<Secret>,
}

/// HTTP client carrying the resolved trust, identity and credentials
///
/// Every request is authorised with the bearer token when one was discovered,
/// otherwise with basic auth when a username is configured.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    bearer_token: Option<Secret>,
    basic_auth: Option<BasicAuth>,
    client_identity: bool,
}

impl HttpClient {
    pub fn new(
        base_url: &str,
        security: &TransportSecurity,
        bearer_token: Option<Secret>,
        basic_auth: Option<BasicAuth>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| FactoryError::Address(format!("{}: {}", base_url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain"));

        let builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION));
        let http = security.configure_http(builder)?.build()?;

        debug!(
            "Built HTTP client for {} (bearer token: {}, basic auth: {}, client certificate: {})",
            base_url,
            bearer_token.is_some(),
            basic_auth.is_some(),
            security.identity().is_some()
        );

        Ok(Self {
            http,
            base_url,
            bearer_token,
            basic_auth,
            client_identity: security.identity().is_some(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn bearer_token(&self) -> Option<&Secret> {
        self.bearer_token.as_ref()
    }

    pub fn has_client_identity(&self) -> bool {
        self.client_identity
    }

    pub fn basic_auth_user(&self) -> Option<&str> {
        self.basic_auth.as_ref().map(|auth| auth.username.as_str())
    }

    /// Underlying reqwest client, for requests the helpers do not cover
    pub fn inner(&self) -> &reqwest::Client {
        &self.http
    }

    /// URL for `path` below the base URL, keeping any base path prefix
    pub fn url(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path))
            .map_err(|e| FactoryError::Address(format!("{}/{}: {}", base, path, e)))
    }

    /// Authorised request builder for `path`
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let builder = self.http.request(method, self.url(path)?);
        Ok(self.authorize(builder))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match (&self.bearer_token, &self.basic_auth) {
            (Some(token), _) => builder.bearer_auth(token.expose()),
            (None, Some(auth)) => builder.basic_auth(&auth.username, auth.password.as_ref().map(Secret::expose)),
            (None, None) => builder,
        }
    }

    /// GET `path` and decode the body as JSON
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(Method::GET, path)?.send().await?;
        handle_response(response).await
    }

    /// Send `body` as JSON and decode the JSON reply
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(method, path)?.json(body).send().await?;
        handle_response(response).await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("bearer_token", &self.bearer_token)
            .field("basic_auth_user", &self.basic_auth_user())
            .field("client_identity", &self.client_identity)
            .finish()
    }
}

/// Decode a successful response, or map the failure to an error
///
/// Plain-text bodies are decoded as JSON too; some masters label JSON
/// replies as `text/plain`.
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        return Err(FactoryError::Status {
            status: status.as_u16(),
            body,
        });
    }

    if !is_json_compatible(content_type.as_deref()) {
        return Err(FactoryError::UnsupportedContentType(content_type.unwrap_or_default()));
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Whether a body with this content type is decoded as JSON
pub fn is_json_compatible(content_type: Option<&str>) -> bool {
    let essence = match content_type {
        Some(value) => value.split(';').next().unwrap_or("").trim().to_ascii_lowercase(),
        None => return true,
    };

    essence.is_empty()
        || essence == "application/json"
        || essence.ends_with("+json")
        || essence.starts_with("text/")
}
