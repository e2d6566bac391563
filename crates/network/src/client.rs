// crates/network/src/client.rs
//! HTTP client wrapper with retry

use crate::error::{NetworkError, NetworkResult};
use crate::retry::RetryPolicy;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Retry policy
    pub retry_policy: Option<RetryPolicy>,
    /// Bearer token sent with every request
    pub api_key: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("Hymnal/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 10,
            retry_policy: Some(RetryPolicy::new(3).with_initial_delay(Duration::from_millis(100))),
            api_key: None,
        }
    }
}

/// HTTP client with retry on transient failures
#[derive(Clone)]
pub struct Client {
    inner: ReqwestClient,
    config: ClientConfig,
}

impl Client {
    /// Creates a new client with default configuration
    pub fn new() -> NetworkResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> NetworkResult<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(NetworkError::Http)?;

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Performs a GET request
    pub async fn get(&self, url: &str) -> NetworkResult<Response> {
        self.request(|| self.builder(Method::GET, url)).await
    }

    /// Performs a GET request and decodes a JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> NetworkResult<T> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await.map_err(NetworkError::Http)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sends a JSON body with the given method and decodes the JSON reply
    pub async fn send_json<B, T>(&self, method: Method, url: &str, body: &B) -> NetworkResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)?;
        let response = self
            .request(|| {
                self.builder(method.clone(), url)
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(payload.clone())
            })
            .await?;

        let bytes = response.bytes().await.map_err(NetworkError::Http)?;
        if bytes.is_empty() {
            // Some endpoints answer 204; decode that as JSON null
            return Ok(serde_json::from_slice(b"null")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Checks if a URL is accessible
    pub async fn is_accessible(&self, url: &str) -> bool {
        self.builder(Method::HEAD, url)
            .send()
            .await
            .map(|r| !r.status().is_server_error())
            .unwrap_or(false)
    }

    fn builder(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.inner.request(method, url);
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Sends a request, retrying transport failures and 5xx/429 answers
    async fn request<F>(&self, build: F) -> NetworkResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempts = 0;
        let max_attempts = self
            .config
            .retry_policy
            .as_ref()
            .map(|p| p.max_attempts())
            .unwrap_or(1);

        loop {
            attempts += 1;

            let error = match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    NetworkError::Status {
                        code: status.as_u16(),
                        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                    }
                }
                Err(e) if e.is_timeout() => NetworkError::Timeout,
                Err(e) => NetworkError::Http(e),
            };

            if !error.is_retryable() || attempts >= max_attempts {
                return Err(error);
            }

            log::debug!("Request attempt {} failed: {}; retrying", attempts, error);
            if let Some(policy) = &self.config.retry_policy {
                tokio::time::sleep(policy.delay_for_attempt(attempts)).await;
            }
        }
    }
}
