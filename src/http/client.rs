//! Signed HTTP client
//!
//! Provides a thin HTTP client that handles:
//! - User agent and request timeout
//! - Query parameters
//! - Request signing through the auth module
//!
//! It performs exactly one attempt per call. Retry policy lives in the page
//! fetcher, which needs to see raw statuses and rate-limit headers.

use super::rate_limit::RateLimitInfo;
use crate::auth::{NoAuth, SharedSigner};
use crate::error::{Error, Result};
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("likers-collector/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: HashMap<String, String>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Body as text
    pub body: String,
}

impl HttpResponse {
    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Rate-limit headers carried by this response
    pub fn rate_limit(&self) -> RateLimitInfo {
        RateLimitInfo::from_headers(&self.headers)
    }

    /// Body shortened for log lines
    pub fn body_excerpt(&self, max_chars: usize) -> String {
        if self.body.chars().count() <= max_chars {
            return self.body.clone();
        }
        let cut: String = self.body.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

/// Signed HTTP client, one attempt per call
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    signer: SharedSigner,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            signer: Arc::new(NoAuth),
        })
    }

    /// Use `signer` for every request
    #[must_use]
    pub fn with_signer(mut self, signer: SharedSigner) -> Self {
        self.signer = signer;
        self
    }

    /// Make a GET request to the absolute `url`
    ///
    /// Non-2xx statuses are returned as responses, not errors. Errors are
    /// transport-level only (connect, timeout, body read) or signing failures.
    pub async fn get_with_config(&self, url: &str, config: RequestConfig) -> Result<HttpResponse> {
        let timeout = self.config.timeout;

        let mut req = self.client.get(url);
        if !config.query.is_empty() {
            req = req.query(&config.query);
        }
        req = self.signer.sign(req).await?;

        debug!("GET {} params={:?}", url, config.query);

        let response = req.send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| classify(e, timeout))?;

        debug!("GET {} -> {}", url, status);

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("signer", &self.signer.name())
            .finish_non_exhaustive()
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        #[allow(clippy::cast_possible_truncation)]
        return Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        };
    }
    Error::Http(err)
}
