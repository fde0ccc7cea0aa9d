//! Proxied HTTP transport
//!
//! A transport performs exactly one GET through the configured SOCKS proxy.
//! It never retries on its own; retry policy belongs to
//! [`RetryingFetcher`](crate::fetcher::RetryingFetcher).

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// A single proxied GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    /// Target URL
    pub url: String,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl ProxyRequest {
    /// Create a request without extra headers
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout,
        }
    }

    /// Attach request headers
    pub fn with_headers(mut self, headers: &[(String, String)]) -> Self {
        self.headers = headers.to_vec();
        self
    }
}

/// Response received through the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body decoded as text
    pub body: String,
}

impl ProxyResponse {
    /// Whether the status code is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for proxied transports
///
/// # Returns
///
/// - `Ok(ProxyResponse)`: Any response was received, whatever its status
/// - `Err(Error::Transport)`: Connection, proxy, TLS, or timeout failure
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    /// Perform one GET request through the proxy
    async fn get(&self, request: &ProxyRequest) -> Result<ProxyResponse>;
}
