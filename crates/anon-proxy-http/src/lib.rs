// # SOCKS HTTP Transport
//
// Implements the core `ProxyTransport` trait with reqwest, routing every
// request through the Tor SOCKS proxy.
//
// ## Proxy URL
//
// Use `socks5h://` so that DNS resolution also happens inside Tor. A plain
// `socks5://` URL resolves names locally and leaks lookups.
//
// ## Behavior
//
// One `get` call is exactly one request: no retries, no redirects across
// schemes. Retrying belongs to the core `RetryingFetcher`.

use anon_core::config::ProxyConfig;
use anon_core::traits::{ProxyRequest, ProxyResponse, ProxyTransport};
use anon_core::{Error, Result};

use async_trait::async_trait;
use reqwest::redirect::Policy;
use tracing::debug;

/// Maximum redirects followed for a single request
const MAX_REDIRECTS: usize = 5;

/// HTTP transport over a SOCKS proxy
pub struct SocksTransport {
    /// Proxy URL, for logs
    proxy_url: String,

    /// HTTP client bound to the proxy
    client: reqwest::Client,
}

impl SocksTransport {
    /// Create a transport from configuration
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        Self::with_proxy(&config.socks_url)
    }

    /// Create a transport for a proxy URL (e.g. "socks5h://127.0.0.1:9050")
    pub fn with_proxy(proxy_url: &str) -> Result<Self> {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| Error::config(format!("invalid proxy URL {}: {}", proxy_url, e)))?;

        let client = reqwest::Client::builder()
            .proxy(proxy)
            .redirect(Policy::custom(|attempt| {
                if attempt.url().scheme() != "https" {
                    attempt.error("redirect to a non-HTTPS URL")
                } else if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.stop()
                } else {
                    attempt.follow()
                }
            }))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            proxy_url: proxy_url.to_string(),
            client,
        })
    }

    /// The proxy every request goes through
    pub fn proxy_url(&self) -> &str {
        &self.proxy_url
    }
}

#[async_trait]
impl ProxyTransport for SocksTransport {
    async fn get(&self, request: &ProxyRequest) -> Result<ProxyResponse> {
        debug!(url = %request.url, proxy = %self.proxy_url, timeout = ?request.timeout, "Sending request");

        let mut builder = self.client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(describe)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(describe)?;

        Ok(ProxyResponse { status, body })
    }
}

fn describe(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::transport(format!("request timed out: {}", err))
    } else if err.is_connect() {
        Error::transport(format!("proxy connection failed: {}", err))
    } else {
        Error::transport(err.to_string())
    }
}
