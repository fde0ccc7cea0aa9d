//! Bounded-retry HTTPS fetch through the proxy
//!
//! ## Retry policy
//!
//! ```text
//! attempt 0   timeout = base            ── fail ──▶ sleep(delay)
//! attempt 1   timeout = base + step     ── fail ──▶ sleep(delay)
//! ...
//! attempt n-1 timeout = base + step·(n-1) ── fail ──▶ exhausted
//! ```
//!
//! Any received response ends the loop, whatever its status. Only transport
//! failures are retried. No sleep follows the final attempt.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::FetcherConfig;
use crate::error::{Error, Result};
use crate::traits::{ProxyRequest, ProxyResponse, ProxyTransport};

/// Per-call retry bookkeeping
///
/// Lives for one fetch call only; every call starts from attempt 0 with the
/// base timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Zero-based index of the next attempt
    pub attempt: usize,
    /// Timeout applied to the next attempt
    pub timeout: Duration,
}

impl RetryState {
    fn new(policy: &FetcherConfig) -> Self {
        Self {
            attempt: 0,
            timeout: Duration::from_secs(policy.base_timeout_secs),
        }
    }

    fn advance(&mut self, policy: &FetcherConfig) {
        self.attempt += 1;
        self.timeout += Duration::from_secs(policy.timeout_step_secs);
    }
}

/// HTTPS-only fetcher with bounded retries and growing timeouts
#[derive(Clone)]
pub struct RetryingFetcher {
    transport: Arc<dyn ProxyTransport>,
    policy: FetcherConfig,
}

impl RetryingFetcher {
    /// Create a fetcher over a proxied transport
    pub fn new(transport: Arc<dyn ProxyTransport>, policy: FetcherConfig) -> Self {
        Self { transport, policy }
    }

    /// Fetch with the configured number of attempts, reporting failure as `None`
    pub async fn fetch(&self, url: &str, headers: &[(String, String)]) -> Option<ProxyResponse> {
        self.fetch_with_retries(url, headers, self.policy.max_retries)
            .await
    }

    /// Fetch with an explicit number of attempts, reporting failure as `None`
    ///
    /// Failures are already logged by [`RetryingFetcher::try_fetch_with_retries`].
    pub async fn fetch_with_retries(
        &self,
        url: &str,
        headers: &[(String, String)],
        max_retries: usize,
    ) -> Option<ProxyResponse> {
        self.try_fetch_with_retries(url, headers, max_retries)
            .await
            .ok()
    }

    /// Fetch with the configured number of attempts
    pub async fn try_fetch(&self, url: &str, headers: &[(String, String)]) -> Result<ProxyResponse> {
        self.try_fetch_with_retries(url, headers, self.policy.max_retries)
            .await
    }

    /// Fetch with an explicit number of attempts
    ///
    /// # Returns
    ///
    /// - `Ok(ProxyResponse)`: The first response received
    /// - `Err(Error::InsecureScheme)`: URL is not HTTPS; nothing was sent
    /// - `Err(Error::RetriesExhausted)`: Every attempt failed in transport
    pub async fn try_fetch_with_retries(
        &self,
        url: &str,
        headers: &[(String, String)],
        max_retries: usize,
    ) -> Result<ProxyResponse> {
        if !is_https(url) {
            error!("Attempted to access insecure URL: {}", url);
            return Err(Error::InsecureScheme(url.to_string()));
        }

        let delay = Duration::from_secs(self.policy.retry_delay_secs);
        let mut state = RetryState::new(&self.policy);

        while state.attempt < max_retries {
            let request = ProxyRequest::new(url, state.timeout).with_headers(headers);

            match self.transport.get(&request).await {
                Ok(response) => {
                    info!(
                        status = response.status,
                        attempt = state.attempt + 1,
                        "Request to {} successful.",
                        url
                    );
                    return Ok(response);
                }
                Err(e) => {
                    error!(
                        timeout_secs = state.timeout.as_secs(),
                        "Request failed (Attempt {}/{}): {}",
                        state.attempt + 1,
                        max_retries,
                        e
                    );
                    state.advance(&self.policy);

                    if state.attempt < max_retries {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        error!("Max retries reached for {}, giving up.", url);
        Err(Error::RetriesExhausted {
            url: url.to_string(),
            attempts: max_retries,
        })
    }
}

fn is_https(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|parsed| parsed.scheme() == "https")
}
