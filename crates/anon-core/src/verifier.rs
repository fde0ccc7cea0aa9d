//! Exit address verification
//!
//! Asks an external IP-reporting service, through the SOCKS proxy, which
//! address our traffic currently leaves the anonymity network from.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::ProxyConfig;
use crate::error::{Error, Result};
use crate::traits::{ProxyRequest, ProxyTransport};

/// Single-shot exit IP probe
#[derive(Clone)]
pub struct ExitVerifier {
    transport: Arc<dyn ProxyTransport>,
    url: String,
    timeout: Duration,
}

impl ExitVerifier {
    /// Create a verifier from proxy configuration
    pub fn new(transport: Arc<dyn ProxyTransport>, config: &ProxyConfig) -> Self {
        Self {
            transport,
            url: config.exit_ip_url.clone(),
            timeout: config.verify_timeout(),
        }
    }

    /// Fetch the current exit IP
    ///
    /// Issues exactly one request; no retries.
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The trimmed response body, parsed
    /// - `Err(Error::Verification)`: Transport failure, timeout, error
    ///   status, or a body that is not an IP address
    pub async fn current_exit_ip(&self) -> Result<IpAddr> {
        let request = ProxyRequest::new(&self.url, self.timeout);

        let response = self
            .transport
            .get(&request)
            .await
            .map_err(|e| Error::verification(e.to_string()))?;

        if !response.is_success() {
            return Err(Error::verification(format!(
                "HTTP error: {}",
                response.status
            )));
        }

        let ip_text = response.body.trim();
        ip_text
            .parse::<IpAddr>()
            .map_err(|_| Error::verification(format!("Invalid IP address: {:?}", ip_text)))
    }

    /// Fetch the current exit IP, logging the outcome
    ///
    /// Failure is reported as `None` ("unknown") and never propagates.
    pub async fn current_exit_ip_or_unknown(&self) -> Option<IpAddr> {
        match self.current_exit_ip().await {
            Ok(ip) => {
                info!("Current Tor Exit IP: {}", ip);
                Some(ip)
            }
            Err(e) => {
                error!("Failed to retrieve Tor Exit IP: {}", e);
                None
            }
        }
    }
}
