//! Tor connectivity probe
//!
//! Run once before entering the chosen mode. It checks two things:
//!
//! 1. The control port accepts our credential and reports usable circuits.
//!    If not, one renewal cycle is run to try to restore the connection.
//! 2. Traffic through the SOCKS proxy actually arrives via Tor, according
//!    to the Tor Project's check service.
//!
//! Every failure is logged and reported; none is fatal.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::fetcher::RetryingFetcher;
use crate::traits::{Console, ControlPort, Renewal};

/// Shown after a successful reconnection attempt
pub const CONNECTION_RESTORED: &str = "Tor connection restored.";

/// Outcome of the connectivity probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivityReport {
    /// Circuit readiness reported by the daemon (`None` if it could not be asked)
    pub circuit_ready: Option<bool>,
    /// Whether a reconnection cycle was run
    pub reconnect_attempted: bool,
    /// Whether the reconnection cycle succeeded
    pub restored: bool,
    /// Whether the check service saw our request arrive through Tor
    pub is_tor: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TorCheckResponse {
    #[serde(rename = "IsTor")]
    is_tor: bool,
    #[serde(rename = "IP")]
    ip: Option<String>,
}

/// Connectivity check for `--check-tor-connection`
pub struct ConnectivityProbe {
    control: Arc<dyn ControlPort>,
    fetcher: RetryingFetcher,
    check_url: String,
}

impl ConnectivityProbe {
    /// Create a probe
    ///
    /// # Parameters
    ///
    /// - `control`: Control endpoint to query
    /// - `fetcher`: Retrying fetcher used for the proxy check
    /// - `check_url`: JSON endpoint reporting `IsTor`
    pub fn new(
        control: Arc<dyn ControlPort>,
        fetcher: RetryingFetcher,
        check_url: impl Into<String>,
    ) -> Self {
        Self {
            control,
            fetcher,
            check_url: check_url.into(),
        }
    }

    /// Run the probe, reconnecting through `renewal` if circuits are down
    pub async fn run(&self, renewal: &dyn Renewal, console: &mut dyn Console) -> ConnectivityReport {
        info!("Checking Tor connectivity...");
        let mut report = ConnectivityReport::default();

        match self.circuit_ready().await {
            Ok(true) => {
                info!("Tor is connected and stable.");
                report.circuit_ready = Some(true);
            }
            Ok(false) => {
                error!("Tor connection is unstable or down. Attempting reconnection...");
                report.circuit_ready = Some(false);
                report.reconnect_attempted = true;

                let attempt = renewal.renew().await;
                report.restored = attempt.renewed();
                if report.restored {
                    console.show(CONNECTION_RESTORED);
                } else {
                    console.show("Tor connection could not be restored.");
                }
            }
            Err(e) => {
                error!("Failed to check Tor connectivity: {}", e);
            }
        }

        report.is_tor = self.proxy_is_tor().await;
        report
    }

    async fn circuit_ready(&self) -> Result<bool> {
        let mut session = self.control.open().await?;
        let ready = session.is_renewal_ready().await;

        if let Err(e) = session.close().await {
            warn!("Failed to close control session: {}", e);
        }

        ready
    }

    async fn proxy_is_tor(&self) -> Option<bool> {
        let response = self.fetcher.fetch(&self.check_url, &[]).await?;

        if !response.is_success() {
            error!(status = response.status, "Tor check service returned an error");
            return None;
        }

        match serde_json::from_str::<TorCheckResponse>(&response.body) {
            Ok(check) if check.is_tor => {
                info!(ip = ?check.ip, "Proxy traffic is routed through Tor");
                Some(true)
            }
            Ok(check) => {
                error!(ip = ?check.ip, "Proxy traffic is NOT routed through Tor");
                Some(false)
            }
            Err(e) => {
                error!("Failed to decode Tor check response: {}", e);
                None
            }
        }
    }
}
