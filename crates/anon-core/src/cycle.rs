//! Renewal cycle
//!
//! One cycle is the user-visible "renew IP" action:
//!
//! ```text
//! open session ─▶ authenticate ─▶ SIGNAL NEWNYM ─▶ wait until ready
//!                                                        │
//!          report ◀─ query exit IP ◀─ close session ◀────┘
//! ```
//!
//! Each step strictly follows the previous one. A failure at any step ends
//! the cycle; it is logged and recorded in the returned [`RenewalAttempt`],
//! never propagated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::ControlConfig;
use crate::error::Result;
use crate::traits::{ControlChannel, ControlPort, Renewal};
use crate::verifier::ExitVerifier;

/// Record of one renewal cycle
///
/// Exists only for the duration of the cycle and its report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewalAttempt {
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// When the cycle finished
    pub completed_at: DateTime<Utc>,
    /// Exit IP observed after renewal, if it could be determined
    pub exit_ip: Option<IpAddr>,
    /// Why the control phase failed, if it did
    pub failure: Option<String>,
}

impl RenewalAttempt {
    /// Whether the daemon acknowledged the renewal and reported readiness
    pub fn renewed(&self) -> bool {
        self.failure.is_none()
    }

    /// Exit IP for display, `"unknown"` when it could not be determined
    pub fn exit_ip_display(&self) -> String {
        self.exit_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Wall-clock duration of the cycle
    pub fn elapsed(&self) -> chrono::Duration {
        self.completed_at.signed_duration_since(self.started_at)
    }
}

/// Composes a control session and an exit verifier into one renewal
pub struct RenewalCycle {
    control: Arc<dyn ControlPort>,
    verifier: ExitVerifier,
    poll_interval: Duration,
    ready_timeout: Duration,
}

impl RenewalCycle {
    /// Create a renewal cycle
    ///
    /// # Parameters
    ///
    /// - `control`: Control endpoint
    /// - `verifier`: Exit IP probe run after the session is closed
    /// - `config`: Poll interval and readiness deadline
    pub fn new(control: Arc<dyn ControlPort>, verifier: ExitVerifier, config: &ControlConfig) -> Self {
        Self {
            control,
            verifier,
            poll_interval: config.poll_interval(),
            ready_timeout: config.ready_timeout(),
        }
    }

    /// Run one cycle
    pub async fn run(&self) -> RenewalAttempt {
        let started_at = Utc::now();
        info!(endpoint = %self.control.endpoint(), "Renewing Tor IP...");

        let (exit_ip, failure) = match self.renew_circuit().await {
            Ok(()) => {
                info!("Tor IP renewed successfully.");
                (self.verifier.current_exit_ip_or_unknown().await, None)
            }
            Err(e) => {
                error!("Failed to renew Tor IP: {}", e);
                (None, Some(e.to_string()))
            }
        };

        RenewalAttempt {
            started_at,
            completed_at: Utc::now(),
            exit_ip,
            failure,
        }
    }

    /// Open a session, renew, wait, and close the session on every path
    async fn renew_circuit(&self) -> Result<()> {
        let mut session = self.control.open().await?;

        let result = self.drive(session.as_mut()).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close control session: {}", e);
        }

        result
    }

    async fn drive(&self, session: &mut dyn ControlChannel) -> Result<()> {
        session.request_renewal().await?;
        session
            .wait_until_ready(self.poll_interval, self.ready_timeout)
            .await
    }
}

#[async_trait]
impl Renewal for RenewalCycle {
    async fn renew(&self) -> RenewalAttempt {
        self.run().await
    }
}
