// # Control Port Trait
//
// Defines the interface the renewal cycle needs from the anonymity daemon's
// control endpoint.
//
// ## Implementations
//
// - Tor control protocol over TCP: `anon-tor-control` crate
//
// ## Usage
//
// ```rust,ignore
// let mut session = control_port.open().await?;   // connect + authenticate
// session.request_renewal().await?;               // SIGNAL NEWNYM
// session
//     .wait_until_ready(Duration::from_millis(500), Duration::from_secs(120))
//     .await?;
// session.close().await?;
// ```

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{Error, Result};

/// Factory for short-lived authenticated control sessions
///
/// One session is opened per renewal and closed before the next begins.
/// Sessions are never pooled or reused across cycles.
#[async_trait]
pub trait ControlPort: Send + Sync {
    /// Connect to the control endpoint and authenticate
    ///
    /// # Returns
    ///
    /// - `Ok(session)`: An authenticated session
    /// - `Err(Error::Auth)`: Endpoint unreachable or credential rejected
    async fn open(&self) -> Result<Box<dyn ControlChannel>>;

    /// Human-readable endpoint description, for logs
    fn endpoint(&self) -> String;
}

/// One authenticated control session
#[async_trait]
pub trait ControlChannel: Send {
    /// Ask the daemon for a new identity (fresh circuits)
    async fn request_renewal(&mut self) -> Result<()>;

    /// Whether the daemon reports that new circuits are usable
    async fn is_renewal_ready(&mut self) -> Result<bool>;

    /// Release the session
    ///
    /// Must be called on every exit path. Implementations should also
    /// release the connection on drop.
    async fn close(&mut self) -> Result<()>;

    /// Poll [`ControlChannel::is_renewal_ready`] until it reports ready
    ///
    /// Fails with [`Error::TimedOut`] once `timeout` has elapsed without the
    /// daemon reporting readiness, including when a poll itself never
    /// completes.
    async fn wait_until_ready(&mut self, poll_interval: Duration, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut polls = 0usize;

        loop {
            polls += 1;
            let ready = tokio::time::timeout_at(deadline, self.is_renewal_ready())
                .await
                .map_err(|_| Error::TimedOut(timeout))?;
            if ready? {
                debug!(polls, "New circuit reported ready");
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(Error::TimedOut(timeout));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }
}
