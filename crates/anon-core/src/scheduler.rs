//! Renewal scheduler
//!
//! Two mutually exclusive state machines, chosen once at startup:
//!
//! ```text
//! Automatic:  ┌──────────┐  cycle done  ┌──────────┐
//!             │ Renewing │─────────────▶│ Sleeping │──┐
//!             └──────────┘              └──────────┘  │ interval
//!                   ▲─────────────────────────────────┘
//!
//! Manual:     ┌───────────────┐ "y" ┌──────────┐
//!             │ AwaitingInput │────▶│ Renewing │──┐
//!             └───────────────┘     └──────────┘  │
//!               │  ▲  ▲ other input               │
//!               │  └──┘◀──────────────────────────┘
//!               │ "n" / input closed
//!               ▼
//!             Done
//! ```
//!
//! Cycles never overlap: the next cycle starts only after the previous one
//! has returned. Both machines also stop on the shutdown signal.

use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::Mode;
use crate::error::Result;
use crate::traits::{Console, Renewal};

/// Question asked in manual mode
pub const RENEW_PROMPT: &str = "Do you want to renew your IP? (y/n): ";

/// Shown when manual-mode input is neither "y" nor "n"
pub const INVALID_INPUT: &str = "Invalid input, please type 'y' or 'n'.";

/// Events emitted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Scheduler started
    Started { mode: Mode },

    /// Operator was asked whether to renew
    Prompted,

    /// Operator input was not understood
    InvalidInput { input: String },

    /// Renewal cycle started
    CycleStarted { cycle: usize },

    /// Renewal cycle finished
    CycleFinished {
        cycle: usize,
        renewed: bool,
        exit_ip: Option<IpAddr>,
    },

    /// Scheduler stopped
    Stopped { reason: String },
}

/// Drives renewal cycles in the configured mode
pub struct Scheduler {
    renewal: Box<dyn Renewal>,
    mode: Mode,
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver). Events are dropped with a
    /// warning when the channel is full.
    pub fn new(
        renewal: Box<dyn Renewal>,
        mode: Mode,
        event_channel_capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        mode.validate()?;
        let (tx, rx) = mpsc::channel(event_channel_capacity.max(1));

        Ok((
            Self {
                renewal,
                mode,
                event_tx: tx,
            },
            rx,
        ))
    }

    /// Run until the mode finishes or the process is asked to terminate
    pub async fn run(&self, console: &mut dyn Console) -> Result<()> {
        self.run_with_shutdown(console, None).await
    }

    /// Run with an optional programmatic shutdown signal
    ///
    /// When `shutdown_rx` is `None`, SIGINT (Ctrl-C) or SIGTERM stops the
    /// scheduler. A cycle in
    /// flight when shutdown arrives is abandoned.
    pub async fn run_with_shutdown(
        &self,
        console: &mut dyn Console,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit(SchedulerEvent::Started { mode: self.mode });

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    // A dropped sender means nobody will ever ask us to stop
                    if rx.await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => {
                    if let Err(e) = termination_signal().await {
                        warn!("Failed to listen for termination signals: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };

        let reason = tokio::select! {
            reason = self.drive(console) => reason,
            _ = shutdown => {
                info!("Shutdown signal received");
                "shutdown signal".to_string()
            }
        };

        info!(reason = %reason, "Scheduler stopped");
        self.emit(SchedulerEvent::Stopped { reason });
        Ok(())
    }

    async fn drive(&self, console: &mut dyn Console) -> String {
        match self.mode {
            Mode::Manual => self.manual(console).await,
            Mode::Automatic {
                interval_secs,
                max_cycles,
            } => {
                self.automatic(console, Duration::from_secs(interval_secs), max_cycles)
                    .await
            }
        }
    }

    async fn automatic(
        &self,
        console: &mut dyn Console,
        interval: Duration,
        max_cycles: Option<usize>,
    ) -> String {
        info!(interval_secs = interval.as_secs(), "Automatic mode started");
        let mut cycle = 0;

        loop {
            cycle += 1;
            self.run_cycle(console, cycle).await;

            if max_cycles.is_some_and(|limit| cycle >= limit) {
                return format!("completed {} cycle(s)", cycle);
            }

            debug!("Sleeping {:?} before next renewal", interval);
            tokio::time::sleep(interval).await;
        }
    }

    async fn manual(&self, console: &mut dyn Console) -> String {
        info!("Manual mode started");
        let mut cycle = 0;

        loop {
            self.emit(SchedulerEvent::Prompted);

            let Some(input) = console.prompt(RENEW_PROMPT).await else {
                return "input closed".to_string();
            };

            match input.trim().to_lowercase().as_str() {
                "y" => {
                    cycle += 1;
                    self.run_cycle(console, cycle).await;
                }
                "n" => return "operator declined".to_string(),
                _ => {
                    console.show(INVALID_INPUT);
                    self.emit(SchedulerEvent::InvalidInput { input });
                }
            }
        }
    }

    async fn run_cycle(&self, console: &mut dyn Console, cycle: usize) {
        self.emit(SchedulerEvent::CycleStarted { cycle });

        let attempt = self.renewal.renew().await;
        console.show(&format!("Current Tor Exit IP: {}", attempt.exit_ip_display()));

        info!(
            cycle,
            renewed = attempt.renewed(),
            elapsed_ms = attempt.elapsed().num_milliseconds(),
            "Renewal cycle finished"
        );

        self.emit(SchedulerEvent::CycleFinished {
            cycle,
            renewed: attempt.renewed(),
            exit_ip: attempt.exit_ip,
        });
    }

    fn emit(&self, event: SchedulerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping scheduler event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Wait for SIGINT or SIGTERM
#[cfg(unix)]
async fn termination_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => debug!("Received SIGTERM"),
        _ = sigint.recv() => debug!("Received SIGINT"),
    }
    Ok(())
}

/// Wait for Ctrl-C
#[cfg(not(unix))]
async fn termination_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
