//! One run of the tool, from kill switch to cleanup

use anon_core::config::Mode;
use anon_core::fetcher::RetryingFetcher;
use anon_core::guard::{FirewallBackend, NetworkGuard};
use anon_core::probe::ConnectivityProbe;
use anon_core::scheduler::Scheduler;
use anon_core::traits::{CommandRunner, Console, ControlPort, ProxyTransport};
use anon_core::{ExitVerifier, RenewalCycle, SystemCommandRunner};
use anon_proxy_http::SocksTransport;
use anon_tor_control::TorControlPort;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::cli::Settings;
use crate::logging;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Wired components for one session
pub struct Session {
    mode: Mode,
    cycle: RenewalCycle,
    probe: ConnectivityProbe,
    guard: NetworkGuard,
    log_file: PathBuf,
    clear_logs: bool,
    activate_kill_switch: bool,
    disable_kill_switch: bool,
    check_tor_connection: bool,
}

impl Session {
    /// Build the Tor and proxy adapters from settings
    pub fn new(settings: &Settings) -> Result<Self> {
        let config = &settings.config;

        let control: Arc<dyn ControlPort> = Arc::new(TorControlPort::new(&config.control));
        let transport: Arc<dyn ProxyTransport> = Arc::new(SocksTransport::new(&config.proxy)?);

        let backend = FirewallBackend::detect(&config.guard);
        debug!(backend = backend.name(), "Selected kill switch backend");

        Ok(Self::with_components(
            settings,
            control,
            transport,
            Arc::new(SystemCommandRunner),
            backend,
        ))
    }

    /// Wire a session around already built adapters
    pub fn with_components(
        settings: &Settings,
        control: Arc<dyn ControlPort>,
        transport: Arc<dyn ProxyTransport>,
        runner: Arc<dyn CommandRunner>,
        backend: FirewallBackend,
    ) -> Self {
        let config = &settings.config;

        let verifier = ExitVerifier::new(transport.clone(), &config.proxy);
        let cycle = RenewalCycle::new(control.clone(), verifier, &config.control);

        let fetcher = RetryingFetcher::new(transport, config.fetcher.clone());
        let probe = ConnectivityProbe::new(control, fetcher, config.proxy.tor_check_url.clone());

        let guard = NetworkGuard::new(backend, runner);

        Self {
            mode: config.mode,
            cycle,
            probe,
            guard,
            log_file: settings.log_file.clone(),
            clear_logs: settings.clear_logs,
            activate_kill_switch: settings.activate_kill_switch,
            disable_kill_switch: settings.disable_kill_switch,
            check_tor_connection: settings.check_tor_connection,
        }
    }

    /// Run every requested step in order
    ///
    /// Only a scheduler setup failure is returned. Kill switch, probe and
    /// log clearing failures are logged and skipped.
    pub async fn run(self, console: &mut dyn Console) -> Result<()> {
        self.run_with_shutdown(console, None).await
    }

    /// Run with an optional programmatic shutdown signal for the scheduler
    ///
    /// Without one, the scheduler stops on SIGINT or SIGTERM. Either way the
    /// cleanup steps still run afterwards.
    pub async fn run_with_shutdown(
        self,
        console: &mut dyn Console,
        shutdown: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        if self.activate_kill_switch {
            match self.guard.enable().await {
                Ok(outcome) => debug!(?outcome, "Kill switch enable finished"),
                Err(e) => error!("Failed to activate kill switch: {}", e),
            }
        }

        if self.check_tor_connection {
            let report = self.probe.run(&self.cycle, console).await;
            debug!(?report, "Connectivity check finished");
        }

        let (scheduler, mut events) =
            Scheduler::new(Box::new(self.cycle), self.mode, EVENT_CHANNEL_CAPACITY)?;
        let event_log = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                debug!(?event, "Scheduler event");
            }
        });

        let result = scheduler.run_with_shutdown(console, shutdown).await;
        drop(scheduler);
        let _ = event_log.await;
        result?;

        if self.clear_logs {
            match logging::clear(&self.log_file) {
                Ok(()) => info!("Logs cleared successfully."),
                Err(e) => error!("Failed to clear logs: {}", e),
            }
        }

        if self.disable_kill_switch {
            match self.guard.disable().await {
                Ok(outcome) => debug!(?outcome, "Kill switch disable finished"),
                Err(e) => error!("Failed to disable kill switch: {}", e),
            }
        }

        Ok(())
    }
}
