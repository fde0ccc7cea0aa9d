// # anon-core
//
// Core library for renewing a Tor circuit's exit identity and verifying
// the result.
//
// ## Architecture Overview
//
// - **ControlPort**: Trait for opening authenticated control sessions
// - **ProxyTransport**: Trait for issuing one GET through the SOCKS proxy
// - **RetryingFetcher**: Bounded-retry HTTPS fetch with growing timeouts
// - **ExitVerifier**: Learns the current exit address through the proxy
// - **RenewalCycle**: Renew, wait until ready, report the new exit IP
// - **Scheduler**: Drives cycles on a timer or on operator confirmation
// - **NetworkGuard**: Best-effort kill switch via platform firewall commands
//
// ## Design Principles
//
// 1. **Strictly sequential**: At most one renewal cycle is ever in flight
// 2. **Soft failure**: Every error is caught at its operation boundary and
//    logged; the surrounding loop keeps running
// 3. **Explicit configuration**: Credentials and settings are passed in at
//    construction, never read from ambient globals
// 4. **Library-first**: Adapters for Tor and HTTP live in their own crates

pub mod config;
pub mod cycle;
pub mod error;
pub mod fetcher;
pub mod guard;
pub mod probe;
pub mod scheduler;
pub mod traits;
pub mod verifier;

// Re-export core types for convenience
pub use config::{
    AnonConfig, ControlConfig, ControlCredential, FetcherConfig, GuardConfig, Mode, ProxyConfig,
};
pub use cycle::{RenewalAttempt, RenewalCycle};
pub use error::{Error, Result};
pub use fetcher::RetryingFetcher;
pub use guard::{FirewallBackend, GuardOutcome, NetworkGuard};
pub use probe::{ConnectivityProbe, ConnectivityReport};
pub use scheduler::{Scheduler, SchedulerEvent};
pub use traits::{
    CommandRunner, CommandSpec, Console, ControlChannel, ControlPort, ProxyRequest, ProxyResponse,
    ProxyTransport, Renewal,
};
pub use traits::command::SystemCommandRunner;
pub use verifier::ExitVerifier;
