//! Contract Test: Connectivity Probe
//!
//! Constraints verified:
//! - Ready circuits need no reconnection
//! - Unready circuits trigger exactly one renewal cycle
//! - The proxy check decodes the Tor check service's verdict
//! - Control port failures are reported, never fatal

mod common;

use anon_core::config::FetcherConfig;
use anon_core::fetcher::RetryingFetcher;
use anon_core::probe::{CONNECTION_RESTORED, ConnectivityProbe};
use common::*;
use std::sync::Arc;

const CHECK_URL: &str = "https://check.torproject.org/api/ip";

fn probe(behavior: DaemonBehavior, transport: MockTransport, log: &CallLog) -> ConnectivityProbe {
    let control = Arc::new(ScriptedControlPort::new(behavior, log.clone()));
    let fetcher = RetryingFetcher::new(Arc::new(transport), FetcherConfig::default());
    ConnectivityProbe::new(control, fetcher, CHECK_URL)
}

#[tokio::test]
async fn stable_connection_needs_no_reconnect() {
    let log = CallLog::new();
    let probe = probe(
        DaemonBehavior::ReadyAfter(1),
        MockTransport::always(200, r#"{"IsTor":true,"IP":"185.220.101.4"}"#, 1),
        &log,
    );
    let renewal = CountingRenewal::new(CallLog::new());
    let mut console = ScriptedConsole::default();

    let report = probe.run(&renewal, &mut console).await;

    assert_eq!(report.circuit_ready, Some(true));
    assert!(!report.reconnect_attempted);
    assert_eq!(report.is_tor, Some(true));
    assert_eq!(renewal.calls(), 0);
    assert_eq!(log.entries(), vec!["open", "authenticate", "poll", "close"]);
}

#[tokio::test]
async fn unstable_connection_triggers_one_renewal() {
    let log = CallLog::new();
    let probe = probe(
        DaemonBehavior::NeverReady,
        MockTransport::always(200, r#"{"IsTor":false,"IP":"203.0.113.9"}"#, 1),
        &log,
    );
    let renewal = CountingRenewal::new(CallLog::new());
    let mut console = ScriptedConsole::default();

    let report = probe.run(&renewal, &mut console).await;

    assert_eq!(report.circuit_ready, Some(false));
    assert!(report.reconnect_attempted);
    assert!(report.restored);
    assert_eq!(renewal.calls(), 1);
    assert_eq!(console.shown_count(CONNECTION_RESTORED), 1);
    assert_eq!(report.is_tor, Some(false));
}

#[tokio::test(start_paused = true)]
async fn control_failure_is_reported_not_fatal() {
    let log = CallLog::new();
    let probe = probe(
        DaemonBehavior::RejectCredential,
        MockTransport::unreachable(),
        &log,
    );
    let renewal = CountingRenewal::new(CallLog::new());
    let mut console = ScriptedConsole::default();

    let report = probe.run(&renewal, &mut console).await;

    assert_eq!(report.circuit_ready, None);
    assert!(!report.reconnect_attempted);
    assert_eq!(report.is_tor, None);
    assert_eq!(renewal.calls(), 0);
    assert!(console.shown.is_empty());
}
