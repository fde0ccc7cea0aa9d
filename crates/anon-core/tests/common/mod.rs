//! Test doubles and common utilities for contract tests
//!
//! These doubles stand in for the control daemon, the SOCKS proxy, the
//! firewall, and the operator. They record what was asked of them so tests
//! can assert on ordering and counts.

#![allow(dead_code)]

use anon_core::cycle::RenewalAttempt;
use anon_core::error::{Error, Result};
use anon_core::traits::{
    CommandOutput, CommandRunner, CommandSpec, Console, ControlChannel, ControlPort, ProxyRequest,
    ProxyResponse, ProxyTransport, Renewal,
};
use std::collections::VecDeque;
use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Shared, ordered record of calls made on the doubles
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }
}

/// How the scripted control daemon behaves
#[derive(Debug, Clone, Copy)]
pub enum DaemonBehavior {
    /// Accepts the credential; reports ready on the given poll (1-based)
    ReadyAfter(usize),
    /// Rejects the credential
    RejectCredential,
    /// Cannot be reached
    Unreachable,
    /// Accepts the credential but never reports ready
    NeverReady,
    /// Accepts the credential, then never answers a readiness query
    Stalled,
}

/// A control port whose daemon follows a fixed script
pub struct ScriptedControlPort {
    behavior: DaemonBehavior,
    log: CallLog,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedControlPort {
    pub fn new(behavior: DaemonBehavior, log: CallLog) -> Self {
        Self {
            behavior,
            log,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of sessions successfully opened
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of sessions closed
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ControlPort for ScriptedControlPort {
    async fn open(&self) -> Result<Box<dyn ControlChannel>> {
        self.log.push("open");
        match self.behavior {
            DaemonBehavior::Unreachable => {
                Err(Error::auth("failed to connect to control port: Connection refused"))
            }
            DaemonBehavior::RejectCredential => Err(Error::auth(
                "515 Authentication failed: Password did not match HashedControlPassword value",
            )),
            behavior => {
                self.log.push("authenticate");
                self.opened.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedChannel {
                    behavior,
                    polls: 0,
                    log: self.log.clone(),
                    closed: Arc::clone(&self.closed),
                }))
            }
        }
    }

    fn endpoint(&self) -> String {
        "scripted".to_string()
    }
}

struct ScriptedChannel {
    behavior: DaemonBehavior,
    polls: usize,
    log: CallLog,
    closed: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl ControlChannel for ScriptedChannel {
    async fn request_renewal(&mut self) -> Result<()> {
        self.log.push("signal");
        Ok(())
    }

    async fn is_renewal_ready(&mut self) -> Result<bool> {
        self.log.push("poll");
        self.polls += 1;
        if let DaemonBehavior::Stalled = self.behavior {
            std::future::pending::<()>().await;
        }
        Ok(match self.behavior {
            DaemonBehavior::ReadyAfter(n) => self.polls >= n,
            _ => false,
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.log.push("close");
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A proxy transport that replays scripted outcomes
///
/// When the script runs out, every further request fails in transport.
pub struct MockTransport {
    script: Mutex<VecDeque<Result<ProxyResponse>>>,
    requests: Arc<Mutex<Vec<(ProxyRequest, Instant)>>>,
    log: Option<CallLog>,
}

impl MockTransport {
    pub fn scripted(script: Vec<Result<ProxyResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
            log: None,
        }
    }

    /// A proxy that can never be reached
    pub fn unreachable() -> Self {
        Self::scripted(Vec::new())
    }

    /// A proxy that answers every request with the same response
    pub fn always(status: u16, body: &str, count: usize) -> Self {
        Self::scripted((0..count).map(|_| Ok(response(status, body))).collect())
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Requests received, with the (paused-clock) time they arrived
    pub fn requests(&self) -> Vec<(ProxyRequest, Instant)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ProxyTransport for MockTransport {
    async fn get(&self, request: &ProxyRequest) -> Result<ProxyResponse> {
        if let Some(log) = &self.log {
            log.push(format!("fetch {}", request.url));
        }
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), Instant::now()));

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::transport("SOCKS proxy unreachable")))
    }
}

pub fn response(status: u16, body: &str) -> ProxyResponse {
    ProxyResponse {
        status,
        body: body.to_string(),
    }
}

/// A renewal that counts invocations and detects overlapping cycles
#[derive(Clone)]
pub struct CountingRenewal {
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    log: CallLog,
}

impl CountingRenewal {
    pub fn new(log: CallLog) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicBool::new(false)),
            overlaps: Arc::new(AtomicUsize::new(0)),
            log,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Renewal for CountingRenewal {
    async fn renew(&self) -> RenewalAttempt {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = chrono::Utc::now();
        self.log.push(format!("start {}", n));

        // Give any concurrently scheduled cycle a chance to run
        tokio::task::yield_now().await;

        self.log.push(format!("end {}", n));
        self.in_flight.store(false, Ordering::SeqCst);

        RenewalAttempt {
            started_at,
            completed_at: chrono::Utc::now(),
            exit_ip: Some(IpAddr::from([10, 0, 0, n as u8])),
            failure: None,
        }
    }
}

/// An operator that types a fixed sequence of answers
#[derive(Default)]
pub struct ScriptedConsole {
    inputs: VecDeque<String>,
    pub prompts: usize,
    pub shown: Vec<String>,
}

impl ScriptedConsole {
    pub fn new(inputs: &[&str]) -> Self {
        Self {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            prompts: 0,
            shown: Vec::new(),
        }
    }

    pub fn shown_count(&self, line: &str) -> usize {
        self.shown.iter().filter(|l| *l == line).count()
    }
}

#[async_trait::async_trait]
impl Console for ScriptedConsole {
    async fn prompt(&mut self, _question: &str) -> Option<String> {
        self.prompts += 1;
        self.inputs.pop_front()
    }

    fn show(&mut self, line: &str) {
        self.shown.push(line.to_string());
    }
}

/// A command runner simulating the Linux iptables rule table
#[derive(Default)]
pub struct FakeIptables {
    rule_present: Mutex<bool>,
    commands: Mutex<Vec<CommandSpec>>,
    fail_toggles: bool,
    denied: bool,
}

impl FakeIptables {
    pub fn new() -> Self {
        Self::default()
    }

    /// A firewall whose insert/delete commands exit non-zero
    pub fn failing() -> Self {
        Self {
            fail_toggles: true,
            ..Self::default()
        }
    }

    /// A firewall that refuses every command, the way iptables does
    /// without root: exit status 4 and a permission error
    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::default()
        }
    }

    pub fn rule_present(&self) -> bool {
        *self.rule_present.lock().unwrap()
    }

    /// Every command run, including state probes
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap().clone()
    }

    /// The iptables action flags of toggling commands, in order
    pub fn toggles(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter_map(|c| c.args.get(1).cloned())
            .filter(|action| action != "-C")
            .collect()
    }
}

#[async_trait::async_trait]
impl CommandRunner for FakeIptables {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.clone());

        if self.denied {
            return Ok(CommandOutput {
                success: false,
                code: Some(4),
                stdout: String::new(),
                stderr: "iptables v1.8.9 (nf_tables): Could not fetch rule set generation id: Permission denied (you must be root)".to_string(),
            });
        }

        let mut present = self.rule_present.lock().unwrap();
        let success = match command.args.get(1).map(String::as_str) {
            Some("-C") => *present,
            Some("-I") if !self.fail_toggles => {
                *present = true;
                true
            }
            Some("-D") if !self.fail_toggles && *present => {
                *present = false;
                true
            }
            _ => false,
        };

        Ok(CommandOutput {
            success,
            code: Some(if success { 0 } else { 1 }),
            stdout: String::new(),
            stderr: if success {
                String::new()
            } else {
                "iptables: Bad rule (does a matching rule exist in that chain?).".to_string()
            },
        })
    }
}

/// Captures formatted log output for the current thread
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route this thread's log output into the capture buffer
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Number of captured lines containing `needle`
    pub fn count(&self, needle: &str) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Control configuration tuned for fast tests
pub fn fast_control_config() -> anon_core::config::ControlConfig {
    anon_core::config::ControlConfig {
        poll_interval_ms: 500,
        ready_timeout_secs: 5,
        ..Default::default()
    }
}
