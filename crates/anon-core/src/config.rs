//! Configuration types for the renewal tool
//!
//! Everything a component needs is handed to it at construction. Nothing in
//! the crate reads the environment on its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnonConfig {
    /// Control endpoint settings
    #[serde(default)]
    pub control: ControlConfig,

    /// SOCKS proxy and verification endpoints
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Retrying fetch policy
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Kill switch settings
    #[serde(default)]
    pub guard: GuardConfig,

    /// Scheduling mode, fixed for the process lifetime
    #[serde(default)]
    pub mode: Mode,
}

impl AnonConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.control.validate()?;
        self.proxy.validate()?;
        self.fetcher.validate()?;
        self.mode.validate()?;
        Ok(())
    }
}

/// Secret used to authenticate to the control port
///
/// The value is wiped from memory on drop and never appears in `Debug`
/// output or serialized configuration.
#[derive(Clone, Default)]
pub struct ControlCredential(Zeroizing<String>);

impl ControlCredential {
    /// Wrap a secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// The raw secret, for the authentication command only
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Whether no secret was configured
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ControlCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Control endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Control port address (host:port)
    #[serde(default = "default_control_address")]
    pub address: String,

    /// Credential used once per session
    #[serde(skip)]
    pub credential: ControlCredential,

    /// Interval between readiness polls (in milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deadline for a new circuit to become usable (in seconds)
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Minimum time the daemon needs between two NEWNYM signals (in seconds)
    #[serde(default = "default_newnym_cooldown_secs")]
    pub newnym_cooldown_secs: u64,

    /// Bound on connecting and on each control reply (in seconds)
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl ControlConfig {
    /// Validate the control configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.address.is_empty() {
            return Err(crate::Error::config("Control port address cannot be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(crate::Error::config("Readiness poll interval must be > 0"));
        }
        if self.ready_timeout_secs == 0 {
            return Err(crate::Error::config("Readiness timeout must be > 0"));
        }
        if self.newnym_cooldown_secs >= self.ready_timeout_secs {
            return Err(crate::Error::config(format!(
                "Readiness timeout ({}s) must exceed the NEWNYM cooldown ({}s)",
                self.ready_timeout_secs, self.newnym_cooldown_secs
            )));
        }
        if self.command_timeout_secs == 0 {
            return Err(crate::Error::config("Control command timeout must be > 0"));
        }
        Ok(())
    }

    /// Readiness poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Readiness deadline
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// NEWNYM rate-limit window
    pub fn newnym_cooldown(&self) -> Duration {
        Duration::from_secs(self.newnym_cooldown_secs)
    }

    /// Bound on connecting and on each control reply
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            address: default_control_address(),
            credential: ControlCredential::default(),
            poll_interval_ms: default_poll_interval_ms(),
            ready_timeout_secs: default_ready_timeout_secs(),
            newnym_cooldown_secs: default_newnym_cooldown_secs(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

/// Proxy and external endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// SOCKS proxy URL used for every outbound request
    #[serde(default = "default_socks_url")]
    pub socks_url: String,

    /// Plain-text IP reporting service
    #[serde(default = "default_exit_ip_url")]
    pub exit_ip_url: String,

    /// Timeout for the exit IP probe (in seconds)
    #[serde(default = "default_verify_timeout_secs")]
    pub verify_timeout_secs: u64,

    /// JSON endpoint that reports whether a request arrived through Tor
    #[serde(default = "default_tor_check_url")]
    pub tor_check_url: String,
}

impl ProxyConfig {
    /// Validate the proxy configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let socks = url::Url::parse(&self.socks_url)
            .map_err(|e| crate::Error::config(format!("Invalid SOCKS proxy URL: {}", e)))?;
        match socks.scheme() {
            "socks5" | "socks5h" | "socks4" | "socks4a" => {}
            other => {
                return Err(crate::Error::config(format!(
                    "SOCKS proxy URL must use a socks scheme. Got: {}",
                    other
                )));
            }
        }

        for endpoint in [&self.exit_ip_url, &self.tor_check_url] {
            let parsed = url::Url::parse(endpoint)
                .map_err(|e| crate::Error::config(format!("Invalid URL {}: {}", endpoint, e)))?;
            if parsed.scheme() != "https" {
                return Err(crate::Error::config(format!(
                    "Verification endpoints must use HTTPS. Got: {}",
                    endpoint
                )));
            }
        }

        if self.verify_timeout_secs == 0 {
            return Err(crate::Error::config("Verification timeout must be > 0"));
        }
        Ok(())
    }

    /// Exit IP probe timeout
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            socks_url: default_socks_url(),
            exit_ip_url: default_exit_ip_url(),
            verify_timeout_secs: default_verify_timeout_secs(),
            tor_check_url: default_tor_check_url(),
        }
    }
}

/// Retrying fetch policy
///
/// Attempt `i` (zero-based) uses a timeout of
/// `base_timeout_secs + timeout_step_secs * i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Number of attempts per fetch
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Timeout of the first attempt (in seconds)
    #[serde(default = "default_base_timeout_secs")]
    pub base_timeout_secs: u64,

    /// Timeout growth per attempt (in seconds)
    #[serde(default = "default_timeout_step_secs")]
    pub timeout_step_secs: u64,

    /// Pause between consecutive attempts (in seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl FetcherConfig {
    /// Validate the fetch policy
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_retries == 0 {
            return Err(crate::Error::config("max_retries must be at least 1"));
        }
        if self.base_timeout_secs == 0 {
            return Err(crate::Error::config("Base fetch timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_timeout_secs: default_base_timeout_secs(),
            timeout_step_secs: default_timeout_step_secs(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

/// Kill switch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Network interface toggled on Windows
    #[serde(default = "default_interface")]
    pub interface: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
        }
    }
}

/// Scheduling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Mode {
    /// Renew on operator confirmation
    #[default]
    Manual,

    /// Renew on a fixed interval
    Automatic {
        /// Pause after each cycle (in seconds)
        interval_secs: u64,
        /// Stop after this many cycles (runs forever when unset)
        #[serde(default)]
        max_cycles: Option<usize>,
    },
}

impl Mode {
    /// Automatic mode with the given interval and no cycle limit
    pub fn automatic(interval_secs: u64) -> Self {
        Mode::Automatic {
            interval_secs,
            max_cycles: None,
        }
    }

    /// Validate the mode
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Mode::Automatic {
            max_cycles: Some(0),
            ..
        } = self
        {
            return Err(crate::Error::config("max_cycles must be at least 1"));
        }
        Ok(())
    }
}

fn default_control_address() -> String {
    "127.0.0.1:9051".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_ready_timeout_secs() -> u64 {
    120
}

fn default_newnym_cooldown_secs() -> u64 {
    10
}

fn default_command_timeout_secs() -> u64 {
    10
}

fn default_socks_url() -> String {
    "socks5h://127.0.0.1:9050".to_string()
}

fn default_exit_ip_url() -> String {
    "https://ipinfo.io/ip".to_string()
}

fn default_verify_timeout_secs() -> u64 {
    5
}

fn default_tor_check_url() -> String {
    "https://check.torproject.org/api/ip".to_string()
}

fn default_max_retries() -> usize {
    2
}

fn default_base_timeout_secs() -> u64 {
    5
}

fn default_timeout_step_secs() -> u64 {
    2
}

fn default_retry_delay_secs() -> u64 {
    1
}

fn default_interface() -> String {
    "Wi-Fi".to_string()
}
