//! Network kill switch
//!
//! Best-effort egress blocking through the host firewall. The backend is
//! chosen once at startup from the build target:
//!
//! | Backend     | enable                                      | disable          |
//! |-------------|---------------------------------------------|------------------|
//! | Linux       | `iptables -I OUTPUT -m conntrack --ctstate NEW -j DROP` | same rule with `-D` |
//! | Windows     | `netsh interface set interface <iface> admin=disable` | `admin=enable` |
//! | Unsupported | "not supported" error                       | same             |
//!
//! Before toggling, the current state is probed (`iptables -C`, or
//! `netsh interface show interface`), so enabling twice never inserts a
//! duplicate rule and disabling without an active kill switch is a no-op.
//! Only a definite answer counts: `iptables -C` exiting with anything but
//! 0 (present) or 1 (absent), for instance 4 without root, is an error.
//!
//! Whether a toggle "worked" is judged only by whether the command failed.
//! Callers log errors and carry on; the kill switch never blocks startup or
//! shutdown.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::GuardConfig;
use crate::error::{Error, Result};
use crate::traits::{CommandOutput, CommandRunner, CommandSpec};

const BLOCK_RULE: [&str; 7] = ["OUTPUT", "-m", "conntrack", "--ctstate", "NEW", "-j", "DROP"];

/// Outcome of a successful toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Kill switch was turned on
    Engaged,
    /// Kill switch was turned off
    Released,
    /// Already in the requested state; nothing was run
    Unchanged,
}

/// Platform firewall backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirewallBackend {
    /// iptables via sudo
    Linux,
    /// netsh interface toggle
    Windows {
        /// Interface to disable
        interface: String,
    },
    /// No known firewall mechanism
    Unsupported {
        /// Detected platform name
        platform: String,
    },
}

impl FirewallBackend {
    /// Select the backend for the current platform
    pub fn detect(config: &GuardConfig) -> Self {
        Self::for_platform(std::env::consts::OS, config)
    }

    /// Select the backend for a named platform
    pub fn for_platform(platform: &str, config: &GuardConfig) -> Self {
        match platform {
            "linux" => FirewallBackend::Linux,
            "windows" => FirewallBackend::Windows {
                interface: config.interface.clone(),
            },
            other => FirewallBackend::Unsupported {
                platform: other.to_string(),
            },
        }
    }

    /// Backend name, for logs
    pub fn name(&self) -> &str {
        match self {
            FirewallBackend::Linux => "Linux",
            FirewallBackend::Windows { .. } => "Windows",
            FirewallBackend::Unsupported { platform } => platform,
        }
    }

    /// Command that turns the kill switch on
    pub fn enable_command(&self) -> Option<CommandSpec> {
        match self {
            FirewallBackend::Linux => Some(iptables("-I")),
            FirewallBackend::Windows { interface } => Some(netsh_set(interface, "admin=disable")),
            FirewallBackend::Unsupported { .. } => None,
        }
    }

    /// Command that turns the kill switch off
    pub fn disable_command(&self) -> Option<CommandSpec> {
        match self {
            FirewallBackend::Linux => Some(iptables("-D")),
            FirewallBackend::Windows { interface } => Some(netsh_set(interface, "admin=enable")),
            FirewallBackend::Unsupported { .. } => None,
        }
    }

    /// Command that reports whether the kill switch is on
    pub fn probe_command(&self) -> Option<CommandSpec> {
        match self {
            FirewallBackend::Linux => Some(iptables("-C")),
            FirewallBackend::Windows { interface } => Some(CommandSpec::new(
                "netsh",
                ["interface", "show", "interface", interface.as_str()],
            )),
            FirewallBackend::Unsupported { .. } => None,
        }
    }

    /// Interpret the probe command's output
    ///
    /// Anything other than a definite answer is an error.
    fn is_engaged(&self, probe: &CommandOutput) -> Result<bool> {
        match self {
            // `iptables -C` exits 0 when the rule exists and 1 when it does not
            FirewallBackend::Linux => match probe.code {
                Some(0) => Ok(true),
                Some(1) => Ok(false),
                _ => Err(state_unknown(probe)),
            },
            FirewallBackend::Windows { .. } => {
                if !probe.success {
                    return Err(state_unknown(probe));
                }
                Ok(probe.stdout.lines().any(|line| {
                    let line = line.to_lowercase();
                    line.contains("administrative state") && line.contains("disabled")
                }))
            }
            FirewallBackend::Unsupported { .. } => Ok(false),
        }
    }
}

fn state_unknown(check: &CommandOutput) -> Error {
    Error::guard(format!(
        "kill switch state unknown: state check exited with {}: {}",
        check
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "a signal".to_string()),
        check.stderr.trim()
    ))
}

fn iptables(action: &str) -> CommandSpec {
    let mut args = vec!["iptables", action];
    args.extend(BLOCK_RULE);
    CommandSpec::new("sudo", args)
}

fn netsh_set(interface: &str, state: &str) -> CommandSpec {
    CommandSpec::new("netsh", ["interface", "set", "interface", interface, state])
}

/// Kill switch controller
pub struct NetworkGuard {
    backend: FirewallBackend,
    runner: Arc<dyn CommandRunner>,
}

impl NetworkGuard {
    /// Create a guard over a backend and command runner
    pub fn new(backend: FirewallBackend, runner: Arc<dyn CommandRunner>) -> Self {
        Self { backend, runner }
    }

    /// The selected backend
    pub fn backend(&self) -> &FirewallBackend {
        &self.backend
    }

    /// Turn the kill switch on
    pub async fn enable(&self) -> Result<GuardOutcome> {
        info!("Activating Kill Switch...");
        let command = self.backend.enable_command().ok_or_else(|| self.unsupported())?;

        if self.is_engaged().await? {
            info!("Kill switch already active ({}), nothing to do.", self.backend.name());
            return Ok(GuardOutcome::Unchanged);
        }

        self.execute(&command).await?;
        info!("Kill switch activated ({}).", self.backend.name());
        Ok(GuardOutcome::Engaged)
    }

    /// Turn the kill switch off
    pub async fn disable(&self) -> Result<GuardOutcome> {
        info!("Disabling Kill Switch...");
        let command = self.backend.disable_command().ok_or_else(|| self.unsupported())?;

        if !self.is_engaged().await? {
            info!("Kill switch not active ({}), nothing to do.", self.backend.name());
            return Ok(GuardOutcome::Unchanged);
        }

        self.execute(&command).await?;
        info!("Kill switch disabled ({}).", self.backend.name());
        Ok(GuardOutcome::Released)
    }

    async fn is_engaged(&self) -> Result<bool> {
        let Some(probe) = self.backend.probe_command() else {
            return Ok(false);
        };

        let output = self
            .runner
            .run(&probe)
            .await
            .map_err(|e| Error::guard(format!("failed to run `{}`: {}", probe, e)))?;

        self.backend.is_engaged(&output)
    }

    async fn execute(&self, command: &CommandSpec) -> Result<()> {
        let output = self
            .runner
            .run(command)
            .await
            .map_err(|e| Error::guard(format!("failed to run `{}`: {}", command, e)))?;

        if !output.success {
            warn!(code = ?output.code, stderr = %output.stderr.trim(), "Firewall command failed");
            return Err(Error::guard(format!(
                "`{}` exited with {}",
                command,
                output
                    .code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "a signal".to_string())
            )));
        }

        Ok(())
    }

    fn unsupported(&self) -> Error {
        Error::guard(format!(
            "kill switch is not supported on {}",
            self.backend.name()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_selection() {
        let config = GuardConfig::default();
        assert_eq!(FirewallBackend::for_platform("linux", &config), FirewallBackend::Linux);
        assert_eq!(
            FirewallBackend::for_platform("windows", &config),
            FirewallBackend::Windows {
                interface: "Wi-Fi".to_string()
            }
        );
        assert!(matches!(
            FirewallBackend::for_platform("macos", &config),
            FirewallBackend::Unsupported { .. }
        ));
    }

    #[test]
    fn test_linux_commands_are_inverse() {
        let backend = FirewallBackend::Linux;
        assert_eq!(
            backend.enable_command().unwrap().to_string(),
            "sudo iptables -I OUTPUT -m conntrack --ctstate NEW -j DROP"
        );
        assert_eq!(
            backend.disable_command().unwrap().to_string(),
            "sudo iptables -D OUTPUT -m conntrack --ctstate NEW -j DROP"
        );
        assert_eq!(
            backend.probe_command().unwrap().to_string(),
            "sudo iptables -C OUTPUT -m conntrack --ctstate NEW -j DROP"
        );
    }

    #[test]
    fn test_windows_probe_parsing() {
        let backend = FirewallBackend::Windows {
            interface: "Wi-Fi".to_string(),
        };
        let disabled = CommandOutput {
            success: true,
            code: Some(0),
            stdout: "Wi-Fi\n   Type: Dedicated\n   Administrative state: Disabled\n   Connect state: Disconnected\n".to_string(),
            stderr: String::new(),
        };
        let enabled = CommandOutput {
            stdout: "Wi-Fi\n   Administrative state: Enabled\n   Connect state: Disconnected\n".to_string(),
            ..disabled.clone()
        };
        assert!(backend.is_engaged(&disabled).unwrap());
        assert!(!backend.is_engaged(&enabled).unwrap());

        let missing = CommandOutput {
            success: false,
            code: Some(1),
            stdout: "There is no such interface registered.\n".to_string(),
            stderr: String::new(),
        };
        assert!(backend.is_engaged(&missing).is_err());
    }

    #[test]
    fn test_unsupported_has_no_commands() {
        let backend = FirewallBackend::Unsupported {
            platform: "freebsd".to_string(),
        };
        assert!(backend.enable_command().is_none());
        assert!(backend.disable_command().is_none());
        assert!(backend.probe_command().is_none());
    }

    #[test]
    fn test_linux_state_check_exit_codes() {
        let backend = FirewallBackend::Linux;
        let check = |code| CommandOutput {
            success: code == Some(0),
            code,
            stdout: String::new(),
            stderr: String::new(),
        };

        assert!(backend.is_engaged(&check(Some(0))).unwrap());
        assert!(!backend.is_engaged(&check(Some(1))).unwrap());
        assert!(backend.is_engaged(&check(Some(4))).is_err());
        assert!(backend.is_engaged(&check(None)).is_err());
    }
}
