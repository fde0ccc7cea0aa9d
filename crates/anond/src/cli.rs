//! Command-line arguments and the settings built from them

use anon_core::config::{AnonConfig, ControlCredential, Mode};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

/// Environment variable holding the control port password
pub const PASSWORD_ENV: &str = "TOR_PASSWORD";

/// Environment variable selecting the log level
pub const LOG_LEVEL_ENV: &str = "ANON_LOG_LEVEL";

/// ANON - renew and verify your Tor exit identity
#[derive(Debug, Parser)]
#[command(name = "anond")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Renewal mode
    #[arg(short, long, value_enum)]
    pub mode: ModeArg,

    /// Seconds between renewals in automatic mode
    #[arg(short, long, default_value_t = 300)]
    pub interval: u64,

    /// Truncate the log file when the session ends
    #[arg(long)]
    pub clear_logs: bool,

    /// Block outbound connections before renewing
    #[arg(long)]
    pub activate_kill_switch: bool,

    /// Remove the outbound block when the session ends
    #[arg(long)]
    pub disable_kill_switch: bool,

    /// Check Tor connectivity before entering the mode
    #[arg(long)]
    pub check_tor_connection: bool,

    /// Tor control port address
    #[arg(long, default_value = "127.0.0.1:9051")]
    pub control_addr: String,

    /// SOCKS proxy URL
    #[arg(long, default_value = "socks5h://127.0.0.1:9050")]
    pub socks_proxy: String,

    /// Append-only log file
    #[arg(long, default_value = "tor_tool.log")]
    pub log_file: PathBuf,

    /// Seconds to wait for a new circuit after each renewal
    #[arg(long, default_value_t = 120)]
    pub ready_timeout: u64,

    /// Stop automatic mode after this many renewals
    #[arg(long)]
    pub max_cycles: Option<usize>,

    /// Network interface toggled by the Windows kill switch
    #[arg(long, default_value = "Wi-Fi")]
    pub interface: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Ask before every renewal
    Manual,
    /// Renew on a fixed interval
    Automatic,
}

/// Everything the session needs, validated
#[derive(Debug)]
pub struct Settings {
    pub config: AnonConfig,
    pub log_file: PathBuf,
    pub log_level: Level,
    pub clear_logs: bool,
    pub activate_kill_switch: bool,
    pub disable_kill_switch: bool,
    pub check_tor_connection: bool,
}

impl Settings {
    /// Build settings from arguments and the process environment
    pub fn from_env(cli: Cli) -> Result<Self> {
        Self::build(
            cli,
            std::env::var(PASSWORD_ENV).ok(),
            std::env::var(LOG_LEVEL_ENV).ok(),
        )
    }

    /// Build settings from arguments and explicit environment values
    pub fn build(cli: Cli, password: Option<String>, log_level: Option<String>) -> Result<Self> {
        let mode = match cli.mode {
            ModeArg::Manual => Mode::Manual,
            ModeArg::Automatic => Mode::Automatic {
                interval_secs: cli.interval,
                max_cycles: cli.max_cycles,
            },
        };

        let mut config = AnonConfig {
            mode,
            ..Default::default()
        };
        config.control.address = cli.control_addr;
        config.control.credential = ControlCredential::new(password.unwrap_or_default());
        config.control.ready_timeout_secs = cli.ready_timeout;
        config.proxy.socks_url = cli.socks_proxy;
        config.guard.interface = cli.interface;

        config.validate()?;

        let log_level = parse_level(log_level.as_deref().unwrap_or("info"))?;

        Ok(Self {
            config,
            log_file: cli.log_file,
            log_level,
            clear_logs: cli.clear_logs,
            activate_kill_switch: cli.activate_kill_switch,
            disable_kill_switch: cli.disable_kill_switch,
            check_tor_connection: cli.check_tor_connection,
        })
    }
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "{} '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            LOG_LEVEL_ENV,
            level
        ),
    }
}
