// # anond - ANON Tor renewal tool
//
// The binary is a thin integration layer:
//
// 1. Parse arguments and read the environment
// 2. Open the log file and install the subscriber
// 3. Wire the Tor control and SOCKS adapters into the core components
// 4. Run the session on a single-threaded runtime
//
// All renewal, retry and kill switch logic lives in `anon-core`.
//
// ## Environment
//
// - `TOR_PASSWORD`: control port password (empty when unset)
// - `ANON_LOG_LEVEL`: trace, debug, info, warn or error (default info)
//
// ## Example
//
// ```bash
// export TOR_PASSWORD=your_password
// anond --mode automatic --interval 600 --check-tor-connection --clear-logs
// ```

mod cli;
mod console;
mod logging;
mod session;

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use crate::cli::{Cli, Settings};
use crate::console::StdinConsole;
use crate::session::Session;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum AnonExitCode {
    /// Session finished normally
    CleanExit = 0,
    /// Argument, configuration or logging setup failure
    ConfigError = 1,
    /// Runtime setup or scheduler failure
    RuntimeError = 2,
}

impl From<AnonExitCode> for ExitCode {
    fn from(code: AnonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn print_banner() {
    println!("==============================");
    println!("   ANON TOOL v{}", env!("CARGO_PKG_VERSION"));
    println!("   Your Privacy Companion");
    println!("==============================");
}

fn main() -> ExitCode {
    print_banner();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here too
            return if e.use_stderr() {
                AnonExitCode::ConfigError.into()
            } else {
                AnonExitCode::CleanExit.into()
            };
        }
    };

    let settings = match Settings::from_env(cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return AnonExitCode::ConfigError.into();
        }
    };

    if let Err(e) = logging::init(&settings.log_file, settings.log_level) {
        eprintln!("Logging setup error: {:#}", e);
        return AnonExitCode::ConfigError.into();
    }

    info!("Starting anond v{}", env!("CARGO_PKG_VERSION"));
    info!(mode = ?settings.config.mode, control = %settings.config.control.address, "Configuration loaded");

    let session = match Session::new(&settings) {
        Ok(session) => session,
        Err(e) => {
            error!("Setup error: {}", e);
            eprintln!("Setup error: {}", e);
            return AnonExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return AnonExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let mut console = StdinConsole::stdio();
        match session.run(&mut console).await {
            Ok(()) => {
                info!("Session finished");
                AnonExitCode::CleanExit
            }
            Err(e) => {
                error!("Session error: {}", e);
                AnonExitCode::RuntimeError
            }
        }
    })
    .into()
}
