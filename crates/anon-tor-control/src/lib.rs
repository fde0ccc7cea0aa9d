// # Tor Control Adapter
//
// Implements the core `ControlPort` trait over the Tor control protocol.
//
// ## Protocol
//
// Every renewal opens a fresh TCP connection to the control port:
//
// ```text
// AUTHENTICATE "<password>"                 -> 250 OK | 515 Authentication failed
// SIGNAL NEWNYM                             -> 250 OK
// GETINFO status/circuit-established        -> 250-status/circuit-established=1
//                                              250 OK
// QUIT                                      -> 250 closing connection
// ```
//
// Tor rate-limits NEWNYM (about once every ten seconds), so a session only
// reports readiness once that window has passed since its own signal.
//
// Connecting and every reply are bounded by the configured command timeout.

mod reply;
mod session;

pub use reply::Reply;
pub use session::{TorControlSession, escape_tor_string};

use anon_core::config::{ControlConfig, ControlCredential};
use anon_core::error::{Error, Result};
use anon_core::traits::{ControlChannel, ControlPort};

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Tor control port reachable over TCP
pub struct TorControlPort {
    address: String,
    credential: ControlCredential,
    newnym_cooldown: Duration,
    command_timeout: Duration,
}

impl TorControlPort {
    /// Create a control port from configuration
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            address: config.address.clone(),
            credential: config.credential.clone(),
            newnym_cooldown: config.newnym_cooldown(),
            command_timeout: config.command_timeout(),
        }
    }

    /// Open a session with a concrete type, for callers that need it
    pub async fn connect(&self) -> Result<TorControlSession<TcpStream>> {
        debug!(address = %self.address, "Connecting to Tor control port");

        let stream = tokio::time::timeout(self.command_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                Error::auth(format!(
                    "failed to connect to control port {}: timed out after {:?}",
                    self.address, self.command_timeout
                ))
            })?
            .map_err(|e| {
                Error::auth(format!(
                    "failed to connect to control port {}: {}",
                    self.address, e
                ))
            })?;

        TorControlSession::authenticate(
            stream,
            &self.credential,
            self.newnym_cooldown,
            self.command_timeout,
        )
        .await
    }
}

#[async_trait]
impl ControlPort for TorControlPort {
    async fn open(&self) -> Result<Box<dyn ControlChannel>> {
        Ok(Box::new(self.connect().await?))
    }

    fn endpoint(&self) -> String {
        self.address.clone()
    }
}
