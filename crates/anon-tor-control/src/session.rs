//! Authenticated control session over any byte stream

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::time::Instant;
use tracing::{debug, info};

use anon_core::config::ControlCredential;
use anon_core::error::{Error, Result};
use anon_core::traits::ControlChannel;

use crate::reply::{Reply, read_reply};

/// GETINFO key reporting whether Tor has a usable circuit
const CIRCUIT_ESTABLISHED: &str = "status/circuit-established";

/// One authenticated Tor control session
///
/// Readiness after `SIGNAL NEWNYM` means two things: the daemon's rate
/// limit on new identities has passed, and it reports an established
/// circuit.
///
/// Every reply must arrive within `reply_timeout`; a daemon that goes
/// silent fails the command instead of hanging the session.
pub struct TorControlSession<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    newnym_cooldown: Duration,
    reply_timeout: Duration,
    last_newnym: Option<Instant>,
    closed: bool,
}

impl<S> TorControlSession<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Authenticate over an already connected stream
    ///
    /// An empty credential sends a bare `AUTHENTICATE`, which a daemon
    /// without password protection accepts.
    pub async fn authenticate(
        stream: S,
        credential: &ControlCredential,
        newnym_cooldown: Duration,
        reply_timeout: Duration,
    ) -> Result<Self> {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut session = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            newnym_cooldown,
            reply_timeout,
            last_newnym: None,
            closed: false,
        };

        let command = if credential.is_empty() {
            "AUTHENTICATE".to_string()
        } else {
            format!("AUTHENTICATE \"{}\"", escape_tor_string(credential.expose()))
        };

        let reply = session
            .send(&command)
            .await
            .map_err(|e| Error::auth(e.to_string()))?;
        if !reply.is_ok() {
            return Err(Error::auth(reply.summary()));
        }

        debug!("Authenticated with Tor control port");
        Ok(session)
    }

    /// Send a command and require a 2xx reply
    async fn command(&mut self, command: &str) -> Result<Reply> {
        let reply = self.send(command).await?;
        if !reply.is_ok() {
            return Err(Error::control(format!(
                "{} rejected: {}",
                command.split_whitespace().next().unwrap_or(command),
                reply.summary()
            )));
        }
        Ok(reply)
    }

    async fn send(&mut self, command: &str) -> Result<Reply> {
        if self.closed {
            return Err(Error::control("session already closed"));
        }

        self.writer
            .write_all(format!("{}\r\n", command).as_bytes())
            .await
            .map_err(|e| Error::control(format!("failed to send command: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::control(format!("failed to flush: {}", e)))?;

        tokio::time::timeout(self.reply_timeout, read_reply(&mut self.reader))
            .await
            .map_err(|_| {
                Error::control(format!(
                    "no reply to {} within {:?}",
                    command.split_whitespace().next().unwrap_or(command),
                    self.reply_timeout
                ))
            })?
    }

    fn cooldown_elapsed(&self) -> bool {
        self.last_newnym
            .is_none_or(|at| at.elapsed() >= self.newnym_cooldown)
    }
}

#[async_trait]
impl<S> ControlChannel for TorControlSession<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn request_renewal(&mut self) -> Result<()> {
        self.command("SIGNAL NEWNYM").await?;
        self.last_newnym = Some(Instant::now());
        info!("Requested new Tor identity");
        Ok(())
    }

    async fn is_renewal_ready(&mut self) -> Result<bool> {
        if !self.cooldown_elapsed() {
            return Ok(false);
        }

        let reply = self
            .command(&format!("GETINFO {}", CIRCUIT_ESTABLISHED))
            .await?;
        Ok(reply.value(CIRCUIT_ESTABLISHED) == Some("1"))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        // The daemon answers QUIT with "250 closing connection"
        let result = self.send("QUIT").await.map(|_| ());
        self.closed = true;
        let _ = self.writer.shutdown().await;
        result
    }
}

/// Quote a string argument for the control protocol
pub fn escape_tor_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
