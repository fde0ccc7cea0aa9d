//! Terminal console over line-oriented input
//!
//! Blocking reads happen on a dedicated OS thread that forwards lines over
//! a channel. A read still pending at exit is never joined, so the runtime
//! shuts down as soon as the session ends.

use anon_core::traits::Console;
use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

const LINE_BUFFER: usize = 16;

/// Lines read from the terminal
pub type InputLines = ReceiverStream<io::Result<String>>;

/// Console reading answers from stdin and writing to stdout
pub type StdinConsole = LineConsole<InputLines, io::Stdout>;

impl StdinConsole {
    /// Console attached to the process terminal
    pub fn stdio() -> Self {
        let lines = spawn_line_reader(io::BufReader::new(io::stdin()));
        LineConsole::new(lines, io::stdout())
    }
}

/// Read `reader` line by line on its own thread
///
/// The thread ends at EOF, after a read error, or once the stream is dropped
/// and the next line has been read.
pub fn spawn_line_reader<R>(reader: R) -> InputLines
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);

    let spawned = std::thread::Builder::new()
        .name("anon-stdin".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        });

    // The sender went down with the closure, so the stream reads as EOF
    if let Err(e) = spawned {
        warn!("Failed to start input reader, treating input as closed: {}", e);
    }

    ReceiverStream::new(rx)
}

/// Console over any stream of input lines and a writer
pub struct LineConsole<S, W> {
    lines: S,
    out: W,
}

impl<S, W> LineConsole<S, W>
where
    S: Stream<Item = io::Result<String>> + Unpin + Send,
    W: Write + Send,
{
    pub fn new(lines: S, out: W) -> Self {
        Self { lines, out }
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }
}

#[async_trait]
impl<S, W> Console for LineConsole<S, W>
where
    S: Stream<Item = io::Result<String>> + Unpin + Send,
    W: Write + Send,
{
    async fn prompt(&mut self, question: &str) -> Option<String> {
        let _ = write!(self.out, "{}", question);
        let _ = self.out.flush();

        match self.lines.next().await? {
            Ok(line) => Some(line),
            Err(e) => {
                warn!("Failed to read input: {}", e);
                None
            }
        }
    }

    fn show(&mut self, line: &str) {
        let _ = writeln!(self.out, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::time::{Duration, Instant};

    /// Input that never produces a byte, like an idle terminal
    struct IdleTerminal;

    impl Read for IdleTerminal {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            std::thread::sleep(Duration::from_secs(3600));
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_prompt_reads_lines_until_eof() {
        let lines = spawn_line_reader(Cursor::new(b"x\ny\r\n".to_vec()));
        let mut console = LineConsole::new(lines, Vec::new());

        assert_eq!(console.prompt("? ").await.as_deref(), Some("x"));
        assert_eq!(console.prompt("? ").await.as_deref(), Some("y"));
        assert_eq!(console.prompt("? ").await, None);

        assert_eq!(console.output().as_slice(), b"? ? ? ");
    }

    #[tokio::test]
    async fn test_show_writes_a_line() {
        let mut console = LineConsole::new(tokio_stream::empty(), Vec::new());
        console.show("Current Tor Exit IP: unknown");
        assert_eq!(
            String::from_utf8_lossy(console.output()),
            "Current Tor Exit IP: unknown\n"
        );
    }

    #[test]
    fn test_pending_prompt_does_not_hold_up_runtime_shutdown() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let started = Instant::now();
        let answered = rt.block_on(async {
            let lines = spawn_line_reader(BufReader::new(IdleTerminal));
            let mut console = LineConsole::new(lines, Vec::new());
            tokio::time::timeout(Duration::from_millis(50), console.prompt("? ")).await
        });
        assert!(answered.is_err(), "idle input must not answer");

        drop(rt);
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "runtime shutdown waited on the reader: {:?}",
            started.elapsed()
        );
    }
}
