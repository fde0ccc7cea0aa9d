//! Operator-facing input and output

use async_trait::async_trait;

/// Where prompts are asked and user-visible results are shown
///
/// Log output goes through `tracing`; the console carries only what the
/// operator is meant to read.
#[async_trait]
pub trait Console: Send {
    /// Ask a question and wait for one line of input
    ///
    /// Returns `None` once input is closed.
    async fn prompt(&mut self, question: &str) -> Option<String>;

    /// Show a line to the operator
    fn show(&mut self, line: &str);
}
