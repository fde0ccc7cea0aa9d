//! Core traits for the renewal tool
//!
//! These are the seams between the renewal logic and the outside world.
//!
//! - [`ControlPort`] / [`ControlChannel`]: Authenticated control sessions
//! - [`ProxyTransport`]: One GET through the SOCKS proxy
//! - [`CommandRunner`]: Opaque external command invocation
//! - [`Console`]: Operator prompts and user-visible output
//! - [`Renewal`]: One complete renewal cycle, as seen by the scheduler

pub mod command;
pub mod console;
pub mod control_port;
pub mod renewal;
pub mod transport;

pub use command::{CommandOutput, CommandRunner, CommandSpec};
pub use console::Console;
pub use control_port::{ControlChannel, ControlPort};
pub use renewal::Renewal;
pub use transport::{ProxyRequest, ProxyResponse, ProxyTransport};
