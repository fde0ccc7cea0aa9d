//! Error types for the renewal tool
//!
//! Every variant is caught at the boundary of the operation that raised it
//! and turned into a logged soft failure. Only configuration errors are
//! allowed to stop the process.

use thiserror::Error;

/// Result type alias for renewal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Control endpoint unreachable or credential rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Control protocol failure after authentication
    #[error("Control port error: {0}")]
    Control(String),

    /// Readiness wait passed its deadline
    #[error("Timed out after {0:?} waiting for a new circuit")]
    TimedOut(std::time::Duration),

    /// Exit-IP probe failed
    #[error("Exit IP verification failed: {0}")]
    Verification(String),

    /// Non-HTTPS URL rejected before any network call
    #[error("Refusing insecure URL: {0}")]
    InsecureScheme(String),

    /// Proxied request failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// All fetch attempts failed
    #[error("Max retries ({attempts}) reached for {url}")]
    RetriesExhausted {
        /// Target URL
        url: String,
        /// Number of attempts made
        attempts: usize,
    },

    /// Firewall toggle failed or is unsupported
    #[error("Kill switch error: {0}")]
    Guard(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a control protocol error
    pub fn control(msg: impl Into<String>) -> Self {
        Self::Control(msg.into())
    }

    /// Create a verification error
    pub fn verification(msg: impl Into<String>) -> Self {
        Self::Verification(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a kill switch error
    pub fn guard(msg: impl Into<String>) -> Self {
        Self::Guard(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the failure happened while authenticating
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RetriesExhausted {
            url: "https://example.com".to_string(),
            attempts: 2,
        };
        assert_eq!(
            err.to_string(),
            "Max retries (2) reached for https://example.com"
        );
        assert!(Error::auth("bad password").is_auth());
        assert!(!Error::control("552").is_auth());
    }
}
