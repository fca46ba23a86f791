//! Error types for the porthalt-core library.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for porthalt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during port discovery and process management.
#[derive(Error, Debug)]
pub enum Error {
    /// A system command ran but exited unsuccessfully.
    #[error("`{command}` exited with status {}: {stderr}", describe_code(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A system command could not be started at all (missing tool, exec failure).
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A system command did not finish within the allowed time.
    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// Failed to parse command output.
    #[error("Failed to parse output: {0}")]
    ParseError(String),

    /// A PID that can never name a live process.
    #[error("Invalid PID: {0}")]
    InvalidPid(String),

    /// A port outside 1-65535.
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Platform not supported.
    #[error("Platform not supported: {0}")]
    UnsupportedPlatform(String),
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

impl Error {
    /// Whether repeating the same command has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::CommandFailed { .. } | Error::Spawn { .. } | Error::Timeout { .. } | Error::Io(_)
        )
    }

    /// Text the OS attached to the failure, for classification.
    pub fn diagnostic(&self) -> String {
        match self {
            Error::CommandFailed { stderr, .. } if !stderr.trim().is_empty() => stderr.trim().to_string(),
            Error::Spawn { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }
}
