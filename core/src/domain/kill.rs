//! Kill requests, results and failure classification.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A request to terminate the process owning a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillRequest {
    pub pid: u32,
    pub process_name: String,
    pub port: u16,
    /// Caller already chose to override protection.
    #[serde(default)]
    pub force_stop: bool,
    /// Caller already acknowledged the risk of overriding protection.
    #[serde(default)]
    pub acknowledge_risk: bool,
}

impl KillRequest {
    pub fn new(pid: u32, process_name: impl Into<String>, port: u16) -> Self {
        Self {
            pid,
            process_name: process_name.into(),
            port,
            force_stop: false,
            acknowledge_risk: false,
        }
    }

    /// Mark the request as a forced stop.
    pub fn force(mut self, force_stop: bool) -> Self {
        self.force_stop = force_stop;
        self
    }

    /// Mark the risk of a forced stop as acknowledged.
    pub fn acknowledged(mut self, acknowledge_risk: bool) -> Self {
        self.acknowledge_risk = acknowledge_risk;
        self
    }
}

/// Parse a PID from untrusted input.
///
/// Rejects empty, non-numeric, fractional, `NaN`, zero and negative values.
pub fn parse_pid(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    match trimmed.parse::<u32>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(Error::InvalidPid(if trimmed.is_empty() {
            "<empty>".to_string()
        } else {
            trimmed.to_string()
        })),
    }
}

/// Outcome of a kill attempt, as handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Diagnostic text; may contain raw OS output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Text intended for the end user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_elevation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_cancelled: Option<bool>,
}

impl KillResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Plain decline at the standard confirmation.
    pub fn cancelled() -> Self {
        Self {
            success: false,
            error: Some("User cancelled".to_string()),
            ..Default::default()
        }
    }

    /// Decline at one of the protection gates.
    pub fn protection_cancelled(process_name: &str) -> Self {
        Self {
            success: false,
            error: Some("User cancelled".to_string()),
            user_message: Some(format!("{} was left running.", process_name)),
            protected: Some(true),
            user_cancelled: Some(true),
            ..Default::default()
        }
    }

    /// Refusal to touch a critical system process.
    pub fn blocked(process_name: &str, reasons: &[String]) -> Self {
        Self {
            success: false,
            error: Some(format!("{} is a protected system process", process_name)),
            user_message: Some(format!(
                "{} cannot be terminated: {}",
                process_name,
                reasons.join("; ")
            )),
            protected: Some(true),
            ..Default::default()
        }
    }
}

/// Classified reason a kill did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillFailure {
    /// The PID could never name a process.
    InvalidPid(String),
    /// The process was already gone.
    AlreadyTerminated { pid: u32 },
    /// The OS refused the signal.
    PermissionDenied {
        pid: u32,
        diagnostic: String,
        needs_elevation: bool,
    },
    /// The kill command hung.
    TimedOut { pid: u32, diagnostic: String },
    /// The kill command itself could not be started.
    ToolUnavailable { diagnostic: String },
    /// Anything else.
    Other { pid: u32, diagnostic: String },
}

impl KillFailure {
    /// Classify a failed kill command.
    ///
    /// `elevation_hint` is set on platforms where the UI can offer to re-run
    /// the operation as administrator.
    pub fn classify(pid: u32, error: &Error, elevation_hint: bool) -> Self {
        let diagnostic = error.diagnostic();
        match error {
            Error::InvalidPid(raw) => return KillFailure::InvalidPid(raw.clone()),
            Error::Timeout { .. } => return KillFailure::TimedOut { pid, diagnostic },
            Error::Spawn { .. } => return KillFailure::ToolUnavailable { diagnostic },
            _ => {}
        }

        let lower = diagnostic.to_lowercase();
        const GONE: &[&str] = &["no such process", "not found", "esrch", "enoent"];
        const DENIED: &[&str] = &[
            "not permitted",
            "permission denied",
            "access is denied",
            "access denied",
            "eacces",
            "eperm",
        ];

        if GONE.iter().any(|p| lower.contains(p)) {
            KillFailure::AlreadyTerminated { pid }
        } else if DENIED.iter().any(|p| lower.contains(p)) {
            KillFailure::PermissionDenied {
                pid,
                diagnostic,
                needs_elevation: elevation_hint,
            }
        } else {
            KillFailure::Other { pid, diagnostic }
        }
    }

    /// Convert into the user-facing result.
    pub fn into_result(self) -> KillResult {
        let (error, user_message, needs_elevation) = match self {
            KillFailure::InvalidPid(raw) => (
                format!("Invalid PID: {}", raw),
                "Invalid PID. Provide a positive process ID.".to_string(),
                None,
            ),
            KillFailure::AlreadyTerminated { pid } => (
                format!("Process {} already terminated", pid),
                format!("Process {} has already terminated. Nothing left to stop.", pid),
                None,
            ),
            KillFailure::PermissionDenied {
                diagnostic,
                needs_elevation: true,
                ..
            } => (
                diagnostic,
                "Access denied. Run as Administrator to stop this process.".to_string(),
                Some(true),
            ),
            KillFailure::PermissionDenied { diagnostic, .. } => (
                diagnostic,
                "Permission denied. Try again with elevated privileges (sudo).".to_string(),
                None,
            ),
            KillFailure::TimedOut { diagnostic, .. } => (
                diagnostic,
                "The kill command did not finish in time. The process may still be running."
                    .to_string(),
                None,
            ),
            KillFailure::ToolUnavailable { diagnostic } => (
                diagnostic,
                "The system kill command is unavailable.".to_string(),
                None,
            ),
            KillFailure::Other { pid, diagnostic } => (
                diagnostic,
                format!("Failed to terminate process {}.", pid),
                None,
            ),
        };

        KillResult {
            success: false,
            error: Some(error),
            user_message: Some(user_message),
            needs_elevation,
            ..Default::default()
        }
    }
}
