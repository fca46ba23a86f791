//! System command runner using `tokio::process`.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ports::{CommandRunner, CommandSpec};

/// Runs commands on the host, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &CommandSpec) -> Result<String> {
        let line = command.to_string();
        debug!(command = %line, "Running command");

        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        // Dropping the future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                warn!(command = %line, error = %source, "Failed to spawn command");
                return Err(Error::Spawn {
                    command: line,
                    source,
                });
            }
            Err(_) => {
                warn!(command = %line, timeout_secs = self.timeout.as_secs(), "Command timed out");
                return Err(Error::Timeout {
                    command: line,
                    timeout: self.timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let code = output.status.code();

        if output.status.success() {
            return Ok(stdout);
        }
        if code.is_some() && code == command.no_match_status {
            debug!(command = %line, ?code, "Command matched nothing");
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(command = %line, ?code, stderr = %stderr.trim(), "Command failed");
        Err(Error::CommandFailed {
            command: line,
            code,
            stderr,
        })
    }
}
