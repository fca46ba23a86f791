//! Command runner port (interface).

use crate::error::Result;

/// An external command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Exit status the tool uses for "nothing matched" rather than failure.
    pub no_match_status: Option<i32>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            no_match_status: None,
        }
    }

    /// Treat `status` as an empty, successful result.
    pub fn with_no_match_status(mut self, status: i32) -> Self {
        self.no_match_status = Some(status);
        self
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Port for executing system commands.
///
/// Implementations return the command's stdout, or an error for spawn
/// failures, timeouts and unsuccessful exits. They never retry and never
/// interpret the output.
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion.
    fn run(&self, command: &CommandSpec)
        -> impl std::future::Future<Output = Result<String>> + Send;
}
