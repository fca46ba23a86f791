//! Test doubles shared by the service tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::ports::{CommandRunner, CommandSpec};

/// Canned outcome for one command invocation.
#[derive(Debug, Clone)]
pub enum Reply {
    Stdout(String),
    Fail { code: i32, stderr: String },
    Timeout,
}

impl Reply {
    pub fn stdout(text: &str) -> Self {
        Reply::Stdout(text.to_string())
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Reply::Fail {
            code,
            stderr: stderr.to_string(),
        }
    }

    fn into_result(self, command: &CommandSpec) -> Result<String> {
        match self {
            Reply::Stdout(text) => Ok(text),
            Reply::Fail { code, .. } if Some(code) == command.no_match_status => Ok(String::new()),
            Reply::Fail { code, stderr } => Err(Error::CommandFailed {
                command: command.to_string(),
                code: Some(code),
                stderr,
            }),
            Reply::Timeout => Err(Error::Timeout {
                command: command.to_string(),
                timeout: Duration::from_secs(10),
            }),
        }
    }
}

/// Runner answering from a script keyed by the full command line.
///
/// Replies for one command are consumed in order; the last one repeats.
/// Unscripted commands fail as if the tool were missing. Every call is
/// recorded.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reply` for `command` (e.g. `"kill -9 42"`).
    pub fn on(self, command: &str, reply: Reply) -> Self {
        self.script
            .lock()
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, program: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(program))
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> Result<String> {
        let line = command.to_string();
        self.calls.lock().push(line.clone());

        let reply = {
            let mut script = self.script.lock();
            script.get_mut(&line).and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
        };

        match reply {
            Some(reply) => reply.into_result(command),
            None => Err(Error::Spawn {
                command: line,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not scripted"),
            }),
        }
    }
}
