//! Kill command - stop the process on a port behind every protection gate.

use anyhow::{anyhow, bail, Result};
use porthalt_core::{
    ConfirmationPrompter, KillRequest, KillResult, OverrideDecision, PortHalt, PresetPrompter,
};

use super::load;
use crate::prompt::TerminalPrompter;

pub struct KillOptions {
    /// PID as typed; validated by the core.
    pub pid: Option<String>,
    pub force: bool,
    pub acknowledge_risk: bool,
    pub yes: bool,
}

impl KillOptions {
    /// Non-interactive answers: `--yes` confirms, protected gates need both
    /// `--force` and `--acknowledge-risk`.
    fn preset(&self) -> PresetPrompter {
        if !self.yes {
            return PresetPrompter::decline_all();
        }
        let overridden = self.force && self.acknowledge_risk;
        PresetPrompter {
            override_decision: OverrideDecision {
                force: self.force,
                acknowledged: self.acknowledge_risk,
            },
            final_warning: overridden,
            confirm: true,
        }
    }
}

pub async fn run(port: u16, options: KillOptions, json: bool) -> Result<()> {
    let (_, halt) = load().await?;

    let interactive = !options.yes && atty::is(atty::Stream::Stdin);
    let result = if interactive {
        kill(&halt, port, &options, &TerminalPrompter).await?
    } else {
        if !options.yes {
            eprintln!("note: not a terminal and --yes not given; declining every prompt");
        }
        kill(&halt, port, &options, &options.preset()).await?
    };

    report(&result, json)?;
    outcome(&result)
}

async fn kill<P: ConfirmationPrompter>(
    halt: &PortHalt,
    port: u16,
    options: &KillOptions,
    prompter: &P,
) -> Result<KillResult> {
    let info = halt.get_port_info(port).await;
    let listener = info.data;

    if let Some(pid) = &options.pid {
        // The core looks up the real name behind the PID before classifying.
        let name = listener
            .filter(|r| r.pid.to_string() == pid.trim())
            .map(|r| r.process_name)
            .unwrap_or_else(|| porthalt_core::domain::UNKNOWN.to_string());
        return Ok(halt
            .kill_process_raw(
                pid,
                &name,
                port,
                options.force,
                options.acknowledge_risk,
                prompter,
            )
            .await);
    }

    let Some(record) = listener else {
        match info.error {
            Some(error) => bail!("lookup of port {} failed: {}", port, error),
            None => bail!("nothing is listening on port {}", port),
        }
    };

    let request = KillRequest::new(record.pid, record.process_name, port)
        .force(options.force)
        .acknowledged(options.acknowledge_risk);
    Ok(halt.kill_process(request, prompter).await)
}

fn report(result: &KillResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else if result.success {
        println!("{}", result.message.as_deref().unwrap_or("Process terminated"));
    }
    Ok(())
}

/// Turn an unsuccessful result into the command's error.
fn outcome(result: &KillResult) -> Result<()> {
    if result.success {
        return Ok(());
    }
    if let (Some(user), Some(error)) = (&result.user_message, &result.error) {
        if user != error {
            tracing::debug!(error = %error, "Kill diagnostic");
        }
    }
    let text = result
        .user_message
        .as_deref()
        .or(result.error.as_deref())
        .unwrap_or("Kill failed");
    Err(anyhow!("{}", text))
}
