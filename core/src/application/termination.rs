//! Guarded process termination.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    parse_pid, KillFailure, KillRequest, KillResult, ProtectionClassifier, ProtectionVerdict,
    TerminationEvent, TerminationState, UNKNOWN,
};
use crate::ports::{CommandRunner, ConfirmationPrompter, PlatformStrategy};

/// What the process table says about the PID being killed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Identity {
    /// The PID is running under this name.
    Resolved(String),
    /// The process table has no such PID.
    Missing,
    /// The process table could not be read, or gave no name.
    Unverified,
}

/// Drives a kill request through the termination state machine.
///
/// Protection is always recomputed from the coordinator's own classifier,
/// using the name the process table reports for the PID; nothing the caller
/// sends about protection or identity is trusted. Each gate is answered by
/// the [`ConfirmationPrompter`]. No kill command runs before the last gate
/// is passed.
pub struct TerminationCoordinator<R: CommandRunner> {
    runner: Arc<R>,
    strategy: Arc<dyn PlatformStrategy>,
    classifier: Arc<ProtectionClassifier>,
}

impl<R: CommandRunner> TerminationCoordinator<R> {
    pub fn new(
        runner: Arc<R>,
        strategy: Arc<dyn PlatformStrategy>,
        classifier: Arc<ProtectionClassifier>,
    ) -> Self {
        Self {
            runner,
            strategy,
            classifier,
        }
    }

    /// Run the full kill flow for `request`.
    pub async fn kill<P: ConfirmationPrompter>(&self, request: KillRequest, prompter: &P) -> KillResult {
        let flow = Uuid::new_v4();
        info!(%flow, pid = request.pid, port = request.port, process = %request.process_name, "Kill requested");

        let mut state = TerminationState::Idle;
        let mut event = TerminationEvent::Submit(request);

        loop {
            state = match state.next(event) {
                Ok(next) => next,
                Err(e) => {
                    warn!(%flow, error = %e, "Kill flow rejected an event");
                    return KillResult {
                        success: false,
                        error: Some(e.to_string()),
                        ..Default::default()
                    };
                }
            };
            debug!(%flow, state = state.name(), "Kill flow transition");

            if let Some(result) = state.result() {
                info!(%flow, state = state.name(), success = result.success, "Kill flow finished");
                return result;
            }

            event = match self.answer(&state, prompter).await {
                Some(event) => event,
                None => {
                    warn!(%flow, state = state.name(), "Kill flow stalled");
                    return KillResult {
                        success: false,
                        error: Some(format!("Kill flow stalled in {}", state.name())),
                        ..Default::default()
                    };
                }
            };
        }
    }

    /// Run the kill flow for a PID given as untrusted text.
    ///
    /// Malformed PIDs are rejected before anything else happens.
    pub async fn kill_raw<P: ConfirmationPrompter>(
        &self,
        pid: &str,
        process_name: &str,
        port: u16,
        force_stop: bool,
        acknowledge_risk: bool,
        prompter: &P,
    ) -> KillResult {
        match parse_pid(pid) {
            Ok(pid) => {
                let request = KillRequest::new(pid, process_name, port)
                    .force(force_stop)
                    .acknowledged(acknowledge_risk);
                self.kill(request, prompter).await
            }
            Err(e) => {
                warn!(pid, error = %e, "Rejected kill request");
                KillFailure::classify(0, &e, false).into_result()
            }
        }
    }

    /// Produce the event that moves `state` forward.
    async fn answer<P: ConfirmationPrompter>(
        &self,
        state: &TerminationState,
        prompter: &P,
    ) -> Option<TerminationEvent> {
        let event = match state {
            TerminationState::Validating { request } => {
                TerminationEvent::Classified(self.verify(request).await)
            }
            TerminationState::AwaitingOverride { .. } => {
                let decision = prompter.confirm_override(&state.prompt()?).await;
                TerminationEvent::Override {
                    force: decision.force,
                    acknowledged: decision.acknowledged,
                }
            }
            TerminationState::AwaitingFinalWarning { .. } => TerminationEvent::FinalWarning {
                accepted: prompter.confirm_final_warning(&state.prompt()?).await,
            },
            TerminationState::AwaitingConfirm { .. } => TerminationEvent::Confirm {
                accepted: prompter.confirm_kill(&state.prompt()?).await,
            },
            TerminationState::Executing { request } => {
                TerminationEvent::Completed(self.execute(request.pid).await)
            }
            _ => return None,
        };
        Some(event)
    }

    /// Classify the process actually running as `request.pid`.
    ///
    /// The claimed name is classified too and the stricter verdict wins. A
    /// PID that cannot be identified is treated as protected.
    async fn verify(&self, request: &KillRequest) -> ProtectionVerdict {
        let claimed = request.process_name.trim();
        let claimed_verdict = if claimed.is_empty() || claimed == UNKNOWN {
            None
        } else {
            Some(self.classifier.classify(claimed, request.port))
        };

        match self.identify(request.pid).await {
            Identity::Resolved(actual) => {
                if !claimed.eq_ignore_ascii_case(&actual) {
                    warn!(pid = request.pid, claimed, actual = %actual, "Process name does not match PID");
                }
                let verdict = self.classifier.classify(&actual, request.port);
                match claimed_verdict {
                    Some(claimed_verdict) => verdict.merge(claimed_verdict),
                    None => verdict,
                }
            }
            // Nothing to protect; the kill command reports the missing process.
            Identity::Missing => claimed_verdict
                .unwrap_or_else(|| self.classifier.classify(UNKNOWN, request.port)),
            Identity::Unverified => {
                let mut verdict = claimed_verdict
                    .unwrap_or_else(|| self.classifier.classify(UNKNOWN, request.port));
                verdict.unverified(format!(
                    "The process running as PID {} could not be identified",
                    request.pid
                ));
                verdict
            }
        }
    }

    async fn identify(&self, pid: u32) -> Identity {
        let command = self.strategy.process_command(pid);
        match self.runner.run(&command).await {
            Ok(output) => match self.strategy.parse_process_table(&output).remove(&pid) {
                Some(entry) => match entry.name.filter(|n| !n.trim().is_empty()) {
                    Some(name) => Identity::Resolved(name),
                    None => Identity::Unverified,
                },
                None => Identity::Missing,
            },
            Err(e) => {
                warn!(pid, error = %e, "Could not identify process");
                Identity::Unverified
            }
        }
    }

    async fn execute(&self, pid: u32) -> Result<(), KillFailure> {
        let command = self.strategy.kill_command(pid);
        info!(pid, command = %command, "Terminating process");

        self.runner.run(&command).await.map(|_| ()).map_err(|e| {
            let failure = KillFailure::classify(pid, &e, self.strategy.elevation_hint());
            warn!(pid, error = %e, ?failure, "Kill command failed");
            failure
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{UnixStrategy, WindowsStrategy};
    use crate::domain::Prompt;
    use crate::ports::{OverrideDecision, Platform, PresetPrompter};
    use crate::testing::{Reply, ScriptedRunner};
    use parking_lot::Mutex;

    fn coordinator(runner: ScriptedRunner) -> (Arc<ScriptedRunner>, TerminationCoordinator<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let coordinator = TerminationCoordinator::new(
            runner.clone(),
            Arc::new(UnixStrategy::with_privileges(Platform::Linux, true)),
            Arc::new(ProtectionClassifier::default()),
        );
        (runner, coordinator)
    }

    /// Script `ps -p <pid>` to report `command` running as `pid`.
    fn running(runner: ScriptedRunner, pid: u32, command: &str) -> ScriptedRunner {
        runner.on(
            &format!("ps -p {} -o pid=,pcpu=,rss=,comm=", pid),
            Reply::stdout(&format!("{:>6}   0.3  10240 {}\n", pid, command)),
        )
    }

    /// Records which gates were shown.
    struct RecordingPrompter {
        answers: PresetPrompter,
        seen: Mutex<Vec<Prompt>>,
    }

    impl RecordingPrompter {
        fn new(answers: PresetPrompter) -> Self {
            Self {
                answers,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn titles(&self) -> Vec<String> {
            self.seen.lock().iter().map(|p| p.title.clone()).collect()
        }
    }

    impl ConfirmationPrompter for RecordingPrompter {
        async fn confirm_override(&self, prompt: &Prompt) -> OverrideDecision {
            self.seen.lock().push(prompt.clone());
            self.answers.override_decision
        }

        async fn confirm_final_warning(&self, prompt: &Prompt) -> bool {
            self.seen.lock().push(prompt.clone());
            self.answers.final_warning
        }

        async fn confirm_kill(&self, prompt: &Prompt) -> bool {
            self.seen.lock().push(prompt.clone());
            self.answers.confirm
        }
    }

    #[tokio::test]
    async fn test_invalid_pid_never_runs_a_command() {
        let (runner, coordinator) = coordinator(ScriptedRunner::new());
        let prompter = PresetPrompter::accept_all();

        for raw in ["0", "NaN", "-5", ""] {
            let result = coordinator.kill_raw(raw, "node", 3000, false, false, &prompter).await;
            assert!(!result.success);
            assert!(result.error.unwrap().contains("Invalid PID"), "{raw}");
        }

        let result = coordinator.kill(KillRequest::new(0, "node", 3000), &prompter).await;
        assert!(result.error.unwrap().contains("Invalid PID"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_kill_twice_reports_already_terminated() {
        let (runner, coordinator) = coordinator(
            running(ScriptedRunner::new(), 4242, "node")
                .on("ps -p 4242 -o pid=,pcpu=,rss=,comm=", Reply::fail(1, ""))
                .on("kill -9 4242", Reply::stdout(""))
                .on("kill -9 4242", Reply::fail(1, "kill: (4242) - No such process")),
        );
        let prompter = PresetPrompter::confirm_only();

        let first = coordinator.kill(KillRequest::new(4242, "node", 3000), &prompter).await;
        assert!(first.success);
        assert!(first.message.unwrap().contains("4242"));

        let second = coordinator.kill(KillRequest::new(4242, "node", 3000), &prompter).await;
        assert!(!second.success);
        assert!(second.user_message.unwrap().contains("already terminated"));
        assert_eq!(runner.calls_to("kill"), 2);
    }

    #[tokio::test]
    async fn test_critical_process_is_blocked_even_with_everything_accepted() {
        let (runner, coordinator) = coordinator(running(ScriptedRunner::new(), 1, "/sbin/launchd"));
        let prompter = RecordingPrompter::new(PresetPrompter::accept_all());

        let request = KillRequest::new(1, "launchd", 9999).force(true).acknowledged(true);
        let result = coordinator.kill(request, &prompter).await;

        assert!(!result.success);
        assert_eq!(result.protected, Some(true));
        assert!(prompter.titles().is_empty());
        assert_eq!(runner.calls_to("kill"), 0);
    }

    #[tokio::test]
    async fn test_critical_process_behind_wrong_name_is_blocked() {
        let (runner, coordinator) = coordinator(running(ScriptedRunner::new(), 1, "/sbin/launchd"));
        let prompter = RecordingPrompter::new(PresetPrompter::accept_all());

        for name in [UNKNOWN, "node"] {
            let result = coordinator
                .kill_raw("1", name, 8080, true, true, &prompter)
                .await;
            assert!(!result.success, "{name}");
            assert_eq!(result.protected, Some(true));
        }
        assert!(prompter.titles().is_empty());
        assert_eq!(runner.calls_to("kill"), 0);
    }

    #[tokio::test]
    async fn test_claimed_protected_name_is_not_downgraded_by_lookup() {
        let (runner, coordinator) = coordinator(running(ScriptedRunner::new(), 610, "worker"));
        let result = coordinator
            .kill(KillRequest::new(610, "postgres", 8080), &PresetPrompter::confirm_only())
            .await;
        assert_eq!(result.protected, Some(true));
        assert_eq!(runner.calls_to("kill"), 0);
    }

    #[tokio::test]
    async fn test_unidentified_process_needs_override() {
        // No `ps` reply scripted: the lookup fails.
        let (runner, coordinator) = coordinator(ScriptedRunner::new().on("kill -9 77", Reply::stdout("")));

        let declined = RecordingPrompter::new(PresetPrompter::confirm_only());
        let result = coordinator.kill_raw("77", UNKNOWN, 8080, false, false, &declined).await;
        assert_eq!(result.protected, Some(true));
        assert_eq!(result.user_cancelled, Some(true));
        let seen = declined.seen.lock().clone();
        assert!(seen[0].details.iter().any(|d| d.contains("could not be identified")));
        assert_eq!(runner.calls_to("kill"), 0);

        let accepted = PresetPrompter::accept_all();
        let result = coordinator.kill_raw("77", UNKNOWN, 8080, false, false, &accepted).await;
        assert!(result.success);
        assert_eq!(runner.calls_to("kill"), 1);
    }

    #[tokio::test]
    async fn test_unprotected_kill_asks_once() {
        let (_, coordinator) =
            coordinator(running(ScriptedRunner::new(), 50, "node").on("kill -9 50", Reply::stdout("")));
        let prompter = RecordingPrompter::new(PresetPrompter::confirm_only());

        let result = coordinator.kill(KillRequest::new(50, "node", 8080), &prompter).await;
        assert!(result.success);
        assert_eq!(prompter.titles(), vec!["Terminate process?".to_string()]);
    }

    #[tokio::test]
    async fn test_declined_confirmation_is_plain_cancel() {
        let (runner, coordinator) = coordinator(running(ScriptedRunner::new(), 50, "node"));
        let result = coordinator
            .kill(KillRequest::new(50, "node", 8080), &PresetPrompter::decline_all())
            .await;

        assert_eq!(result, KillResult::cancelled());
        assert_eq!(runner.calls_to("kill"), 0);
    }

    #[tokio::test]
    async fn test_protected_kill_walks_every_gate() {
        let (runner, coordinator) = coordinator(
            running(ScriptedRunner::new(), 610, "postgres").on("kill -9 610", Reply::stdout("")),
        );
        let prompter = RecordingPrompter::new(PresetPrompter::accept_all());

        let result = coordinator.kill(KillRequest::new(610, "postgres", 5432), &prompter).await;
        assert!(result.success);

        let seen = prompter.seen.lock().clone();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].details.iter().any(|d| d.contains("data loss")));
        assert!(seen[1].message.contains("instability"));
        assert!(seen[2].details.iter().any(|d| d.contains("PostgreSQL")));
        assert_eq!(
            runner.calls(),
            vec![
                "ps -p 610 -o pid=,pcpu=,rss=,comm=".to_string(),
                "kill -9 610".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_protected_override_declined() {
        let (runner, coordinator) = coordinator(running(ScriptedRunner::new(), 610, "postgres"));
        let answers = PresetPrompter {
            override_decision: OverrideDecision {
                force: true,
                acknowledged: false,
            },
            final_warning: true,
            confirm: true,
        };

        let result = coordinator.kill(KillRequest::new(610, "postgres", 5432), &answers).await;
        assert!(!result.success);
        assert_eq!(result.protected, Some(true));
        assert_eq!(result.user_cancelled, Some(true));
        assert_eq!(runner.calls_to("kill"), 0);
    }

    #[tokio::test]
    async fn test_preacknowledged_force_still_gets_final_warning() {
        let (_, coordinator) = coordinator(
            running(ScriptedRunner::new(), 610, "postgres").on("kill -9 610", Reply::stdout("")),
        );
        let prompter = RecordingPrompter::new(PresetPrompter {
            override_decision: OverrideDecision::decline(),
            final_warning: true,
            confirm: true,
        });

        let result = coordinator
            .kill_raw("610", "postgres", 5432, true, true, &prompter)
            .await;
        assert!(result.success);
        assert_eq!(prompter.titles()[0], "Final warning");
    }

    #[tokio::test]
    async fn test_caller_cannot_downgrade_protection() {
        // The caller names a harmless process, but the port alone is protected.
        let (runner, coordinator) = coordinator(running(ScriptedRunner::new(), 77, "helper"));
        let result = coordinator
            .kill(KillRequest::new(77, "helper", 22), &PresetPrompter::confirm_only())
            .await;
        assert_eq!(result.protected, Some(true));
        assert_eq!(runner.calls_to("kill"), 0);
    }

    #[tokio::test]
    async fn test_windows_access_denied_needs_elevation() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on(
                    "tasklist /FI PID eq 900 /FO CSV /NH",
                    Reply::stdout("\"node.exe\",\"900\",\"Console\",\"1\",\"45,000 K\"\r\n"),
                )
                .on(
                    "taskkill /F /PID 900",
                    Reply::fail(1, "ERROR: The process with PID 900 could not be terminated.\r\nReason: Access is denied."),
                ),
        );
        let coordinator = TerminationCoordinator::new(
            runner,
            Arc::new(WindowsStrategy::new()),
            Arc::new(ProtectionClassifier::default()),
        );

        let result = coordinator
            .kill(KillRequest::new(900, "node.exe", 3000), &PresetPrompter::confirm_only())
            .await;
        assert!(!result.success);
        assert_eq!(result.needs_elevation, Some(true));
        assert!(!result.user_message.unwrap().contains("Access is denied"));
    }
}
