//! Kill flow state machine.
//!
//! ```text
//! Idle -> Validating -> Blocked
//!                    -> AwaitingOverride -> AwaitingFinalWarning -> AwaitingConfirm -> Executing -> Succeeded
//!                    -> AwaitingFinalWarning (force pre-acknowledged)             \            \-> Failed
//!                    -> AwaitingConfirm (unprotected)                               \-> Cancelled
//! ```
//!
//! Every gate can end in `Cancelled`. Transitions are pure: [`TerminationState::next`]
//! consumes a state and an event and returns the following state, so each
//! gate can be driven without a UI.

use thiserror::Error;

use super::kill::{KillFailure, KillRequest, KillResult};
use super::protection::{critical_service, ProtectionVerdict};

/// Which gate turned the request down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Declined at the override or final-warning gate of a protected process.
    Protected,
    /// Declined at the standard confirmation.
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TerminationState {
    Idle,
    Validating {
        request: KillRequest,
    },
    Blocked {
        request: KillRequest,
        verdict: ProtectionVerdict,
    },
    AwaitingOverride {
        request: KillRequest,
        verdict: ProtectionVerdict,
    },
    AwaitingFinalWarning {
        request: KillRequest,
        verdict: ProtectionVerdict,
    },
    AwaitingConfirm {
        request: KillRequest,
        verdict: ProtectionVerdict,
    },
    Executing {
        request: KillRequest,
    },
    Cancelled {
        request: KillRequest,
        reason: CancelReason,
    },
    Succeeded {
        request: KillRequest,
        message: String,
    },
    Failed {
        request: KillRequest,
        failure: KillFailure,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TerminationEvent {
    /// A new kill request arrives.
    Submit(KillRequest),
    /// The classifier produced a verdict for the request.
    Classified(ProtectionVerdict),
    /// Answer to the override gate.
    Override { force: bool, acknowledged: bool },
    /// Answer to the final warning.
    FinalWarning { accepted: bool },
    /// Answer to the standard confirmation.
    Confirm { accepted: bool },
    /// The kill command finished.
    Completed(Result<(), KillFailure>),
}

impl TerminationEvent {
    fn name(&self) -> &'static str {
        match self {
            TerminationEvent::Submit(_) => "Submit",
            TerminationEvent::Classified(_) => "Classified",
            TerminationEvent::Override { .. } => "Override",
            TerminationEvent::FinalWarning { .. } => "FinalWarning",
            TerminationEvent::Confirm { .. } => "Confirm",
            TerminationEvent::Completed(_) => "Completed",
        }
    }
}

/// An event that makes no sense in the current state.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot apply {event} while {state}")]
pub struct TransitionError {
    pub state: &'static str,
    pub event: &'static str,
}

/// Which question a prompt asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Protected process: offer force stop plus a risk acknowledgment.
    Override,
    /// Last, more severe warning before a protected process is stopped.
    FinalWarning,
    /// Plain "terminate this process?" confirmation.
    Confirm,
}

/// Text a UI shows at a gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub title: String,
    pub message: String,
    pub details: Vec<String>,
}

impl TerminationState {
    /// Apply `event`, returning the next state.
    pub fn next(self, event: TerminationEvent) -> Result<Self, TransitionError> {
        use TerminationEvent as E;
        use TerminationState as S;

        let state_name = self.name();
        let event_name = event.name();

        let next = match (self, event) {
            (S::Idle, E::Submit(request)) => {
                if request.pid == 0 {
                    S::Failed {
                        failure: KillFailure::InvalidPid(request.pid.to_string()),
                        request,
                    }
                } else {
                    S::Validating { request }
                }
            }

            (S::Validating { request }, E::Classified(verdict)) => {
                if verdict.is_blocked() {
                    S::Blocked { request, verdict }
                } else if verdict.is_protected() {
                    if request.force_stop && request.acknowledge_risk {
                        S::AwaitingFinalWarning { request, verdict }
                    } else {
                        S::AwaitingOverride { request, verdict }
                    }
                } else {
                    S::AwaitingConfirm { request, verdict }
                }
            }

            (S::AwaitingOverride { request, verdict }, E::Override { force, acknowledged }) => {
                if force && acknowledged {
                    S::AwaitingFinalWarning { request, verdict }
                } else {
                    S::Cancelled {
                        request,
                        reason: CancelReason::Protected,
                    }
                }
            }

            (S::AwaitingFinalWarning { request, verdict }, E::FinalWarning { accepted }) => {
                if accepted {
                    S::AwaitingConfirm { request, verdict }
                } else {
                    S::Cancelled {
                        request,
                        reason: CancelReason::Protected,
                    }
                }
            }

            (S::AwaitingConfirm { request, .. }, E::Confirm { accepted }) => {
                if accepted {
                    S::Executing { request }
                } else {
                    S::Cancelled {
                        request,
                        reason: CancelReason::User,
                    }
                }
            }

            (S::Executing { request }, E::Completed(Ok(()))) => S::Succeeded {
                message: format!(
                    "Terminated {} (PID {}) on port {}",
                    request.process_name, request.pid, request.port
                ),
                request,
            },

            (S::Executing { request }, E::Completed(Err(failure))) => {
                S::Failed { request, failure }
            }

            _ => {
                return Err(TransitionError {
                    state: state_name,
                    event: event_name,
                })
            }
        };

        Ok(next)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TerminationState::Idle => "Idle",
            TerminationState::Validating { .. } => "Validating",
            TerminationState::Blocked { .. } => "Blocked",
            TerminationState::AwaitingOverride { .. } => "AwaitingOverride",
            TerminationState::AwaitingFinalWarning { .. } => "AwaitingFinalWarning",
            TerminationState::AwaitingConfirm { .. } => "AwaitingConfirm",
            TerminationState::Executing { .. } => "Executing",
            TerminationState::Cancelled { .. } => "Cancelled",
            TerminationState::Succeeded { .. } => "Succeeded",
            TerminationState::Failed { .. } => "Failed",
        }
    }

    /// No further event is accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TerminationState::Blocked { .. }
                | TerminationState::Cancelled { .. }
                | TerminationState::Succeeded { .. }
                | TerminationState::Failed { .. }
        )
    }

    /// The question to ask at a gate, if this state is one.
    pub fn prompt(&self) -> Option<Prompt> {
        match self {
            TerminationState::AwaitingOverride { request, verdict } => Some(Prompt {
                kind: PromptKind::Override,
                title: format!("{} is protected", request.process_name),
                message: format!(
                    "{} (PID {}) on port {} is protected. Stopping it requires choosing \
                     Force Stop and acknowledging the risk.",
                    request.process_name, request.pid, request.port
                ),
                details: verdict.reasons.clone(),
            }),
            TerminationState::AwaitingFinalWarning { request, verdict } => Some(Prompt {
                kind: PromptKind::FinalWarning,
                title: "Final warning".to_string(),
                message: format!(
                    "Forcing {} to stop may cause system instability, data loss, \
                     or disruption of dependent services.",
                    request.process_name
                ),
                details: verdict.reasons.clone(),
            }),
            TerminationState::AwaitingConfirm { request, verdict } => {
                let mut details = Vec::new();
                if let Some(service) = critical_service(request.port) {
                    details.push(format!(
                        "Port {} is the standard {} port; its clients will lose their connection.",
                        request.port, service
                    ));
                }
                if verdict.is_protected() {
                    details.push("Protection has been overridden for this process.".to_string());
                }
                Some(Prompt {
                    kind: PromptKind::Confirm,
                    title: "Terminate process?".to_string(),
                    message: format!(
                        "Terminate {} (PID {}) listening on port {}?",
                        request.process_name, request.pid, request.port
                    ),
                    details,
                })
            }
            _ => None,
        }
    }

    /// Result for a terminal state.
    pub fn result(&self) -> Option<KillResult> {
        match self {
            TerminationState::Blocked { request, verdict } => {
                Some(KillResult::blocked(&request.process_name, &verdict.reasons))
            }
            TerminationState::Cancelled {
                request,
                reason: CancelReason::Protected,
            } => Some(KillResult::protection_cancelled(&request.process_name)),
            TerminationState::Cancelled {
                reason: CancelReason::User,
                ..
            } => Some(KillResult::cancelled()),
            TerminationState::Succeeded { message, .. } => Some(KillResult::succeeded(message.clone())),
            TerminationState::Failed { failure, .. } => Some(failure.clone().into_result()),
            _ => None,
        }
    }
}
