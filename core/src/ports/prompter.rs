//! Confirmation prompter port (interface).

use crate::domain::Prompt;

/// Answer to the override gate of a protected process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverrideDecision {
    /// The user chose "Force Stop".
    pub force: bool,
    /// The user ticked the risk acknowledgment.
    pub acknowledged: bool,
}

impl OverrideDecision {
    pub fn accept() -> Self {
        Self {
            force: true,
            acknowledged: true,
        }
    }

    pub fn decline() -> Self {
        Self::default()
    }
}

/// Port for asking the user to confirm each gate of a kill flow.
///
/// The UI layer implements this; the core only decides which questions to
/// ask and what the answers mean.
pub trait ConfirmationPrompter: Send + Sync {
    /// Protected process: force stop and acknowledge the risk?
    fn confirm_override(
        &self,
        prompt: &Prompt,
    ) -> impl std::future::Future<Output = OverrideDecision> + Send;

    /// Last warning before stopping a protected process.
    fn confirm_final_warning(&self, prompt: &Prompt)
        -> impl std::future::Future<Output = bool> + Send;

    /// Standard "terminate this process?" confirmation.
    fn confirm_kill(&self, prompt: &Prompt) -> impl std::future::Future<Output = bool> + Send;
}

/// Prompter that answers every gate from fixed values.
///
/// Used for non-interactive callers (`--yes` on the command line) and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PresetPrompter {
    pub override_decision: OverrideDecision,
    pub final_warning: bool,
    pub confirm: bool,
}

impl PresetPrompter {
    /// Confirm plain kills, decline anything protected.
    pub fn confirm_only() -> Self {
        Self {
            confirm: true,
            ..Default::default()
        }
    }

    /// Accept every gate.
    pub fn accept_all() -> Self {
        Self {
            override_decision: OverrideDecision::accept(),
            final_warning: true,
            confirm: true,
        }
    }

    /// Decline every gate.
    pub fn decline_all() -> Self {
        Self::default()
    }
}

impl ConfirmationPrompter for PresetPrompter {
    async fn confirm_override(&self, _prompt: &Prompt) -> OverrideDecision {
        self.override_decision
    }

    async fn confirm_final_warning(&self, _prompt: &Prompt) -> bool {
        self.final_warning
    }

    async fn confirm_kill(&self, _prompt: &Prompt) -> bool {
        self.confirm
    }
}
