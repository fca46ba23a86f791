//! Interactive confirmation on the terminal.

use std::io::{self, BufRead, Write};

use porthalt_core::{ConfirmationPrompter, OverrideDecision, Prompt};

/// Asks each kill gate on stdin/stderr.
///
/// Anything but an explicit yes is a no, including EOF and read errors.
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn show(prompt: &Prompt) {
        eprintln!();
        eprintln!("{}", prompt.title);
        eprintln!("{}", prompt.message);
        for detail in &prompt.details {
            eprintln!("  - {}", detail);
        }
    }

    fn ask(question: &str) -> bool {
        eprint!("{} [y/N] ", question);
        let _ = io::stderr().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(_) => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

impl ConfirmationPrompter for TerminalPrompter {
    async fn confirm_override(&self, prompt: &Prompt) -> OverrideDecision {
        Self::show(prompt);
        let force = Self::ask("Force stop this protected process?");
        if !force {
            return OverrideDecision::decline();
        }
        OverrideDecision {
            force,
            acknowledged: Self::ask("I understand the risk. Continue?"),
        }
    }

    async fn confirm_final_warning(&self, prompt: &Prompt) -> bool {
        Self::show(prompt);
        Self::ask("Really stop it?")
    }

    async fn confirm_kill(&self, prompt: &Prompt) -> bool {
        Self::show(prompt);
        Self::ask("Terminate?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yeah"));
    }
}
