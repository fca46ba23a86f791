//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with external systems. Implementations live in `adapters`.

mod platform;
mod prompter;
mod runner;

pub use platform::{Platform, PlatformStrategy};
pub use prompter::{ConfirmationPrompter, OverrideDecision, PresetPrompter};
pub use runner::{CommandRunner, CommandSpec};
