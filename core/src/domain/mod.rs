//! Domain layer - Pure business logic and data models.
//!
//! This module contains domain entities that represent core business concepts.
//! These types have no I/O dependencies and can be tested in isolation.

pub mod changes;
mod kill;
mod port;
mod protection;
mod registry;
pub mod termination;

// Re-export all domain types
pub use changes::{diff, ModifiedPort, PortChanges};
pub use kill::{parse_pid, KillFailure, KillRequest, KillResult};
pub use port::{PortRecord, ProcessStats, Protocol, UNKNOWN};
pub use protection::{
    critical_service, is_critical_port, name_matches, ProtectedCategory, ProtectedEntry,
    ProtectedProcessSet, ProtectionClassifier, ProtectionLevel, ProtectionVerdict,
};
pub use registry::{PortRegistry, ProcessEntry};
pub use termination::{
    CancelReason, Prompt, PromptKind, TerminationEvent, TerminationState, TransitionError,
};
