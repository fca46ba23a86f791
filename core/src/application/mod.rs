//! Application layer - Use case services.
//!
//! This module contains application services that orchestrate
//! domain logic and adapter interactions.
//!
//! Services are designed to be thin orchestrators that:
//! - Accept domain types as inputs
//! - Use ports (traits) for external dependencies
//! - Return domain types as outputs

mod port_service;
mod retry;
mod termination;

pub use port_service::{PortInfoResponse, PortService, ScanResponse};
pub use retry::{RetryError, RetryPolicy};
pub use termination::TerminationCoordinator;
