//! PortHalt Core Library
//!
//! Cross-platform library for finding the processes that listen on local
//! ports and stopping them safely. Provides functionality to:
//! - Scan listening ports and enrich them with process usage
//! - Classify processes against a protection policy
//! - Terminate processes through a confirmation state machine
//! - Track changes between scans
//! - Manage user configuration
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure business logic and data models
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: External system implementations
//! - `application`: Use case services
//!
//! # Platform Support
//! - macOS / Linux: `lsof`, with `netstat` as fallback, and `ps`
//! - Windows: `netstat -ano` and `tasklist`

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod error;

#[cfg(test)]
mod testing;

use std::sync::Arc;

// Re-export domain types (primary API)
pub use domain::{
    KillRequest, KillResult, ModifiedPort, PortChanges, PortRecord, ProcessStats, ProtectedCategory,
    ProtectedEntry, ProtectedProcessSet, ProtectionClassifier, ProtectionLevel, ProtectionVerdict,
    Prompt, PromptKind, Protocol,
};

// Re-export other commonly used types
pub use adapters::SystemCommandRunner;
pub use application::{PortInfoResponse, PortService, RetryPolicy, ScanResponse, TerminationCoordinator};
pub use config::{ConfigStore, Settings};
pub use error::{Error, Result};
pub use ports::{
    CommandRunner, CommandSpec, ConfirmationPrompter, OverrideDecision, Platform, PlatformStrategy,
    PresetPrompter,
};

/// Entry point bundling discovery and termination for one platform.
///
/// The platform strategy and the protection classifier are chosen once and
/// shared by both services.
pub struct PortHalt<R: CommandRunner = SystemCommandRunner> {
    platform: Platform,
    classifier: Arc<ProtectionClassifier>,
    ports: PortService<R>,
    terminator: TerminationCoordinator<R>,
}

impl PortHalt<SystemCommandRunner> {
    /// Build for the host platform with default settings.
    pub fn new() -> Result<Self> {
        Self::from_settings(&Settings::default())
    }

    /// Build for the host platform from user settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let platform = Platform::detect()?;
        let runner = SystemCommandRunner::with_timeout(settings.command_timeout());

        Ok(Self::with_parts(
            Arc::new(runner),
            adapters::strategy_for(platform),
            Arc::new(settings.classifier()),
        )
        .with_retry_policy(settings.retry_policy())
        .with_cache_ttl(settings.cache_ttl())
        .with_fallback(settings.use_fallback))
    }
}

impl<R: CommandRunner> PortHalt<R> {
    /// Assemble from explicit collaborators.
    pub fn with_parts(
        runner: Arc<R>,
        strategy: Box<dyn PlatformStrategy>,
        classifier: Arc<ProtectionClassifier>,
    ) -> Self {
        let strategy: Arc<dyn PlatformStrategy> = Arc::from(strategy);
        Self {
            platform: strategy.platform(),
            ports: PortService::new(runner.clone(), strategy.clone(), classifier.clone()),
            terminator: TerminationCoordinator::new(runner, strategy, classifier.clone()),
            classifier,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.ports = self.ports.with_retry_policy(policy);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.ports = self.ports.with_cache_ttl(ttl);
        self
    }

    pub fn with_fallback(mut self, use_fallback: bool) -> Self {
        self.ports = self.ports.with_fallback(use_fallback);
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The classifier used for scans and kills; mutate it to change the
    /// protected set at runtime.
    pub fn classifier(&self) -> &ProtectionClassifier {
        &self.classifier
    }

    /// Scan all listening ports once.
    pub async fn scan_ports(&self) -> ScanResponse {
        self.ports.scan_ports().await
    }

    /// Scan using the configured retry policy and fallback.
    pub async fn scan(&self) -> ScanResponse {
        self.ports.scan().await
    }

    /// Scan, serving a recent result from cache.
    pub async fn scan_ports_cached(&self) -> ScanResponse {
        self.ports.scan_ports_cached().await
    }

    pub async fn scan_with_retry(&self, max_attempts: u32) -> ScanResponse {
        self.ports.scan_with_retry(max_attempts).await
    }

    pub async fn scan_with_fallback(&self) -> ScanResponse {
        self.ports.scan_with_fallback().await
    }

    /// Scan and report changes since the last refresh.
    pub async fn refresh(&self) -> (ScanResponse, PortChanges) {
        self.ports.refresh().await
    }

    pub async fn get_port_info(&self, port: u16) -> PortInfoResponse {
        self.ports.get_port_info(port).await
    }

    /// Usage of `pid`; zeros when unavailable.
    pub async fn get_process_stats(&self, pid: u32) -> ProcessStats {
        self.ports.get_process_stats(pid).await
    }

    /// Terminate the process behind `request`, asking `prompter` at every gate.
    pub async fn kill_process<P: ConfirmationPrompter>(
        &self,
        request: KillRequest,
        prompter: &P,
    ) -> KillResult {
        let result = self.terminator.kill(request, prompter).await;
        if result.success {
            self.ports.invalidate_cache();
        }
        result
    }

    /// [`kill_process`](Self::kill_process) for a PID given as text.
    pub async fn kill_process_raw<P: ConfirmationPrompter>(
        &self,
        pid: &str,
        process_name: &str,
        port: u16,
        force_stop: bool,
        acknowledge_risk: bool,
        prompter: &P,
    ) -> KillResult {
        let result = self
            .terminator
            .kill_raw(pid, process_name, port, force_stop, acknowledge_risk, prompter)
            .await;
        if result.success {
            self.ports.invalidate_cache();
        }
        result
    }
}
