//! Port scanning application service.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{diff, PortChanges, PortRecord, PortRegistry, ProcessStats, ProtectionClassifier};
use crate::error::{Error, Result};
use crate::ports::{CommandRunner, PlatformStrategy};

use super::retry::RetryPolicy;

const FALLBACK_NOTICE: &str =
    "Primary port listing failed; showing netstat results. Process names and owners may be missing.";

/// Outcome of a full port scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub success: bool,
    pub data: Vec<PortRecord>,
    /// The listing may not include every process.
    #[serde(default)]
    pub limited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limited_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub used_fallback: bool,
}

impl ScanResponse {
    fn ok(data: Vec<PortRecord>, limited_message: Option<String>) -> Self {
        Self {
            success: true,
            data,
            limited: limited_message.is_some(),
            limited_message,
            ..Default::default()
        }
    }

    fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

/// Outcome of a single-port lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfoResponse {
    pub success: bool,
    pub data: Option<PortRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct CachedScan {
    taken_at: Instant,
    response: ScanResponse,
}

/// Application service for port discovery.
///
/// Each scan runs the platform's listing command, parses it into a fresh
/// [`PortRegistry`], enriches it from the process table and attaches
/// protection verdicts. The last successful scan is kept for
/// [`scan_ports_cached`](Self::scan_ports_cached) and for change tracking.
pub struct PortService<R: CommandRunner> {
    runner: Arc<R>,
    strategy: Arc<dyn PlatformStrategy>,
    classifier: Arc<ProtectionClassifier>,
    retry: RetryPolicy,
    use_fallback: bool,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedScan>>,
    previous: RwLock<Option<Vec<PortRecord>>>,
}

impl<R: CommandRunner> PortService<R> {
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

    pub fn new(
        runner: Arc<R>,
        strategy: Arc<dyn PlatformStrategy>,
        classifier: Arc<ProtectionClassifier>,
    ) -> Self {
        Self {
            runner,
            strategy,
            classifier,
            retry: RetryPolicy::default(),
            use_fallback: true,
            cache_ttl: Self::DEFAULT_CACHE_TTL,
            cache: RwLock::new(None),
            previous: RwLock::new(None),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether [`scan`](Self::scan) may use the fallback listing.
    pub fn with_fallback(mut self, use_fallback: bool) -> Self {
        self.use_fallback = use_fallback;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Run the primary listing once.
    pub async fn scan_ports(&self) -> ScanResponse {
        match self.list_primary().await {
            Ok(records) => self.finish(records, self.strategy.visibility_notice()).await,
            Err(e) => {
                warn!(error = %e, "Port scan failed");
                ScanResponse::failed(e)
            }
        }
    }

    /// Run the primary listing up to `max_attempts` times.
    pub async fn scan_with_retry(&self, max_attempts: u32) -> ScanResponse {
        let policy = self.retry.with_attempts(max_attempts);
        match policy.retry(|attempt| self.list_attempt(attempt)).await {
            Ok(records) => self.finish(records, self.strategy.visibility_notice()).await,
            Err(e) => {
                warn!(attempts = e.attempts, error = %e.last_error, "Port scan failed after retries");
                ScanResponse::failed(e)
            }
        }
    }

    /// Run the primary listing once, then the fallback listing if it fails.
    pub async fn scan_with_fallback(&self) -> ScanResponse {
        match self.list_primary().await {
            Ok(records) => self.finish(records, self.strategy.visibility_notice()).await,
            Err(primary) => self.fallback(primary).await,
        }
    }

    /// Primary listing under the configured retry policy, then the fallback
    /// listing when allowed.
    pub async fn scan(&self) -> ScanResponse {
        match self.retry.retry(|attempt| self.list_attempt(attempt)).await {
            Ok(records) => self.finish(records, self.strategy.visibility_notice()).await,
            Err(e) if self.use_fallback => self.fallback(e.last_error).await,
            Err(e) => {
                warn!(attempts = e.attempts, error = %e.last_error, "Port scan failed");
                ScanResponse::failed(e)
            }
        }
    }

    /// Serve the last successful scan while it is younger than the TTL.
    pub async fn scan_ports_cached(&self) -> ScanResponse {
        if let Some(cached) = self.cache.read().as_ref() {
            if cached.taken_at.elapsed() < self.cache_ttl {
                debug!("Serving cached scan");
                return cached.response.clone();
            }
        }
        self.scan_ports().await
    }

    /// Drop the cached scan.
    pub fn invalidate_cache(&self) {
        *self.cache.write() = None;
    }

    /// Scan and report what changed since the previous refresh.
    ///
    /// The first refresh reports every port as added. A failed scan reports
    /// no changes and keeps the previous snapshot.
    pub async fn refresh(&self) -> (ScanResponse, PortChanges) {
        let response = self.scan().await;
        if !response.success {
            return (response, PortChanges::default());
        }

        let changes = {
            let mut previous = self.previous.write();
            let changes = diff(&response.data, previous.as_deref().unwrap_or_default());
            *previous = Some(response.data.clone());
            changes
        };

        if !changes.is_empty() {
            info!(
                added = changes.added.len(),
                removed = changes.removed.len(),
                modified = changes.modified.len(),
                "Ports changed"
            );
        }
        (response, changes)
    }

    /// Look up the process listening on `port`.
    pub async fn get_port_info(&self, port: u16) -> PortInfoResponse {
        if port == 0 {
            return PortInfoResponse {
                success: false,
                data: None,
                error: Some(Error::InvalidPort(port.to_string()).to_string()),
            };
        }

        let command = self.strategy.port_lookup_command(port);
        let output = match self.runner.run(&command).await {
            Ok(output) => output,
            Err(e) => {
                warn!(port, error = %e, "Port lookup failed");
                return PortInfoResponse {
                    success: false,
                    data: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let registry = PortRegistry::from_records(self.strategy.parse_port_lookup(&output, port));
        let Some(record) = registry.find_by_port(port).cloned() else {
            debug!(port, "Nothing listening");
            return PortInfoResponse {
                success: true,
                data: None,
                error: None,
            };
        };

        let mut registry = PortRegistry::from_records([record]);
        let pid = registry.records()[0].pid;
        match self.process_table(self.strategy.process_command(pid)).await {
            Ok(table) => registry.enrich_processes(&table),
            Err(e) => debug!(pid, error = %e, "Process lookup failed"),
        }
        registry.classify(&self.classifier);

        PortInfoResponse {
            success: true,
            data: registry.into_records().into_iter().next(),
            error: None,
        }
    }

    /// CPU and memory of `pid`; zeros when unavailable.
    pub async fn get_process_stats(&self, pid: u32) -> ProcessStats {
        if pid == 0 {
            return ProcessStats::default();
        }
        match self.process_table(self.strategy.process_command(pid)).await {
            Ok(table) => table.get(&pid).map(|e| e.stats).unwrap_or_default(),
            Err(e) => {
                debug!(pid, error = %e, "Process stats unavailable");
                ProcessStats::default()
            }
        }
    }

    async fn list_primary(&self) -> Result<Vec<PortRecord>> {
        let output = self.runner.run(&self.strategy.list_command()).await?;
        Ok(self.strategy.parse_listing(&output))
    }

    async fn list_attempt(&self, attempt: u32) -> Result<Vec<PortRecord>> {
        debug!(attempt, "Listing ports");
        self.list_primary().await
    }

    async fn fallback(&self, primary: Error) -> ScanResponse {
        let Some(command) = self.strategy.fallback_list_command() else {
            warn!(error = %primary, "Port scan failed and no fallback exists");
            return ScanResponse::failed(primary);
        };

        warn!(error = %primary, fallback = %command, "Primary listing failed, using fallback");
        match self.runner.run(&command).await {
            Ok(output) => {
                let records = self.strategy.parse_fallback_listing(&output);
                let mut response = self.finish(records, Some(FALLBACK_NOTICE.to_string())).await;
                response.used_fallback = true;
                response
            }
            Err(e) => {
                warn!(error = %e, "Fallback listing failed");
                ScanResponse::failed(format!("{}; fallback: {}", primary, e))
            }
        }
    }

    async fn process_table(
        &self,
        command: crate::ports::CommandSpec,
    ) -> Result<std::collections::HashMap<u32, crate::domain::ProcessEntry>> {
        let output = self.runner.run(&command).await?;
        Ok(self.strategy.parse_process_table(&output))
    }

    /// Build, enrich and classify a registry, then remember it.
    async fn finish(&self, records: Vec<PortRecord>, limited: Option<String>) -> ScanResponse {
        let mut registry = PortRegistry::from_records(records);

        if !registry.is_empty() {
            match self.process_table(self.strategy.process_table_command()).await {
                Ok(table) => registry.enrich_processes(&table),
                Err(e) => warn!(error = %e, "Process table unavailable, usage left at zero"),
            }
        }
        registry.classify(&self.classifier);
        debug!(count = registry.len(), "Scan complete");

        let response = ScanResponse::ok(registry.into_records(), limited);
        *self.cache.write() = Some(CachedScan {
            taken_at: Instant::now(),
            response: response.clone(),
        });
        response
    }
}
