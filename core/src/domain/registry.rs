//! Per-scan registry of observed ports.

use std::collections::{HashMap, HashSet};

use super::port::{PortRecord, ProcessStats};
use super::protection::ProtectionClassifier;

/// What the process table knows about one PID.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessEntry {
    /// Process name, when the table reports one.
    pub name: Option<String>,
    pub stats: ProcessStats,
}

/// Deduplicated, sorted set of ports observed in one scan.
///
/// Built from raw parser output, then enriched in place with process
/// statistics and protection verdicts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortRegistry {
    records: Vec<PortRecord>,
}

impl PortRegistry {
    /// Build a registry from parser output.
    ///
    /// Records sharing a `(port, pid)` collapse to the first one seen
    /// (the same socket bound on IPv4 and IPv6 shows up twice).
    pub fn from_records(records: impl IntoIterator<Item = PortRecord>) -> Self {
        let mut seen: HashSet<(u16, u32)> = HashSet::new();
        let mut records: Vec<PortRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.key()))
            .collect();

        records.sort_by_key(|r| r.key());
        Self { records }
    }

    /// Fill in CPU/memory and unresolved names from a process table.
    pub fn enrich_processes(&mut self, table: &HashMap<u32, ProcessEntry>) {
        for record in &mut self.records {
            let Some(entry) = table.get(&record.pid) else {
                continue;
            };
            record.apply_stats(entry.stats);
            if record.has_unknown_name() {
                if let Some(name) = &entry.name {
                    record.process_name = name.clone();
                }
            }
        }
    }

    /// Attach a fresh protection verdict to every record.
    pub fn classify(&mut self, classifier: &ProtectionClassifier) {
        for record in &mut self.records {
            record.protection = classifier.classify(&record.process_name, record.port);
        }
    }

    /// Find the record listening on `port`.
    pub fn find_by_port(&self, port: u16) -> Option<&PortRecord> {
        self.records.iter().find(|r| r.port == port)
    }

    /// All records owned by `pid`.
    pub fn find_by_pid(&self, pid: u32) -> Vec<&PortRecord> {
        self.records.iter().filter(|r| r.pid == pid).collect()
    }

    pub fn records(&self) -> &[PortRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<PortRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
