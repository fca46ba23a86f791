//! Differences between two port snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::port::{PortRecord, ProcessStats};

/// A port present in both snapshots whose process usage changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedPort {
    /// The record as observed now.
    pub current: PortRecord,
    /// CPU/memory from the previous snapshot.
    pub previous: ProcessStats,
}

impl ModifiedPort {
    /// CPU change in percentage points (positive means busier).
    pub fn cpu_delta(&self) -> f64 {
        self.current.cpu_percent - self.previous.cpu_percent
    }

    /// Memory change in bytes (positive means grew).
    pub fn memory_delta(&self) -> i64 {
        self.current.memory_bytes as i64 - self.previous.memory_bytes as i64
    }
}

/// Result of comparing two snapshots, grouped by kind of change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortChanges {
    pub added: Vec<PortRecord>,
    pub removed: Vec<PortRecord>,
    pub modified: Vec<ModifiedPort>,
}

impl PortChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Compare `current` against `previous`, keyed by `(port, pid)`.
pub fn diff(current: &[PortRecord], previous: &[PortRecord]) -> PortChanges {
    let previous_by_key: HashMap<(u16, u32), &PortRecord> =
        previous.iter().map(|r| (r.key(), r)).collect();
    let current_by_key: HashMap<(u16, u32), &PortRecord> =
        current.iter().map(|r| (r.key(), r)).collect();

    let mut changes = PortChanges::default();

    for record in current {
        match previous_by_key.get(&record.key()) {
            None => changes.added.push(record.clone()),
            Some(old) if old.stats() != record.stats() => changes.modified.push(ModifiedPort {
                current: record.clone(),
                previous: old.stats(),
            }),
            Some(_) => {}
        }
    }

    changes.removed = previous
        .iter()
        .filter(|r| !current_by_key.contains_key(&r.key()))
        .cloned()
        .collect();

    changes
}
