//! Subcommand implementations.

pub mod config;
pub mod info;
pub mod kill;
pub mod list;
pub mod protected;
pub mod stats;
pub mod watch;

use anyhow::{Context, Result};
use porthalt_core::{ConfigStore, PortHalt, PortRecord, ProtectionLevel, Settings};

/// Load settings and build the facade from them.
pub async fn load() -> Result<(Settings, PortHalt)> {
    let store = ConfigStore::new()?;
    let settings = store
        .load()
        .await
        .with_context(|| format!("loading {}", store.path().display()))?;
    let halt = PortHalt::from_settings(&settings)?;
    Ok((settings, halt))
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max - 1).collect();
        format!("{}…", kept)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn protection_label(record: &PortRecord) -> &'static str {
    match record.protection.level {
        ProtectionLevel::None => "-",
        ProtectionLevel::Warning => "protected",
        ProtectionLevel::Critical => "CRITICAL",
    }
}
