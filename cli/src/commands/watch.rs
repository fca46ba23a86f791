//! Watch command - rescan periodically and print what changed.

use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use porthalt_core::PortChanges;

use super::{format_bytes, load};

pub async fn run(interval: Option<u64>, count: Option<u64>, json: bool) -> Result<()> {
    let (settings, halt) = load().await?;
    let interval = Duration::from_secs(interval.unwrap_or(settings.refresh_interval).max(1));

    let mut scans = 0u64;
    loop {
        let (response, changes) = halt.refresh().await;
        let now = Local::now();

        if !response.success {
            eprintln!(
                "[{}] scan failed: {}",
                now.format("%H:%M:%S"),
                response.error.as_deref().unwrap_or("unknown error")
            );
        } else if json {
            let event = serde_json::json!({
                "timestamp": now.to_rfc3339(),
                "ports": response.data.len(),
                "changes": changes,
            });
            println!("{}", serde_json::to_string(&event)?);
        } else if scans == 0 {
            println!(
                "[{}] watching {} listening ports (every {}s)",
                now.format("%H:%M:%S"),
                response.data.len(),
                interval.as_secs()
            );
        } else {
            print_changes(&now.format("%H:%M:%S").to_string(), &changes);
        }

        scans += 1;
        if count.is_some_and(|limit| scans >= limit) {
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
}

fn print_changes(time: &str, changes: &PortChanges) {
    for record in &changes.added {
        println!(
            "[{}] + :{} {} (PID {})",
            time, record.port, record.process_name, record.pid
        );
    }
    for record in &changes.removed {
        println!(
            "[{}] - :{} {} (PID {})",
            time, record.port, record.process_name, record.pid
        );
    }
    for modified in &changes.modified {
        let record = &modified.current;
        println!(
            "[{}] ~ :{} {} cpu {:+.1}% mem {} -> {}",
            time,
            record.port,
            record.process_name,
            modified.cpu_delta(),
            format_bytes(modified.previous.memory_bytes),
            format_bytes(record.memory_bytes)
        );
    }
}
