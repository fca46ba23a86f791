//! Stats command - CPU and memory of one process.

use anyhow::Result;

use super::{format_bytes, load};

pub async fn run(pid: u32, json: bool) -> Result<()> {
    let (_, halt) = load().await?;
    let stats = halt.get_process_stats(pid).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "PID {}: {:.1}% CPU, {}",
            pid,
            stats.cpu_percent,
            format_bytes(stats.memory_bytes)
        );
    }
    Ok(())
}
