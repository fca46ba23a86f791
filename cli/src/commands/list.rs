//! List command - show all listening ports.

use anyhow::{bail, Result};

use super::{format_bytes, load, protection_label, truncate};

pub async fn run(port_filter: Option<u16>, name_filter: Option<String>, json: bool) -> Result<()> {
    let (_, halt) = load().await?;
    let response = halt.scan().await;

    if !response.success {
        bail!(
            "port scan failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }

    let mut ports = response.data;

    // Apply filters
    if let Some(p) = port_filter {
        ports.retain(|port| port.port == p);
    }
    if let Some(ref name) = name_filter {
        let name_lower = name.to_lowercase();
        ports.retain(|port| port.process_name.to_lowercase().contains(&name_lower));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    if let Some(message) = &response.limited_message {
        eprintln!("note: {}", message);
    }

    if ports.is_empty() {
        println!("No listening ports found.");
        return Ok(());
    }

    // Table header
    println!(
        "{:<6} {:<8} {:<20} {:<12} {:<15} {:>6} {:>10} PROTECTION",
        "PORT", "PID", "PROCESS", "USER", "ADDRESS", "CPU%", "MEM"
    );
    println!("{}", "-".repeat(94));

    for port in &ports {
        println!(
            "{:<6} {:<8} {:<20} {:<12} {:<15} {:>6.1} {:>10} {}",
            port.port,
            port.pid,
            truncate(&port.process_name, 20),
            truncate(&port.user, 12),
            truncate(&port.address, 15),
            port.cpu_percent,
            format_bytes(port.memory_bytes),
            protection_label(port)
        );
    }

    println!("\nTotal: {} ports", ports.len());
    Ok(())
}
