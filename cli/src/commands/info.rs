//! Info command - show the process behind one port.

use anyhow::{bail, Result};

use super::{format_bytes, load};

pub async fn run(port: u16, json: bool) -> Result<()> {
    let (_, halt) = load().await?;
    let response = halt.get_port_info(port).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if !response.success {
        bail!(
            "lookup failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }

    let Some(record) = response.data else {
        println!("Nothing is listening on port {}.", port);
        return Ok(());
    };

    println!("Port:       {} ({})", record.port, record.protocol);
    println!("Address:    {}", record.address);
    println!("Process:    {} (PID {})", record.process_name, record.pid);
    println!("User:       {}", record.user);
    println!("CPU:        {:.1}%", record.cpu_percent);
    println!("Memory:     {}", format_bytes(record.memory_bytes));
    println!("Protection: {}", record.protection.level);
    for reason in &record.protection.reasons {
        println!("  - {}", reason);
    }
    Ok(())
}
