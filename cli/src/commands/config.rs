//! Config command - show the active settings.

use anyhow::Result;
use porthalt_core::{ConfigStore, Platform};

pub async fn show(json: bool) -> Result<()> {
    let store = ConfigStore::new()?;
    let settings = store.load().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    println!("Config file:      {}", store.path().display());
    println!("Platform:         {}", Platform::detect()?);
    println!("Retry attempts:   {}", settings.retry_attempts);
    println!("Retry delay:      {} ms", settings.retry_delay_ms);
    println!("Command timeout:  {} s", settings.command_timeout_secs);
    println!("Cache TTL:        {} s", settings.cache_ttl_secs);
    println!("Use fallback:     {}", settings.use_fallback);
    println!("Refresh interval: {} s", settings.refresh_interval);
    println!("Extra protected:  {}", settings.extra_protected.len());
    Ok(())
}
