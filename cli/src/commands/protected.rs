//! Protected command - inspect and edit the protected process list.

use anyhow::{anyhow, Result};
use porthalt_core::{ConfigStore, ProtectedCategory, Settings};

pub async fn list(json: bool) -> Result<()> {
    let settings = ConfigStore::new()?.load().await?;
    let protected = settings.classifier().protected_set();

    if json {
        println!("{}", serde_json::to_string_pretty(protected.entries())?);
        return Ok(());
    }

    println!("{:<20} {:<16} SOURCE", "NAME", "CATEGORY");
    println!("{}", "-".repeat(46));
    for entry in protected.entries() {
        let source = if is_user_entry(&settings, &entry.name) {
            "config"
        } else {
            "built-in"
        };
        println!("{:<20} {:<16} {}", entry.name, entry.category, source);
    }
    println!("\nTotal: {} processes", protected.len());
    Ok(())
}

fn is_user_entry(settings: &Settings, name: &str) -> bool {
    settings.extra_protected.iter().any(|e| e.name == name)
}

pub async fn add(name: &str, category: &str) -> Result<()> {
    let category: ProtectedCategory = category.parse().map_err(|e: String| anyhow!(e))?;
    let store = ConfigStore::new()?;

    if store.add_protected(name, category).await? {
        println!("Protected {} ({})", name, category);
    } else {
        println!("{} is already protected", name);
    }
    Ok(())
}

pub async fn remove(name: &str) -> Result<()> {
    let store = ConfigStore::new()?;

    if store.remove_protected(name).await? {
        println!("{} is no longer protected", name);
    } else {
        println!("{} is not in the configured list (built-in entries cannot be removed)", name);
    }
    Ok(())
}
