//! Configuration management.
//!
//! Stores settings in JSON format at `~/.porthalt/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::application::RetryPolicy;
use crate::domain::{ProtectedCategory, ProtectedEntry, ProtectionClassifier};
use crate::error::{Error, Result};

/// Settings stored in JSON format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Attempts for the primary port listing.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause between listing attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Upper bound for any system command, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// How long a scan may be served from cache, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Try the netstat listing when the primary one fails.
    #[serde(default = "default_true")]
    pub use_fallback: bool,

    /// Processes protected in addition to the built-in list.
    #[serde(default)]
    pub extra_protected: Vec<ProtectedEntry>,

    /// Port scan refresh interval in seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
}

fn default_retry_attempts() -> u32 {
    RetryPolicy::DEFAULT_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    RetryPolicy::DEFAULT_DELAY.as_millis() as u64
}

fn default_command_timeout_secs() -> u64 {
    10
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            command_timeout_secs: default_command_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            use_fallback: true,
            extra_protected: Vec::new(),
            refresh_interval: default_refresh_interval(),
        }
    }
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    /// Command timeout; never zero.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// A classifier over the built-in list plus [`extra_protected`](Self::extra_protected).
    pub fn classifier(&self) -> ProtectionClassifier {
        let classifier = ProtectionClassifier::default();
        for entry in &self.extra_protected {
            classifier.add_protected(&entry.name, entry.category);
        }
        classifier
    }
}

/// Configuration store for reading and writing [`Settings`].
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `~/.porthalt/config.json`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        let config_path = home.join(".porthalt").join("config.json");
        Ok(Self { config_path })
    }

    /// Create a config store with a custom path.
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.config_path
    }

    /// Load settings from disk.
    ///
    /// Returns defaults if the file doesn't exist.
    pub async fn load(&self) -> Result<Settings> {
        let content = match fs::read_to_string(&self.config_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => return Err(Error::Config(format!("Failed to read config: {}", e))),
        };

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save settings to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            fs::create_dir_all(config_dir)
                .await
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }

    /// Add a process to the extra protected list.
    ///
    /// Returns `false` if it was already listed.
    pub async fn add_protected(&self, name: &str, category: ProtectedCategory) -> Result<bool> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(Error::Config("Process name must not be empty".to_string()));
        }

        let mut settings = self.load().await?;
        if settings.extra_protected.iter().any(|e| e.name == name) {
            return Ok(false);
        }
        settings.extra_protected.push(ProtectedEntry { name, category });
        self.save(&settings).await?;
        Ok(true)
    }

    /// Remove a process from the extra protected list.
    ///
    /// Returns `false` if it was not listed.
    pub async fn remove_protected(&self, name: &str) -> Result<bool> {
        let name = name.trim().to_lowercase();
        let mut settings = self.load().await?;
        let before = settings.extra_protected.len();
        settings.extra_protected.retain(|e| e.name != name);
        if settings.extra_protected.len() == before {
            return Ok(false);
        }
        self.save(&settings).await?;
        Ok(true)
    }

    /// Set the refresh interval in seconds.
    pub async fn set_refresh_interval(&self, interval: u64) -> Result<()> {
        let mut settings = self.load().await?;
        settings.refresh_interval = interval;
        self.save(&settings).await
    }
}
