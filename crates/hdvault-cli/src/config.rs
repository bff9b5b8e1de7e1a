//! CLI configuration management.
//!
//! Handles logging, lookahead and metadata storage settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Log filter directive (EnvFilter syntax)
    pub log_level: String,
    /// Emit logs as JSON
    pub json_logs: bool,
    /// Receive addresses derived past the last used index
    pub gap_limit: u32,
    /// Directory backing the metadata transport
    pub metadata_store_dir: PathBuf,
    /// Refresh interval of cached chain responses, in seconds
    pub cache_refresh_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: false,
            gap_limit: hdvault_core::DEFAULT_GAP_LIMIT,
            metadata_store_dir: home_dir().join(".hdvault").join("metadata"),
            cache_refresh_secs: 60,
        }
    }
}

impl CliConfig {
    /// Load configuration from `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: CliConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get configuration file path.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".hdvault").join("config.toml"))
    }

    pub fn cache_refresh(&self) -> Duration {
        Duration::from_secs(self.cache_refresh_secs)
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}
