use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, ValetError};

/// Top-level configuration for the valet application.
///
/// Loaded from `~/.valet/config.toml` by default. Each section corresponds
/// to a subsystem or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValetConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl ValetConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ValetConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ValetError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database and API token file.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.valet/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// REST API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// TCP port the server binds on localhost. 0 means "use the built-in
    /// default" so the CLI can layer its own precedence on top.
    pub port: u16,
    /// Maximum request body size in kilobytes.
    pub max_body_kb: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 0,
            max_body_kb: 256,
        }
    }
}

/// Notification dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Token-bucket cap on dispatches per minute, per dispatcher.
    pub max_per_minute: u32,
    /// Bounded capacity of the outbound email queue.
    pub email_queue_capacity: usize,
    /// How often the expired-notification purge runs, in hours.
    pub purge_interval_hours: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_per_minute: 30,
            email_queue_capacity: 256,
            purge_interval_hours: 6,
        }
    }
}
