//! CLI argument definitions for the valet application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::{Path, PathBuf};

/// Valet — executes assistant-proposed actions under per-user trust policy.
#[derive(Parser, Debug)]
#[command(name = "valet", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file.
    #[arg(long = "db")]
    pub db: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// API bearer token (otherwise read from or written to the token file).
    #[arg(long = "token")]
    pub token: Option<String>,

    /// Print the effective API token and exit.
    #[arg(long = "print-token")]
    pub print_token: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > VALET_CONFIG env var > platform default (~/.valet/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("VALET_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the SQLite database path.
    ///
    /// Priority: --db flag > VALET_DB env var > <data_dir>/valet.db.
    pub fn resolve_db_path(&self, data_dir: &Path) -> PathBuf {
        if let Some(ref p) = self.db {
            return p.clone();
        }
        if let Ok(p) = std::env::var("VALET_DB") {
            return PathBuf::from(p);
        }
        data_dir.join("valet.db")
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > VALET_PORT env var > config file value > 4810.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("VALET_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        4810
    }

    /// Resolve the log level used when RUST_LOG is not set.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        match self.log_level {
            Some(ref level) => level.clone(),
            None => config_level.to_string(),
        }
    }

    /// Resolve the API bearer token, if one was given explicitly.
    ///
    /// Priority: --token flag > VALET_TOKEN env var. `None` means "use the
    /// persisted token file" (generated on first run).
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(ref token) = self.token {
            return Some(token.clone());
        }
        match std::env::var("VALET_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
            _ => None,
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".valet").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".valet").join("config.toml");
    }
    PathBuf::from("config.toml")
}

/// Expand ~ to home directory in a path string.
pub fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}
