//! Client settings for searchbench
//!
//! Config file location: ~/.config/searchbench/config.toml
//!
//! Example config:
//! ```toml
//! [backend]
//! kind = "infinity"  # memory, infinity
//! address = "http://127.0.0.1:23820"
//! database = "default_db"
//!
//! [express]
//! concurrency = 8
//! duration_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub express: ExpressSettings,
}

/// Which backend to benchmark and where to find it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Backend kind: memory, infinity
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Base URL of a remote backend
    #[serde(default = "default_address")]
    pub address: String,

    /// Database holding the benchmark tables
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            address: default_address(),
            database: default_database(),
        }
    }
}

fn default_kind() -> String {
    "memory".to_string()
}

fn default_address() -> String {
    "http://127.0.0.1:23820".to_string()
}

fn default_database() -> String {
    "default_db".to_string()
}

/// Express (throughput) mode defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressSettings {
    /// Number of concurrent query workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// How long to keep replaying, in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

impl Default for ExpressSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            duration_secs: default_duration_secs(),
        }
    }
}

fn default_concurrency() -> usize {
    8
}

fn default_duration_secs() -> u64 {
    30
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("searchbench")
            .join("config.toml")
    }

    /// Load settings from file, returning defaults if not found
    pub fn load() -> Self {
        let path = Self::config_path();
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(settings) => {
                        tracing::debug!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse settings file: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read settings file: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Write an example settings file, overwriting when `force` is set
    ///
    /// Returns false if a file already exists and was left alone.
    pub fn write_example(force: bool) -> anyhow::Result<bool> {
        let path = Self::config_path();
        if path.exists() && !force {
            return Ok(false);
        }

        let example = r#"# searchbench settings
# Location: ~/.config/searchbench/config.toml

[backend]
# Backend: memory (in-process reference), infinity (HTTP API)
kind = "memory"

# Base URL of the remote backend
address = "http://127.0.0.1:23820"

# Database holding benchmark tables
database = "default_db"

[express]
# Concurrent query workers in express mode
concurrency = 8

# Express run length in seconds
duration_secs = 30
"#;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, example)?;
        Ok(true)
    }
}
