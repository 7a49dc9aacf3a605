//! Configuration for elohim-things

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ThingsError;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("elohim-things")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database file
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Database file name inside `storage_dir`
    #[serde(default = "default_db_file")]
    pub db_file: String,

    /// How long a writer waits on a locked database before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum entity name length in characters
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,

    /// Page size used when a caller does not ask for one
    #[serde(default = "default_page_limit")]
    pub default_page_limit: u64,
}

fn default_db_file() -> String {
    "things.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_max_name_len() -> usize {
    1024
}

fn default_page_limit() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            db_file: default_db_file(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_name_len: default_max_name_len(),
            default_page_limit: default_page_limit(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ThingsError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ThingsError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ThingsError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ThingsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> PathBuf {
        self.storage_dir.join(&self.db_file)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}
