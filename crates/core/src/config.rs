//! Runtime configuration
//!
//! Loaded from a TOML file; every section and key is optional.
//!
//! ```toml
//! [database]
//! path = "/var/lib/rota/rota.db"
//! busy_timeout_ms = 5000
//!
//! [leases]
//! recompute_ttl_secs = 60
//! save_ttl_secs = 30
//! ```

use std::path::{Path, PathBuf};

use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::models::OperationKind;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error("Could not determine data directory")]
    NoDataDir,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotaConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub leases: LeaseConfig,
}

impl RotaConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate config from TOML content
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RotaConfig = toml::from_str(content)?;
        config.leases.validate()?;
        Ok(config)
    }
}

/// Database location and SQLite tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; defaults to the platform data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// How long a transaction waits for the SQLite file lock
    #[serde(default = "DatabaseConfig::default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: Self::default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    fn default_busy_timeout_ms() -> u64 {
        5000
    }

    pub fn busy_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.busy_timeout_ms)
    }

    /// Configured path, or `rota.db` under the platform data directory
    pub fn resolve_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let dirs = ProjectDirs::from("dev", "onyx", "rota").ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_dir().join("rota.db"))
    }
}

/// Lease TTL policy, one TTL per operation kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseConfig {
    #[serde(default = "LeaseConfig::default_recompute_ttl_secs")]
    pub recompute_ttl_secs: u32,
    #[serde(default = "LeaseConfig::default_save_ttl_secs")]
    pub save_ttl_secs: u32,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            recompute_ttl_secs: Self::default_recompute_ttl_secs(),
            save_ttl_secs: Self::default_save_ttl_secs(),
        }
    }
}

impl LeaseConfig {
    // The engine finishes in seconds; a minute covers the worst case
    fn default_recompute_ttl_secs() -> u32 {
        60
    }

    fn default_save_ttl_secs() -> u32 {
        30
    }

    pub fn ttl_for(&self, operation: OperationKind) -> Duration {
        let secs = match operation {
            OperationKind::Recompute => self.recompute_ttl_secs,
            OperationKind::Save => self.save_ttl_secs,
        };
        Duration::seconds(i64::from(secs))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recompute_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "leases.recompute_ttl_secs",
                reason: "must be positive".to_string(),
            });
        }
        if self.save_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "leases.save_ttl_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
