//! Hymnal configuration
//!
//! A versioned TOML file with one table per [`ConfigSection`]:
//!
//! ```toml
//! version = 2
//!
//! [app]
//! log_level = "info"
//! recent_limit = 20
//!
//! [storage]
//! database_path = "hymnal.db"
//! tune_dir_name = "tunes"
//!
//! [remote]
//! base_url = "https://api.hymnal.app/v1"
//! timeout_secs = 30
//! ```
//!
//! Missing keys take their defaults, files in an older format are migrated
//! on load, and saves are atomic.
//!
//! ```rust,no_run
//! use hymnal_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("config directory");
//! let config = manager.load_with_env_overrides().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//! println!("Backend: {}", config.remote.base_url);
//! ```

mod error;
mod manager;
mod migration;
mod persistence;
mod validation;

mod app_config;
mod remote_config;
mod storage_config;

pub use app_config::{AppConfig, LogLevel};
pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::{apply_overrides, ConfigManager, ENV_OVERRIDES};
pub use remote_config::RemoteConfig;
pub use storage_config::StorageConfig;
pub use validation::{ConfigSection, Validator};

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 2;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every section, returning all problems found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.app.validate() {
            errors.append(&mut e);
        }
        if let Err(mut e) = self.storage.validate() {
            errors.append(&mut e);
        }
        if let Err(mut e) = self.remote.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges another config into this one, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.storage.merge(other.storage);
        self.remote.merge(other.remote);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            storage: StorageConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}
