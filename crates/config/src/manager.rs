//! Configuration manager - main API for config operations

use crate::app_config::LogLevel;
use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

/// Environment variables that override file values, in application order
pub const ENV_OVERRIDES: [&str; 4] = [
    "HYMNAL_REMOTE_BASE_URL",
    "HYMNAL_REMOTE_API_KEY",
    "HYMNAL_STORAGE_DATABASE_PATH",
    "HYMNAL_APP_LOG_LEVEL",
];

/// Loads, saves and locates the configuration file
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a manager for the platform's config directory
    ///
    /// - Linux: `~/.config/hymnal/` (data in `~/.local/share/hymnal/`)
    /// - macOS: `~/Library/Application Support/app.Hymnal.hymnal/`
    /// - Windows: `%APPDATA%\Hymnal\hymnal\config\`
    pub fn new() -> ConfigResult<Self> {
        let dirs = ProjectDirs::from("app", "Hymnal", "hymnal").ok_or_else(|| {
            ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            }
        })?;

        Ok(Self::with_directories(
            dirs.config_dir().to_path_buf(),
            dirs.data_dir().to_path_buf(),
        ))
    }

    /// Creates a manager that keeps config and data under one directory
    pub fn with_directory(dir: PathBuf) -> ConfigResult<Self> {
        Ok(Self::with_directories(dir.clone(), dir))
    }

    fn with_directories(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            persistence: ConfigPersistence::new(config_dir.join(CONFIG_FILE)),
            config_dir,
            data_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.persistence.path().to_path_buf()
    }

    /// Directory holding the database and downloaded tunes
    ///
    /// `app.data_dir` wins over the platform default.
    pub fn data_dir(&self, config: &Config) -> PathBuf {
        config
            .app
            .data_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.clone())
    }

    /// Loads the configuration; a missing file yields the defaults
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Validates and saves the configuration atomically
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads, modifies and saves the configuration
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Writes a commented default file if none exists
    ///
    /// Returns true when a file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.persistence.generate_default_with_comments()?;
        Ok(true)
    }

    /// Overwrites the config file with defaults
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Returns the validation problems in the current file, if any
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Loads the configuration and applies `HYMNAL_*` environment overrides
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }
}

/// Applies overrides looked up by variable name
///
/// Unparsable values are logged and ignored.
pub fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("HYMNAL_REMOTE_BASE_URL") {
        config.remote.base_url = url;
    }

    if let Some(key) = lookup("HYMNAL_REMOTE_API_KEY") {
        config.remote.api_key = Some(key);
    }

    if let Some(path) = lookup("HYMNAL_STORAGE_DATABASE_PATH") {
        config.storage.database_path = PathBuf::from(path);
    }

    if let Some(level) = lookup("HYMNAL_APP_LOG_LEVEL") {
        match level.parse::<LogLevel>() {
            Ok(level) => config.app.log_level = level,
            Err(e) => log::warn!("Ignoring HYMNAL_APP_LOG_LEVEL: {}", e),
        }
    }

    if let Err(errors) = config.validate() {
        log::warn!(
            "Config validation warnings after env overrides: {:?}",
            errors
        );
    }
}
