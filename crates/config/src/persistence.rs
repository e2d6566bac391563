//! File system persistence for configuration
//!
//! Writes go to a temporary file in the same directory and are renamed into
//! place, so a crash never leaves a half-written config. The previous file is
//! kept as `config.toml.backup`.

use crate::error::join_errors;
use crate::{Config, ConfigError, ConfigResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const DEFAULT_HEADER: &str = "\
# Hymnal configuration
#
# Every key is optional; removing one restores its default.
# HYMNAL_REMOTE_BASE_URL, HYMNAL_REMOTE_API_KEY, HYMNAL_STORAGE_DATABASE_PATH
# and HYMNAL_APP_LOG_LEVEL override the values below at startup.

";

/// Reads and writes one config file
pub struct ConfigPersistence {
    config_path: PathBuf,
}

impl ConfigPersistence {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    ///
    /// A missing file yields the defaults. An empty or unparsable file is an
    /// error. Files in an older format are migrated and written back.
    pub fn load(&self) -> ConfigResult<Config> {
        if !self.config_path.exists() {
            log::info!(
                "Config file not found at {}, using defaults",
                self.config_path.display()
            );
            return Ok(Config::default());
        }

        let contents =
            fs::read_to_string(&self.config_path).map_err(|e| ConfigError::ReadError {
                path: self.config_path.clone(),
                source: e,
            })?;

        if contents.trim().is_empty() {
            return Err(ConfigError::ReadError {
                path: self.config_path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Config file is empty or contains only whitespace",
                ),
            });
        }

        let mut table: toml::Table =
            toml::from_str(&contents).map_err(|e| self.parse_error(e))?;
        let migrated = crate::migration::migrate_to_latest(&mut table)?;

        let config: Config = toml::Value::Table(table)
            .try_into()
            .map_err(|e| self.parse_error(e))?;

        if migrated {
            log::info!("Saving migrated config");
            self.save(&config)?;
        }

        // Invalid values are reported but do not block startup
        if let Err(errors) = config.validate() {
            log::warn!("Config validation warnings: {}", join_errors(&errors));
        }

        Ok(config)
    }

    /// Validates and saves configuration atomically
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        if let Err(errors) = config.validate() {
            return Err(ConfigError::ValidationError(join_errors(&errors)));
        }

        let toml_string = toml::to_string_pretty(config)?;
        self.write_contents(&toml_string)?;

        log::info!("Config saved to {}", self.config_path.display());
        Ok(())
    }

    /// Writes the default config preceded by an explanatory header
    pub fn generate_default_with_comments(&self) -> ConfigResult<()> {
        let body = toml::to_string_pretty(&Config::default())?;
        self.write_contents(&format!("{}{}", DEFAULT_HEADER, body))?;

        log::info!("Generated default config at {}", self.config_path.display());
        Ok(())
    }

    fn write_contents(&self, content: &str) -> ConfigResult<()> {
        let dir = self
            .config_path
            .parent()
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "Config path has no parent directory".to_string(),
            })?;
        self.ensure_directory_exists(dir)?;

        if self.config_path.exists() {
            self.backup_config()?;
        }

        let mut temp_file = NamedTempFile::new_in(dir)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.flush()?;
        temp_file
            .persist(&self.config_path)
            .map_err(|e| ConfigError::WriteError {
                path: self.config_path.clone(),
                source: e.error,
            })?;

        Ok(())
    }

    fn ensure_directory_exists(&self, path: &Path) -> ConfigResult<()> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| ConfigError::DirectoryCreationError {
                path: path.to_path_buf(),
                source: e,
            })?;
            log::info!("Created config directory: {}", path.display());
        }
        Ok(())
    }

    fn backup_config(&self) -> ConfigResult<()> {
        let backup_path = self.config_path.with_extension("toml.backup");
        fs::copy(&self.config_path, &backup_path)
            .map_err(|e| ConfigError::BackupError { source: e })?;
        log::debug!("Backed up config to {}", backup_path.display());
        Ok(())
    }

    fn parse_error(&self, source: toml::de::Error) -> ConfigError {
        ConfigError::ParseError {
            path: self.config_path.clone(),
            source,
        }
    }
}
