//! Local Store configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where and how the local database and downloaded tunes are kept
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file, relative to the data directory unless absolute
    pub database_path: PathBuf,

    /// Directory under the data directory holding downloaded tunes
    pub tune_dir_name: String,

    pub wal_enabled: bool,

    pub max_connections: u32,
}

impl StorageConfig {
    /// Resolves the database file against the data directory
    pub fn database_file(&self, data_dir: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            data_dir.join(&self.database_path)
        }
    }

    /// Resolves the tune directory against the data directory
    pub fn tune_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.tune_dir_name)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("hymnal.db"),
            tune_dir_name: "tunes".to_string(),
            wal_enabled: true,
            max_connections: 5,
        }
    }
}

impl ConfigSection for StorageConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = Vec::new();

        if self.database_path.as_os_str().is_empty() {
            results.push(Err(ValidationError::new(
                "storage.database_path",
                "must not be empty",
            )));
        }
        results.push(Validator::file_name(
            &self.tune_dir_name,
            "storage.tune_dir_name",
        ));
        results.push(Validator::in_range(
            self.max_connections,
            1,
            64,
            "storage.max_connections",
        ));

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.database_path = other.database_path;
        self.tune_dir_name = other.tune_dir_name;
        self.wal_enabled = other.wal_enabled;
        self.max_connections = other.max_connections;
    }

    fn section_name(&self) -> &'static str {
        "storage"
    }
}
