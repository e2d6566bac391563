//! Upgrades config files written in older formats
//!
//! Migrations operate on the parsed TOML table before it is deserialized, so
//! fields that no longer exist in [`Config`](crate::Config) can still be
//! moved to their new home.

use crate::{ConfigError, ConfigResult, CONFIG_VERSION};
use toml::{Table, Value};

/// One step in the migration chain
trait Migration {
    /// The version this migration upgrades to
    fn target_version(&self) -> u32;

    fn migrate(&self, table: &mut Table) -> ConfigResult<()>;
}

/// Version 1 kept the database path under `[app]` and called the backend
/// URL `endpoint`.
struct SplitStorageSection;

impl Migration for SplitStorageSection {
    fn target_version(&self) -> u32 {
        2
    }

    fn migrate(&self, table: &mut Table) -> ConfigResult<()> {
        let database_path = sub_table(table, "app")?.and_then(|app| app.remove("database_path"));
        if let Some(path) = database_path {
            ensure_table(table, "storage")?.insert("database_path".to_string(), path);
        }

        if let Some(remote) = sub_table(table, "remote")? {
            if let Some(endpoint) = remote.remove("endpoint") {
                remote.entry("base_url").or_insert(endpoint);
            }
        }

        Ok(())
    }
}

/// Reads the format version of a parsed config file; files without one
/// predate versioning and count as version 1
pub fn file_version(table: &Table) -> u32 {
    table
        .get("version")
        .and_then(Value::as_integer)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(1)
}

/// Migrates a parsed config file to the current version in place
///
/// Returns true when anything changed. Files from a newer version are left
/// untouched.
pub fn migrate_to_latest(table: &mut Table) -> ConfigResult<bool> {
    let from = file_version(table);

    if from >= CONFIG_VERSION {
        if from > CONFIG_VERSION {
            log::warn!(
                "Config version {} is newer than supported version {}, using as-is",
                from,
                CONFIG_VERSION
            );
        }
        return Ok(false);
    }

    log::info!("Migrating config from version {} to {}", from, CONFIG_VERSION);

    let mut current = from;
    while current < CONFIG_VERSION {
        let next = current + 1;
        match migration_for(next) {
            Some(migration) => {
                migration.migrate(table)?;
                log::debug!("Applied config migration to version {}", migration.target_version());
            }
            None => log::warn!("No migration defined for version {}, skipping", next),
        }
        current = next;
    }

    table.insert("version".to_string(), Value::Integer(i64::from(CONFIG_VERSION)));
    Ok(true)
}

fn migration_for(version: u32) -> Option<Box<dyn Migration>> {
    match version {
        2 => Some(Box::new(SplitStorageSection)),
        _ => None,
    }
}

fn sub_table<'a>(table: &'a mut Table, name: &str) -> ConfigResult<Option<&'a mut Table>> {
    let version = file_version(table);
    match table.get_mut(name) {
        None => Ok(None),
        Some(Value::Table(t)) => Ok(Some(t)),
        Some(_) => Err(ConfigError::MigrationError {
            from: version,
            reason: format!("[{}] is not a table", name),
        }),
    }
}

fn ensure_table<'a>(table: &'a mut Table, name: &str) -> ConfigResult<&'a mut Table> {
    let version = file_version(table);
    match table
        .entry(name)
        .or_insert_with(|| Value::Table(Table::new()))
    {
        Value::Table(t) => Ok(t),
        _ => Err(ConfigError::MigrationError {
            from: version,
            reason: format!("[{}] is not a table", name),
        }),
    }
}
