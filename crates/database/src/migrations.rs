//! Schema creation and upgrades
//!
//! Versioned SQL files are applied once each and recorded in
//! `schema_migrations`. Databases created by older builds may also have a
//! `hymns` table that predates some optional columns; those are added in place
//! after inspecting the live table, without touching existing rows.

use crate::DbPool;
use hymnal_core::AppError;
use sqlx::Row;

/// Migration 001: hymns and preferences
const MIGRATION_001: &str = include_str!("../migrations/001_initial_schema.sql");

/// Migration 002: legacy user data, secure entries, sync metadata
const MIGRATION_002: &str = include_str!("../migrations/002_user_storage.sql");

/// Migration 003: full-text search
const MIGRATION_003: &str = include_str!("../migrations/003_hymn_search.sql");

/// Current database schema version
pub const CURRENT_VERSION: i64 = 3;

/// Columns that older `hymns` tables may lack, with the DDL used to add them
const OPTIONAL_HYMN_COLUMNS: &[(&str, &str)] = &[
    ("refrains", "TEXT NOT NULL DEFAULT '[]'"),
    ("category", "TEXT"),
    ("video_ref", "TEXT"),
    ("local_audio_path", "TEXT"),
];

/// Returns the current migration version
pub fn current_version() -> i64 {
    CURRENT_VERSION
}

/// Creates every table the local store needs; safe to call on every start
pub async fn initialize_schema(pool: &DbPool) -> Result<(), AppError> {
    run_migrations(pool).await?;
    log::debug!("Local store schema at version {}", CURRENT_VERSION);
    Ok(())
}

/// Runs all pending migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to create migrations table", e))?;

    run_migration(pool, 1, MIGRATION_001).await?;
    // The search triggers read the optional columns, so the hymns table must
    // be complete before migration 003.
    ensure_optional_columns(pool).await?;
    run_migration(pool, 2, MIGRATION_002).await?;
    run_migration(pool, 3, MIGRATION_003).await?;

    Ok(())
}

/// Runs a single migration if not already applied
async fn run_migration(pool: &DbPool, version: i64, sql: &str) -> Result<(), AppError> {
    let applied: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_migrations WHERE version = ?")
            .bind(version)
            .fetch_optional(pool)
            .await
            .map_err(|e| AppError::database("Failed to check migration status", e))?;

    if applied.is_some() {
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin migration", e))?;

    sqlx::raw_sql(sql)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::MigrationFailed {
            version: version.to_string(),
            reason: e.to_string(),
        })?;

    sqlx::query("INSERT INTO schema_migrations (version) VALUES (?)")
        .bind(version)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database("Failed to record migration", e))?;

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit migration", e))?;

    log::info!("Applied local store migration {}", version);
    Ok(())
}

/// Adds optional `hymns` columns missing from tables created by older builds
pub async fn ensure_optional_columns(pool: &DbPool) -> Result<(), AppError> {
    let existing = table_columns(pool, "hymns").await?;

    for (name, ddl) in OPTIONAL_HYMN_COLUMNS {
        if existing.iter().any(|c| c == name) {
            continue;
        }

        sqlx::query(&format!("ALTER TABLE hymns ADD COLUMN {} {}", name, ddl))
            .execute(pool)
            .await
            .map_err(|e| AppError::MigrationFailed {
                version: format!("hymns.{}", name),
                reason: e.to_string(),
            })?;

        log::info!("Added missing column hymns.{}", name);
    }

    Ok(())
}

/// Lists the column names of a table; empty if the table does not exist
pub async fn table_columns(pool: &DbPool, table: &str) -> Result<Vec<String>, AppError> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to inspect table", e))?;

    rows.iter()
        .map(|row| {
            row.try_get::<String, _>("name")
                .map_err(|e| AppError::database("Missing column name", e))
        })
        .collect()
}

/// Verifies database integrity
pub async fn verify_integrity(pool: &DbPool) -> Result<(), AppError> {
    let result: String = sqlx::query_scalar("PRAGMA integrity_check")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to check integrity", e))?;

    if result != "ok" {
        return Err(AppError::DatabaseCorrupted { details: result });
    }

    Ok(())
}

/// Optimizes the database
pub async fn optimize(pool: &DbPool) -> Result<(), AppError> {
    sqlx::query("PRAGMA optimize")
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to optimize database", e))?;

    Ok(())
}
