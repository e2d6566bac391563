//! Install-scoped sync metadata

use crate::DbPool;
use hymnal_core::{AppError, Timestamp};

const LAST_SYNC_TIME: &str = "lastSyncTime";

/// Reads the catalog watermark
///
/// An unreadable stored value is treated as absent.
pub async fn get_last_sync_time(pool: &DbPool) -> Result<Option<Timestamp>, AppError> {
    let raw: Option<String> = sqlx::query_scalar("SELECT value FROM sync_meta WHERE key = ?")
        .bind(LAST_SYNC_TIME)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to read sync watermark", e))?;

    Ok(raw.and_then(|s| match Timestamp::parse(&s) {
        Ok(t) => Some(t),
        Err(e) => {
            log::warn!("Discarding unreadable sync watermark '{}': {}", s, e);
            None
        }
    }))
}

/// Stores the catalog watermark
pub async fn set_last_sync_time(pool: &DbPool, at: Timestamp) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO sync_meta (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(LAST_SYNC_TIME)
    .bind(at.to_iso8601())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to write sync watermark", e))?;

    Ok(())
}

/// Removes the catalog watermark, forcing the next sync to start over
pub async fn clear_last_sync_time(pool: &DbPool) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sync_meta WHERE key = ?")
        .bind(LAST_SYNC_TIME)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to clear sync watermark", e))?;

    Ok(())
}
