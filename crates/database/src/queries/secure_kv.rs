//! Key/value entries backing the secure storage seam

use crate::DbPool;
use hymnal_core::{AppError, Timestamp};

/// Reads a value by key
pub async fn get_secure_value(pool: &DbPool, key: &str) -> Result<Option<String>, AppError> {
    sqlx::query_scalar("SELECT value FROM secure_kv WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to read secure value", e))
}

/// Writes a value, replacing any previous one
pub async fn set_secure_value(pool: &DbPool, key: &str, value: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO secure_kv (key, value, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(Timestamp::now().to_iso8601())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to write secure value", e))?;

    Ok(())
}

/// Deletes a value; deleting a missing key is not an error
pub async fn delete_secure_value(pool: &DbPool, key: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM secure_kv WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete secure value", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_in_memory;
    use crate::migrations::initialize_schema;

    #[tokio::test]
    async fn test_set_get_delete() {
        let pool = connect_in_memory().await.unwrap();
        initialize_schema(&pool).await.unwrap();

        assert_eq!(get_secure_value(&pool, "favorites_u1").await.unwrap(), None);

        set_secure_value(&pool, "favorites_u1", "[\"1\"]").await.unwrap();
        set_secure_value(&pool, "favorites_u1", "[\"2\"]").await.unwrap();
        assert_eq!(
            get_secure_value(&pool, "favorites_u1").await.unwrap().as_deref(),
            Some("[\"2\"]")
        );

        delete_secure_value(&pool, "favorites_u1").await.unwrap();
        delete_secure_value(&pool, "favorites_u1").await.unwrap();
        assert_eq!(get_secure_value(&pool, "favorites_u1").await.unwrap(), None);
    }
}
