//! Per-user preference rows

use crate::DbPool;
use hymnal_core::{AppError, PreferenceSet, Timestamp, UserId};

/// Reads a user's stored preferences, merged over the defaults
///
/// Returns `None` when the user has no row yet.
pub async fn get_preferences(
    pool: &DbPool,
    user: &UserId,
) -> Result<Option<PreferenceSet>, AppError> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT preferences FROM user_preferences WHERE user_id = ?")
            .bind(user.as_str())
            .fetch_optional(pool)
            .await
            .map_err(|e| AppError::database("Failed to fetch preferences", e))?;

    Ok(raw.as_deref().map(PreferenceSet::from_json_str))
}

/// Stores a user's preferences, replacing any previous row
pub async fn save_preferences(
    pool: &DbPool,
    user: &UserId,
    preferences: &PreferenceSet,
) -> Result<(), AppError> {
    let json = serde_json::to_string(preferences)
        .map_err(|e| AppError::database("Failed to serialize preferences", e))?;
    let now = Timestamp::now().to_iso8601();

    sqlx::query(
        r#"
        INSERT INTO user_preferences (user_id, preferences, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            preferences = excluded.preferences,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user.as_str())
    .bind(json)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to save preferences", e))?;

    Ok(())
}

/// Removes a user's preference row
pub async fn delete_preferences(pool: &DbPool, user: &UserId) -> Result<(), AppError> {
    sqlx::query("DELETE FROM user_preferences WHERE user_id = ?")
        .bind(user.as_str())
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete preferences", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_in_memory;
    use crate::migrations::initialize_schema;
    use hymnal_core::FontSize;

    async fn setup() -> DbPool {
        let pool = connect_in_memory().await.unwrap();
        initialize_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_missing_user_has_no_row() {
        let pool = setup().await;
        let prefs = get_preferences(&pool, &UserId::new("nobody")).await.unwrap();
        assert!(prefs.is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_row() {
        let pool = setup().await;
        let user = UserId::new("u1");

        let mut prefs = PreferenceSet::default();
        save_preferences(&pool, &user, &prefs).await.unwrap();

        prefs.font_size = FontSize::XLarge;
        save_preferences(&pool, &user, &prefs).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_preferences")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let stored = get_preferences(&pool, &user).await.unwrap().unwrap();
        assert_eq!(stored, prefs);
    }

    #[tokio::test]
    async fn test_partial_row_is_default_filled() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO user_preferences VALUES ('u2', '{\"theme\":\"dark\"}', 'x', 'x')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let stored = get_preferences(&pool, &UserId::new("u2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.theme, hymnal_core::Theme::Dark);
        assert_eq!(stored.display.line_spacing, 1.5);
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = setup().await;
        let user = UserId::new("u3");
        save_preferences(&pool, &user, &PreferenceSet::default())
            .await
            .unwrap();
        delete_preferences(&pool, &user).await.unwrap();
        assert!(get_preferences(&pool, &user).await.unwrap().is_none());
    }
}
