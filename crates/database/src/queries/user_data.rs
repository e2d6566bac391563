//! Favorites and recent lists in the table layout used by older builds

use crate::DbPool;
use hymnal_core::{AppError, FavoritesList, RecentList, UserId};

/// A user's lists as stored in the legacy `user_data` table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyUserData {
    pub favorites: FavoritesList,
    pub recent: RecentList,
}

/// Reads a user's legacy row, if any
pub async fn get_legacy_user_data(
    pool: &DbPool,
    user: &UserId,
) -> Result<Option<LegacyUserData>, AppError> {
    use sqlx::Row;

    let row = sqlx::query("SELECT favorites, recent FROM user_data WHERE user_id = ?")
        .bind(user.as_str())
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch legacy user data", e))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let favorites: String = row
        .try_get("favorites")
        .map_err(|e| AppError::database("Missing favorites", e))?;
    let recent: String = row
        .try_get("recent")
        .map_err(|e| AppError::database("Missing recent", e))?;

    Ok(Some(LegacyUserData {
        favorites: FavoritesList::from_ids(parse_list(&favorites, "favorites")?),
        recent: RecentList::from_ids(parse_list(&recent, "recent")?),
    }))
}

/// Writes a legacy row; only older builds and upgrade tests produce these
pub async fn save_legacy_user_data(
    pool: &DbPool,
    user: &UserId,
    data: &LegacyUserData,
) -> Result<(), AppError> {
    let favorites = serde_json::to_string(&data.favorites)
        .map_err(|e| AppError::database("Failed to serialize favorites", e))?;
    let recent = serde_json::to_string(&data.recent)
        .map_err(|e| AppError::database("Failed to serialize recent", e))?;

    sqlx::query(
        r#"
        INSERT INTO user_data (user_id, favorites, recent) VALUES (?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            favorites = excluded.favorites,
            recent = excluded.recent
        "#,
    )
    .bind(user.as_str())
    .bind(favorites)
    .bind(recent)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to save legacy user data", e))?;

    Ok(())
}

/// Deletes a user's legacy row
pub async fn delete_legacy_user_data(pool: &DbPool, user: &UserId) -> Result<(), AppError> {
    sqlx::query("DELETE FROM user_data WHERE user_id = ?")
        .bind(user.as_str())
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete legacy user data", e))?;

    Ok(())
}

fn parse_list(raw: &str, column: &str) -> Result<Vec<String>, AppError> {
    // Older builds stored numeric hymn ids
    let values: Vec<serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| AppError::database(format!("Invalid legacy {} list", column), e))?;

    Ok(values
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}
