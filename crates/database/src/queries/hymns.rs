//! Hymn database operations

use crate::DbPool;
use hymnal_core::{AppError, HymnKey, HymnRecord, RemoteId, Timestamp, Validator};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Sqlite};
use std::io;
use std::path::{Path, PathBuf};

const HYMN_COLUMNS: &str = r#"
    local_id, remote_id, number, title, origin, hymn_key, stanzas, refrains,
    category, audio_url, video_ref, local_audio_path, updated_at
"#;

/// Inserts a hymn or replaces the row with the same remote id
///
/// A locally recorded audio path survives the update unless the incoming
/// record carries its own.
pub async fn upsert_hymn(pool: &DbPool, hymn: &HymnRecord) -> Result<(), AppError> {
    upsert_hymn_with(pool, hymn).await
}

/// Upserts with any executor, so callers can group writes in a transaction
pub async fn upsert_hymn_with<'e, E>(executor: E, hymn: &HymnRecord) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    hymn.validate().map_err(|reasons| AppError::InvalidHymn {
        identifier: hymn.remote_id.to_string(),
        reasons,
    })?;

    let mut hymn = hymn.clone();
    hymn.normalize();

    let stanzas = serde_json::to_string(&hymn.stanzas)
        .map_err(|e| AppError::database("Failed to serialize stanzas", e))?;
    let refrains = serde_json::to_string(&hymn.refrains)
        .map_err(|e| AppError::database("Failed to serialize refrains", e))?;
    let local_audio_path = hymn
        .local_audio_path
        .as_ref()
        .and_then(|p| p.to_str())
        .map(str::to_string);
    let remote_id = hymn.remote_id.clone();

    sqlx::query(
        r#"
        INSERT INTO hymns (
            remote_id, number, title, origin, hymn_key, stanzas, refrains,
            category, audio_url, video_ref, local_audio_path, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(remote_id) DO UPDATE SET
            number = excluded.number,
            title = excluded.title,
            origin = excluded.origin,
            hymn_key = excluded.hymn_key,
            stanzas = excluded.stanzas,
            refrains = excluded.refrains,
            category = excluded.category,
            audio_url = excluded.audio_url,
            video_ref = excluded.video_ref,
            local_audio_path = COALESCE(excluded.local_audio_path, hymns.local_audio_path),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(hymn.remote_id.to_string())
    .bind(hymn.number as i64)
    .bind(hymn.title)
    .bind(hymn.origin)
    .bind(hymn.key)
    .bind(stanzas)
    .bind(refrains)
    .bind(hymn.category)
    .bind(hymn.audio_remote_url)
    .bind(hymn.video_reference)
    .bind(local_audio_path)
    .bind(hymn.updated_at.to_iso8601())
    .execute(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to upsert hymn {}", remote_id), e))?;

    Ok(())
}

/// Upserts a batch inside one transaction
///
/// Either every record is applied or none is. `on_applied` is called after
/// each record with the number applied so far.
pub async fn upsert_hymns_batch<F>(
    pool: &DbPool,
    hymns: &[HymnRecord],
    mut on_applied: F,
) -> Result<usize, AppError>
where
    F: FnMut(usize, &HymnRecord),
{
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin hymn batch", e))?;

    for (index, hymn) in hymns.iter().enumerate() {
        upsert_hymn_with(&mut *tx, hymn).await?;
        on_applied(index + 1, hymn);
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit hymn batch", e))?;

    Ok(hymns.len())
}

/// Returns every hymn ordered by number; a missing table reads as empty
pub async fn get_all_hymns(pool: &DbPool) -> Result<Vec<HymnRecord>, AppError> {
    let sql = format!("SELECT {} FROM hymns ORDER BY number", HYMN_COLUMNS);
    match sqlx::query(&sql).fetch_all(pool).await {
        Ok(rows) => rows.into_iter().map(row_to_hymn).collect(),
        Err(e) if is_missing_table(&e) => Ok(Vec::new()),
        Err(e) => Err(AppError::database("Failed to list hymns", e)),
    }
}

/// Looks a hymn up by remote id or number
pub async fn find_hymn(pool: &DbPool, key: &HymnKey) -> Result<Option<HymnRecord>, AppError> {
    let row = match key {
        HymnKey::Remote(id) => {
            let sql = format!("SELECT {} FROM hymns WHERE remote_id = ?", HYMN_COLUMNS);
            sqlx::query(&sql)
                .bind(id.as_str())
                .fetch_optional(pool)
                .await
        }
        HymnKey::Number(number) => {
            let sql = format!("SELECT {} FROM hymns WHERE number = ?", HYMN_COLUMNS);
            sqlx::query(&sql)
                .bind(*number as i64)
                .fetch_optional(pool)
                .await
        }
    };

    match row {
        Ok(row) => row.map(row_to_hymn).transpose(),
        Err(e) if is_missing_table(&e) => Ok(None),
        Err(e) => Err(AppError::database("Failed to fetch hymn", e)),
    }
}

/// Gets a hymn by remote id or number, failing with `RecordNotFound`
pub async fn get_hymn_by_identifier(pool: &DbPool, key: &HymnKey) -> Result<HymnRecord, AppError> {
    find_hymn(pool, key)
        .await?
        .ok_or_else(|| AppError::hymn_not_found(key))
}

/// Number of hymns stored locally
pub async fn get_hymn_count(pool: &DbPool) -> Result<i64, AppError> {
    count(pool, "SELECT COUNT(*) FROM hymns").await
}

/// Number of hymns with a recorded downloaded tune
pub async fn get_downloaded_audio_count(pool: &DbPool) -> Result<i64, AppError> {
    count(
        pool,
        "SELECT COUNT(*) FROM hymns WHERE local_audio_path IS NOT NULL",
    )
    .await
}

async fn count(pool: &DbPool, sql: &str) -> Result<i64, AppError> {
    match sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await {
        Ok(n) => Ok(n),
        Err(e) if is_missing_table(&e) => Ok(0),
        Err(e) => Err(AppError::database("Failed to count hymns", e)),
    }
}

/// Latest `updated_at` present in the local store
pub async fn max_updated_at(pool: &DbPool) -> Result<Option<Timestamp>, AppError> {
    let raw: Option<String> = match sqlx::query_scalar("SELECT MAX(updated_at) FROM hymns")
        .fetch_one(pool)
        .await
    {
        Ok(value) => value,
        Err(e) if is_missing_table(&e) => None,
        Err(e) => return Err(AppError::database("Failed to read latest hymn update", e)),
    };

    Ok(raw.and_then(|s| match Timestamp::parse(&s) {
        Ok(t) => Some(t),
        Err(e) => {
            log::warn!("Ignoring unparseable hymn timestamp '{}': {}", s, e);
            None
        }
    }))
}

/// Records (or clears) the downloaded tune path for a hymn
pub async fn set_local_audio_path(
    pool: &DbPool,
    remote_id: &RemoteId,
    path: Option<&Path>,
) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE hymns SET local_audio_path = ? WHERE remote_id = ?")
        .bind(path.and_then(|p| p.to_str()))
        .bind(remote_id.as_str())
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to record tune path", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::hymn_not_found(remote_id));
    }

    Ok(())
}

/// Clears every recorded tune path
pub async fn clear_all_local_audio_paths(pool: &DbPool) -> Result<u64, AppError> {
    let result = sqlx::query("UPDATE hymns SET local_audio_path = NULL WHERE local_audio_path IS NOT NULL")
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to clear tune paths", e))?;

    Ok(result.rows_affected())
}

/// Deletes every hymn row and the downloaded tunes under `tune_dir`
///
/// A tune directory that does not exist is not an error.
pub async fn delete_all_hymns(pool: &DbPool, tune_dir: &Path) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM hymns")
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete hymns", e))?;

    match tokio::fs::remove_dir_all(tune_dir).await {
        Ok(()) => log::info!("Removed tune directory {}", tune_dir.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(AppError::IoError {
                message: format!("Failed to remove {}", tune_dir.display()),
                source: e,
            })
        }
    }

    Ok(result.rows_affected())
}

pub(crate) fn is_missing_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.message().contains("no such table"),
        _ => false,
    }
}

pub(crate) fn row_to_hymn(row: SqliteRow) -> Result<HymnRecord, AppError> {
    use sqlx::Row;

    let local_id: i64 = row
        .try_get("local_id")
        .map_err(|e| AppError::database("Missing hymn local id", e))?;
    let remote_id: String = row
        .try_get("remote_id")
        .map_err(|e| AppError::database("Missing hymn remote id", e))?;
    let number: i64 = row
        .try_get("number")
        .map_err(|e| AppError::database("Missing hymn number", e))?;

    let stanzas_json: String = row
        .try_get("stanzas")
        .map_err(|e| AppError::database("Missing stanzas", e))?;
    let stanzas = serde_json::from_str(&stanzas_json)
        .map_err(|e| AppError::database("Failed to deserialize stanzas", e))?;

    let refrains_json: Option<String> = row.try_get("refrains").ok();
    let refrains = match refrains_json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| AppError::database("Failed to deserialize refrains", e))?,
        None => Vec::new(),
    };

    let updated_at_str: String = row
        .try_get("updated_at")
        .map_err(|e| AppError::database("Missing updated_at", e))?;
    let updated_at = Timestamp::parse(&updated_at_str)
        .map_err(|e| AppError::database("Invalid updated_at", e))?;

    let local_audio_path: Option<String> = row.try_get("local_audio_path").ok().flatten();

    Ok(HymnRecord {
        local_id: Some(local_id),
        remote_id: RemoteId::new(remote_id),
        number: number as u32,
        title: row
            .try_get("title")
            .map_err(|e| AppError::database("Missing title", e))?,
        origin: row.try_get("origin").unwrap_or_default(),
        key: row.try_get("hymn_key").unwrap_or_default(),
        category: row.try_get("category").ok().flatten(),
        stanzas,
        refrains,
        audio_remote_url: row.try_get("audio_url").ok().flatten(),
        video_reference: row.try_get("video_ref").ok().flatten(),
        local_audio_path: local_audio_path.map(PathBuf::from),
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_in_memory;
    use crate::migrations::initialize_schema;
    use hymnal_core::Stanza;

    async fn setup() -> DbPool {
        let pool = connect_in_memory().await.unwrap();
        initialize_schema(&pool).await.unwrap();
        pool
    }

    fn hymn(id: &str, number: u32, title: &str) -> HymnRecord {
        let mut h = HymnRecord::new(id, number, title);
        h.stanzas = vec![Stanza::new(1, format!("{} verse", title))];
        h.updated_at = Timestamp::from_millis(1_700_000_000_000 + number as i64);
        h
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row_with_latest_values() {
        let pool = setup().await;

        upsert_hymn(&pool, &hymn("a", 1, "First Title")).await.unwrap();
        upsert_hymn(&pool, &hymn("a", 1, "Second Title")).await.unwrap();

        assert_eq!(get_hymn_count(&pool).await.unwrap(), 1);
        let stored = get_hymn_by_identifier(&pool, &HymnKey::Number(1))
            .await
            .unwrap();
        assert_eq!(stored.title, "Second Title");
        assert_eq!(stored.remote_id.as_str(), "a");
        assert!(stored.local_id.is_some());
    }

    #[tokio::test]
    async fn test_upsert_keeps_local_audio_path() {
        let pool = setup().await;
        let id = RemoteId::new("a");

        upsert_hymn(&pool, &hymn("a", 1, "Title")).await.unwrap();
        set_local_audio_path(&pool, &id, Some(Path::new("/tunes/hymn_1.mp3")))
            .await
            .unwrap();
        upsert_hymn(&pool, &hymn("a", 1, "Title v2")).await.unwrap();

        let stored = get_hymn_by_identifier(&pool, &HymnKey::Remote(id))
            .await
            .unwrap();
        assert_eq!(
            stored.local_audio_path,
            Some(PathBuf::from("/tunes/hymn_1.mp3"))
        );
        assert_eq!(get_downloaded_audio_count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_number_is_rejected() {
        let pool = setup().await;

        upsert_hymn(&pool, &hymn("a", 1, "One")).await.unwrap();
        let err = upsert_hymn(&pool, &hymn("b", 1, "Also One")).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError { .. }));
    }

    #[tokio::test]
    async fn test_invalid_hymn_is_rejected() {
        let pool = setup().await;
        let err = upsert_hymn(&pool, &hymn("a", 0, "")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidHymn { .. }));
        assert_eq!(get_hymn_count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_failure() {
        let pool = setup().await;
        upsert_hymn(&pool, &hymn("keep", 100, "Existing")).await.unwrap();

        let batch = vec![hymn("a", 1, "One"), hymn("b", 2, "Two"), hymn("c", 100, "Clash")];
        let mut seen = 0;
        let result = upsert_hymns_batch(&pool, &batch, |n, _| seen = n).await;

        assert!(result.is_err());
        assert_eq!(seen, 2);
        assert_eq!(get_hymn_count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_all_orders_by_number() {
        let pool = setup().await;
        let batch = vec![hymn("c", 3, "C"), hymn("a", 1, "A"), hymn("b", 2, "B")];
        assert_eq!(upsert_hymns_batch(&pool, &batch, |_, _| {}).await.unwrap(), 3);

        let numbers: Vec<u32> = get_all_hymns(&pool)
            .await
            .unwrap()
            .iter()
            .map(|h| h.number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_not_found() {
        let pool = setup().await;
        let err = get_hymn_by_identifier(&pool, &HymnKey::Number(404))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(find_hymn(&pool, &HymnKey::parse("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_table_reads_as_empty() {
        let pool = connect_in_memory().await.unwrap();

        assert!(get_all_hymns(&pool).await.unwrap().is_empty());
        assert_eq!(get_hymn_count(&pool).await.unwrap(), 0);
        assert_eq!(get_downloaded_audio_count(&pool).await.unwrap(), 0);
        assert!(max_updated_at(&pool).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_max_updated_at() {
        let pool = setup().await;
        assert!(max_updated_at(&pool).await.unwrap().is_none());

        upsert_hymn(&pool, &hymn("a", 1, "A")).await.unwrap();
        upsert_hymn(&pool, &hymn("b", 7, "B")).await.unwrap();

        let max = max_updated_at(&pool).await.unwrap().unwrap();
        assert_eq!(max, Timestamp::from_millis(1_700_000_000_007));
    }

    #[tokio::test]
    async fn test_clear_paths_and_delete_all() {
        let pool = setup().await;
        let dir = tempfile::TempDir::new().unwrap();
        let tune_dir = dir.path().join("tunes");
        std::fs::create_dir_all(&tune_dir).unwrap();
        std::fs::write(tune_dir.join("hymn_1.mp3"), b"ID3").unwrap();

        upsert_hymn(&pool, &hymn("a", 1, "A")).await.unwrap();
        set_local_audio_path(&pool, &RemoteId::new("a"), Some(tune_dir.join("hymn_1.mp3").as_path()))
            .await
            .unwrap();

        assert_eq!(clear_all_local_audio_paths(&pool).await.unwrap(), 1);
        assert_eq!(get_downloaded_audio_count(&pool).await.unwrap(), 0);

        assert_eq!(delete_all_hymns(&pool, &tune_dir).await.unwrap(), 1);
        assert!(!tune_dir.exists());
        assert_eq!(get_hymn_count(&pool).await.unwrap(), 0);

        // Second call with the directory already gone
        assert_eq!(delete_all_hymns(&pool, &tune_dir).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_path_for_unknown_hymn() {
        let pool = setup().await;
        let err = set_local_audio_path(&pool, &RemoteId::new("ghost"), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
