//! Full-text hymn search using FTS5

use crate::queries::hymns::{find_hymn, row_to_hymn};
use crate::DbPool;
use hymnal_core::{AppError, HymnKey, HymnRecord};

/// Search result with relevance ranking
#[derive(Debug, Clone)]
pub struct SearchResult<T> {
    pub item: T,
    /// FTS5 rank; lower is better. Exact number matches rank first.
    pub rank: f64,
}

/// Searches hymns by title, origin, category and lyric text
///
/// A query that is a plain number also matches the hymn with that number,
/// which is listed first. Each word is matched as a prefix.
pub async fn search_hymns(
    pool: &DbPool,
    query: &str,
    limit: i64,
) -> Result<Vec<SearchResult<HymnRecord>>, AppError> {
    let mut results = Vec::new();

    if let HymnKey::Number(number) = HymnKey::parse(query) {
        if let Some(hymn) = find_hymn(pool, &HymnKey::Number(number)).await? {
            results.push(SearchResult {
                item: hymn,
                rank: f64::MIN,
            });
        }
    }

    let Some(expression) = match_expression(query) else {
        return Ok(results);
    };

    let rows = sqlx::query(
        r#"
        SELECT h.local_id, h.remote_id, h.number, h.title, h.origin, h.hymn_key,
               h.stanzas, h.refrains, h.category, h.audio_url, h.video_ref,
               h.local_audio_path, h.updated_at,
               f.rank as rank
        FROM hymns_fts f
        JOIN hymns h ON f.rowid = h.local_id
        WHERE hymns_fts MATCH ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(expression)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to search hymns", e))?;

    for row in rows {
        use sqlx::Row;
        let rank: f64 = row.try_get("rank").unwrap_or(0.0);
        let hymn = row_to_hymn(row)?;
        if results.iter().any(|r| r.item.remote_id == hymn.remote_id) {
            continue;
        }
        results.push(SearchResult { item: hymn, rank });
    }

    results.truncate(limit.max(0) as usize);
    Ok(results)
}

/// Turns free text into an FTS5 expression of quoted prefix terms
fn match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|word| word.replace('"', ""))
        .filter(|word| !word.is_empty())
        .map(|word| format!("\"{}\"*", word))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}
