use rusqlite::{params, params_from_iter, Row};

use super::DbPool;
use crate::clock::{from_millis, to_millis};
use crate::error::Result;
use crate::types::{CacheEntry, CacheType, CacheUsage};

const CACHE_COLUMNS: &str =
    "cache_key, cache_type, url, cached_at, expires_at, last_accessed_at, access_count, size_bytes";

fn row_to_entry(row: &Row) -> std::result::Result<CacheEntry, rusqlite::Error> {
    let cache_type: String = row.get(1)?;
    Ok(CacheEntry {
        cache_key: row.get(0)?,
        cache_type: CacheType::from_str(&cache_type),
        source_url: row.get(2)?,
        cached_at: from_millis(row.get(3)?),
        expires_at: from_millis(row.get(4)?),
        last_accessed_at: from_millis(row.get(5)?),
        access_count: row.get(6)?,
        size_bytes: row.get::<_, i64>(7)?.max(0) as u64,
    })
}

fn query_entries(
    pool: &DbPool,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<CacheEntry>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(sql)?;
    let entries = stmt
        .query_map(params, row_to_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Insert or fully replace the row for `entry.cache_key`.
pub fn upsert(pool: &DbPool, entry: &CacheEntry) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT OR REPLACE INTO cache_metadata (
            cache_key, cache_type, url, cached_at, expires_at,
            last_accessed_at, access_count, size_bytes
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.cache_key,
            entry.cache_type.as_str(),
            entry.source_url,
            to_millis(entry.cached_at),
            to_millis(entry.expires_at),
            to_millis(entry.last_accessed_at),
            entry.access_count,
            entry.size_bytes as i64,
        ],
    )?;
    Ok(())
}

pub fn get(pool: &DbPool, cache_key: &str) -> Result<Option<CacheEntry>> {
    let conn = pool.get()?;
    let result = conn.query_row(
        &format!("SELECT {CACHE_COLUMNS} FROM cache_metadata WHERE cache_key = ?1"),
        params![cache_key],
        row_to_entry,
    );

    match result {
        Ok(entry) => Ok(Some(entry)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bump access count and recency. Returns false when the key is unknown.
pub fn touch(pool: &DbPool, cache_key: &str, now_ms: i64) -> Result<bool> {
    let conn = pool.get()?;
    let updated = conn.execute(
        "UPDATE cache_metadata
         SET access_count = access_count + 1, last_accessed_at = ?1
         WHERE cache_key = ?2",
        params![now_ms, cache_key],
    )?;
    Ok(updated > 0)
}

pub fn expired(pool: &DbPool, now_ms: i64) -> Result<Vec<CacheEntry>> {
    query_entries(
        pool,
        &format!(
            "SELECT {CACHE_COLUMNS} FROM cache_metadata
             WHERE expires_at <= ?1
             ORDER BY expires_at ASC, rowid ASC"
        ),
        params![now_ms],
    )
}

/// Least recently accessed first; insertion order breaks ties.
pub fn least_recently_used(pool: &DbPool, limit: u32) -> Result<Vec<CacheEntry>> {
    query_entries(
        pool,
        &format!(
            "SELECT {CACHE_COLUMNS} FROM cache_metadata
             ORDER BY last_accessed_at ASC, rowid ASC
             LIMIT ?1"
        ),
        params![limit],
    )
}

pub fn all(pool: &DbPool) -> Result<Vec<CacheEntry>> {
    query_entries(
        pool,
        &format!("SELECT {CACHE_COLUMNS} FROM cache_metadata ORDER BY rowid ASC"),
        [],
    )
}

pub fn delete_many(pool: &DbPool, cache_keys: &[String]) -> Result<usize> {
    if cache_keys.is_empty() {
        return Ok(0);
    }

    let conn = pool.get()?;
    let tx = conn.unchecked_transaction()?;
    let mut removed = 0;

    // Stay well under SQLITE_MAX_VARIABLE_NUMBER.
    for chunk in cache_keys.chunks(500) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        removed += tx.execute(
            &format!("DELETE FROM cache_metadata WHERE cache_key IN ({placeholders})"),
            params_from_iter(chunk.iter()),
        )?;
    }

    tx.commit()?;
    Ok(removed)
}

/// Raise `expires_at` to `until_ms` for entries accessed at least `threshold`
/// times. Rows already expiring later are left alone.
pub fn extend_hot(pool: &DbPool, threshold: u32, until_ms: i64) -> Result<usize> {
    let conn = pool.get()?;
    let updated = conn.execute(
        "UPDATE cache_metadata SET expires_at = ?1
         WHERE access_count >= ?2 AND expires_at < ?1",
        params![until_ms, threshold],
    )?;
    Ok(updated)
}

pub fn usage(pool: &DbPool) -> Result<CacheUsage> {
    let conn = pool.get()?;
    let usage = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM cache_metadata",
        [],
        |row| {
            Ok(CacheUsage {
                entries: row.get::<_, i64>(0)?.max(0) as u64,
                bytes: row.get::<_, i64>(1)?.max(0) as u64,
            })
        },
    )?;
    Ok(usage)
}

pub fn clear(pool: &DbPool) -> Result<usize> {
    let conn = pool.get()?;
    let removed = conn.execute("DELETE FROM cache_metadata", [])?;
    Ok(removed)
}
