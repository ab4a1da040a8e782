use rusqlite::{params, Row};

use super::DbPool;
use crate::clock::{from_millis, to_millis};
use crate::error::Result;
use crate::types::{MessageType, OutboxItem};

const OUTBOX_COLUMNS: &str =
    "temp_id, conversation_id, content, message_type, media_ref, retry_count, last_error, created_at";

fn row_to_item(row: &Row) -> std::result::Result<OutboxItem, rusqlite::Error> {
    let message_type: String = row.get(3)?;
    Ok(OutboxItem {
        temp_id: row.get(0)?,
        conversation_id: row.get(1)?,
        content: row.get(2)?,
        message_type: MessageType::from_str(&message_type),
        media_ref: row.get(4)?,
        retry_count: row.get(5)?,
        last_error: row.get(6)?,
        created_at: from_millis(row.get(7)?),
    })
}

/// Queue a message at compose time. Re-enqueueing a known temp id is a no-op.
pub fn enqueue(pool: &DbPool, item: &OutboxItem) -> Result<bool> {
    let conn = pool.get()?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO outbox (
            temp_id, conversation_id, content, message_type, media_ref,
            retry_count, last_error, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            item.temp_id,
            item.conversation_id,
            item.content,
            item.message_type.as_str(),
            item.media_ref,
            item.retry_count,
            item.last_error,
            to_millis(item.created_at),
        ],
    )?;
    Ok(inserted > 0)
}

/// All pending items, oldest enqueued first.
pub fn pending(pool: &DbPool) -> Result<Vec<OutboxItem>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {OUTBOX_COLUMNS} FROM outbox ORDER BY seq ASC"
    ))?;
    let items = stmt
        .query_map([], row_to_item)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn get(pool: &DbPool, temp_id: &str) -> Result<Option<OutboxItem>> {
    let conn = pool.get()?;
    let result = conn.query_row(
        &format!("SELECT {OUTBOX_COLUMNS} FROM outbox WHERE temp_id = ?1"),
        params![temp_id],
        row_to_item,
    );

    match result {
        Ok(item) => Ok(Some(item)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn delete(pool: &DbPool, temp_id: &str) -> Result<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM outbox WHERE temp_id = ?1", params![temp_id])?;
    Ok(())
}

pub fn increment_retry(pool: &DbPool, temp_id: &str, reason: &str) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "UPDATE outbox SET retry_count = retry_count + 1, last_error = ?1
         WHERE temp_id = ?2",
        params![reason, temp_id],
    )?;
    Ok(())
}

/// Delete items that reached `max_retries` failures and return them.
pub fn purge_exhausted(pool: &DbPool, max_retries: u32) -> Result<Vec<OutboxItem>> {
    let conn = pool.get()?;
    let tx = conn.unchecked_transaction()?;

    let exhausted = {
        let mut stmt = tx.prepare(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox WHERE retry_count >= ?1 ORDER BY seq ASC"
        ))?;
        let rows = stmt
            .query_map(params![max_retries], row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    tx.execute(
        "DELETE FROM outbox WHERE retry_count >= ?1",
        params![max_retries],
    )?;
    tx.commit()?;

    Ok(exhausted)
}

/// (pending, failed at least once)
pub fn counts(pool: &DbPool) -> Result<(u32, u32)> {
    let conn = pool.get()?;
    let counts = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN retry_count > 0 THEN 1 ELSE 0 END), 0)
         FROM outbox",
        [],
        |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?)),
    )?;
    Ok(counts)
}
