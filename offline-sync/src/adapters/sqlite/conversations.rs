use rusqlite::params;

use super::DbPool;
use crate::clock::{from_millis, to_millis};
use crate::error::Result;
use crate::types::ConversationSyncMetadata;

/// Make a conversation known locally so passes pull it.
pub fn ensure_conversation(pool: &DbPool, conversation_id: &str) -> Result<()> {
    let conn = pool.get()?;
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT OR IGNORE INTO conversations (id, created_at) VALUES (?1, ?2)",
        params![conversation_id, now],
    )?;
    Ok(())
}

/// Every conversation id known locally, registered or referenced by a message.
pub fn all_conversation_ids(pool: &DbPool) -> Result<Vec<String>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id FROM conversations
         UNION
         SELECT DISTINCT conversation_id FROM messages
         ORDER BY 1",
    )?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn get_sync_metadata(
    pool: &DbPool,
    conversation_id: &str,
) -> Result<Option<ConversationSyncMetadata>> {
    let conn = pool.get()?;
    let result = conn.query_row(
        "SELECT conversation_id, last_sync_at, last_message_id, has_more
         FROM conversation_sync
         WHERE conversation_id = ?1",
        params![conversation_id],
        |row| {
            Ok(ConversationSyncMetadata {
                conversation_id: row.get(0)?,
                last_sync_at: from_millis(row.get(1)?),
                last_message_id: row.get(2)?,
                has_more: row.get::<_, i64>(3)? != 0,
            })
        },
    );

    match result {
        Ok(metadata) => Ok(Some(metadata)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_sync_metadata(pool: &DbPool, metadata: &ConversationSyncMetadata) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT OR REPLACE INTO conversation_sync (
            conversation_id, last_sync_at, last_message_id, has_more
         ) VALUES (?1, ?2, ?3, ?4)",
        params![
            metadata.conversation_id,
            to_millis(metadata.last_sync_at),
            metadata.last_message_id,
            metadata.has_more as i32,
        ],
    )?;
    Ok(())
}
