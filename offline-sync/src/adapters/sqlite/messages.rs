use rusqlite::{params, Row};
use tracing::warn;

use super::DbPool;
use crate::clock::{from_millis, to_millis};
use crate::error::Result;
use crate::types::{Message, MessageType};

fn row_to_message(row: &Row) -> std::result::Result<Message, rusqlite::Error> {
    let message_type: String = row.get(4)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        message_type: MessageType::from_str(&message_type),
        media_url: row.get(5)?,
        created_at: from_millis(row.get(6)?),
    })
}

/// Store messages; ids already present are left untouched.
///
/// Returns how many rows were actually inserted.
pub fn insert_messages(pool: &DbPool, messages: &[Message]) -> Result<usize> {
    let conn = pool.get()?;
    let tx = conn.unchecked_transaction()?;
    let now = chrono::Utc::now().timestamp_millis();

    let mut count = 0;
    for msg in messages {
        let result = tx.execute(
            "INSERT OR IGNORE INTO messages (
                id, conversation_id, sender_id, content, message_type,
                media_url, created_at, stored_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                msg.id,
                msg.conversation_id,
                msg.sender_id,
                msg.content,
                msg.message_type.as_str(),
                msg.media_url,
                to_millis(msg.created_at),
                now,
            ],
        );

        match result {
            Ok(inserted) => count += inserted,
            Err(e) => {
                warn!("Failed to insert message {}: {}", msg.id, e);
                return Err(e.into());
            }
        }
    }

    tx.commit()?;
    Ok(count)
}

/// Newest stored message of a conversation.
pub fn latest_message(pool: &DbPool, conversation_id: &str) -> Result<Option<Message>> {
    let conn = pool.get()?;
    let result = conn.query_row(
        "SELECT id, conversation_id, sender_id, content, message_type, media_url, created_at
         FROM messages
         WHERE conversation_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT 1",
        params![conversation_id],
        row_to_message,
    );

    match result {
        Ok(msg) => Ok(Some(msg)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn conversation_messages(pool: &DbPool, conversation_id: &str) -> Result<Vec<Message>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender_id, content, message_type, media_url, created_at
         FROM messages
         WHERE conversation_id = ?1
         ORDER BY created_at ASC, rowid ASC",
    )?;
    let messages = stmt
        .query_map(params![conversation_id], row_to_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(messages)
}
