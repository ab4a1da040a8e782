use rusqlite::Connection;

use crate::error::Result;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Conversations known to this device
        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY,
            created_at      INTEGER NOT NULL    -- unix epoch ms
        );

        -- Local copy of remote messages
        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,   -- server id
            conversation_id TEXT NOT NULL,
            sender_id       TEXT,
            content         TEXT NOT NULL,
            message_type    TEXT NOT NULL,
            media_url       TEXT,
            created_at      INTEGER NOT NULL,   -- unix epoch ms
            stored_at       INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at DESC);

        -- Client messages not yet accepted by the server
        CREATE TABLE IF NOT EXISTS outbox (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,  -- enqueue order
            temp_id         TEXT NOT NULL UNIQUE,
            conversation_id TEXT NOT NULL,
            content         TEXT NOT NULL,
            message_type    TEXT NOT NULL,
            media_ref       TEXT,
            retry_count     INTEGER NOT NULL DEFAULT 0,
            last_error      TEXT,
            created_at      INTEGER NOT NULL
        );

        -- Pull cursor per conversation
        CREATE TABLE IF NOT EXISTS conversation_sync (
            conversation_id TEXT PRIMARY KEY,
            last_sync_at    INTEGER NOT NULL,
            last_message_id TEXT,
            has_more        INTEGER NOT NULL DEFAULT 0
        );

        -- Cached asset TTL / recency / size
        CREATE TABLE IF NOT EXISTS cache_metadata (
            cache_key        TEXT PRIMARY KEY,
            cache_type       TEXT NOT NULL,
            url              TEXT NOT NULL,
            cached_at        INTEGER NOT NULL,
            expires_at       INTEGER NOT NULL,
            last_accessed_at INTEGER NOT NULL,
            access_count     INTEGER NOT NULL DEFAULT 1,
            size_bytes       INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_cache_expires  ON cache_metadata(expires_at);
        CREATE INDEX IF NOT EXISTS idx_cache_accessed ON cache_metadata(last_accessed_at);
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creation_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for table in ["conversations", "messages", "outbox", "conversation_sync", "cache_metadata"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }
}
