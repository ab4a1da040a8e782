pub mod cache_entries;
pub mod conversations;
pub mod messages;
pub mod outbox;
pub mod pool;
pub mod schema;

pub use pool::DbPool;

use async_trait::async_trait;

use crate::error::Result;
use crate::sync::ports::{LocalStore, OutboxCounts};
use crate::types::{ConversationSyncMetadata, Message, OutboxItem};

/// [`LocalStore`] over the SQLite pool
///
/// Every call is a single statement (or one short transaction), so readers
/// on other connections never observe half-applied writes.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Register a conversation so every pass pulls it.
    pub fn ensure_conversation(&self, conversation_id: &str) -> Result<()> {
        conversations::ensure_conversation(&self.pool, conversation_id)
    }

    pub fn conversation_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        messages::conversation_messages(&self.pool, conversation_id)
    }

    pub fn outbox_item(&self, temp_id: &str) -> Result<Option<OutboxItem>> {
        outbox::get(&self.pool, temp_id)
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn enqueue_outbox(&self, item: &OutboxItem) -> Result<()> {
        conversations::ensure_conversation(&self.pool, &item.conversation_id)?;
        outbox::enqueue(&self.pool, item)?;
        Ok(())
    }

    async fn pending_outbox_items(&self) -> Result<Vec<OutboxItem>> {
        outbox::pending(&self.pool)
    }

    async fn delete_outbox_item(&self, temp_id: &str) -> Result<()> {
        outbox::delete(&self.pool, temp_id)
    }

    async fn increment_retry(&self, temp_id: &str, reason: &str) -> Result<()> {
        outbox::increment_retry(&self.pool, temp_id, reason)
    }

    async fn purge_exhausted_outbox(&self, max_retries: u32) -> Result<Vec<OutboxItem>> {
        outbox::purge_exhausted(&self.pool, max_retries)
    }

    async fn outbox_counts(&self) -> Result<OutboxCounts> {
        let (pending, failed) = outbox::counts(&self.pool)?;
        Ok(OutboxCounts { pending, failed })
    }

    async fn latest_message(&self, conversation_id: &str) -> Result<Option<Message>> {
        messages::latest_message(&self.pool, conversation_id)
    }

    async fn save_messages(&self, batch: &[Message]) -> Result<usize> {
        messages::insert_messages(&self.pool, batch)
    }

    async fn all_conversation_ids(&self) -> Result<Vec<String>> {
        conversations::all_conversation_ids(&self.pool)
    }

    async fn sync_metadata(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationSyncMetadata>> {
        conversations::get_sync_metadata(&self.pool, conversation_id)
    }

    async fn save_sync_metadata(&self, metadata: &ConversationSyncMetadata) -> Result<()> {
        conversations::save_sync_metadata(&self.pool, metadata)
    }
}
