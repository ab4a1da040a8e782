//! Collaborators the sync track talks to
//!
//! The orchestrator only sees these traits, never a concrete database,
//! transport or platform binding.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ConversationSyncMetadata, Message, OutboxItem, OutgoingMessage};

/// Outbox counters for status snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxCounts {
    pub pending: u32,
    /// Pending items that failed at least once
    pub failed: u32,
}

/// Local persistent store shared with UI readers
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn enqueue_outbox(&self, item: &OutboxItem) -> Result<()>;

    /// Pending items, oldest enqueued first
    async fn pending_outbox_items(&self) -> Result<Vec<OutboxItem>>;

    async fn delete_outbox_item(&self, temp_id: &str) -> Result<()>;

    async fn increment_retry(&self, temp_id: &str, reason: &str) -> Result<()>;

    /// Delete and return items whose retry count reached `max_retries`
    async fn purge_exhausted_outbox(&self, max_retries: u32) -> Result<Vec<OutboxItem>>;

    async fn outbox_counts(&self) -> Result<OutboxCounts>;

    async fn latest_message(&self, conversation_id: &str) -> Result<Option<Message>>;

    /// Idempotent on message id; returns the number of new rows
    async fn save_messages(&self, messages: &[Message]) -> Result<usize>;

    async fn all_conversation_ids(&self) -> Result<Vec<String>>;

    async fn sync_metadata(&self, conversation_id: &str)
        -> Result<Option<ConversationSyncMetadata>>;

    async fn save_sync_metadata(&self, metadata: &ConversationSyncMetadata) -> Result<()>;
}

/// Remote messaging API
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message>;

    /// Messages strictly after `after_id` (from the beginning when None)
    async fn fetch_messages(
        &self,
        conversation_id: &str,
        after_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Message>>;
}

/// Low-priority warm-up of read-mostly content, run at the end of a pass
#[async_trait]
pub trait Prefetcher: Send + Sync {
    async fn prefetch(&self) -> Result<()>;
}
