use std::sync::Arc;
use tracing::{debug, info};

use super::ports::{LocalStore, RemoteApi};
use crate::clock::Clock;
use crate::error::Result;
use crate::types::ConversationSyncMetadata;

/// Incremental pull of one conversation
///
/// The cursor is the newest locally stored message. Pages are fetched after
/// it and saved idempotently; sync metadata only moves when the remote
/// actually returned something.
pub struct ConversationSyncer {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteApi>,
    clock: Arc<dyn Clock>,
    page_size: u32,
    max_pages: u32,
}

impl ConversationSyncer {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteApi>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            remote,
            clock,
            page_size: 50,
            max_pages: 1,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Follow-up pages fetched while the remote keeps returning full pages.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Pull and store new messages. Returns how many were new locally.
    pub async fn sync_conversation(&self, conversation_id: &str) -> Result<usize> {
        let mut cursor = self
            .store
            .latest_message(conversation_id)
            .await?
            .map(|m| m.id);
        let mut newest = None;
        let mut has_more = false;
        let mut stored = 0;

        for _ in 0..self.max_pages {
            let page = self
                .remote
                .fetch_messages(conversation_id, cursor.as_deref(), self.page_size)
                .await?;
            let Some(last) = page.last() else {
                has_more = false;
                break;
            };

            cursor = Some(last.id.clone());
            newest = cursor.clone();
            has_more = page.len() as u32 >= self.page_size;
            stored += self.store.save_messages(&page).await?;

            if !has_more {
                break;
            }
        }

        if newest.is_none() {
            debug!("Conversation {} is up to date", conversation_id);
            return Ok(0);
        }

        self.store
            .save_sync_metadata(&ConversationSyncMetadata {
                conversation_id: conversation_id.to_string(),
                last_sync_at: self.clock.now(),
                last_message_id: newest,
                has_more,
            })
            .await?;

        info!("Stored {} new messages for conversation {}", stored, conversation_id);
        Ok(stored)
    }
}
