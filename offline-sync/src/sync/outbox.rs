//! Outbox drain
//!
//! Messages composed offline are queued locally with a temporary id and sent
//! here, oldest first. A successful send deletes the item. A failed send bumps
//! its retry count and records the reason; once an item reaches the retry
//! limit it is dropped and the loss is logged.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::ports::{LocalStore, RemoteApi};
use crate::error::Result;
use crate::types::OutboxReport;

pub const DEFAULT_MAX_RETRIES: u32 = 5;

pub struct OutboxProcessor {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteApi>,
    max_retries: u32,
    item_delay: Duration,
}

impl OutboxProcessor {
    pub fn new(store: Arc<dyn LocalStore>, remote: Arc<dyn RemoteApi>) -> Self {
        Self {
            store,
            remote,
            max_retries: DEFAULT_MAX_RETRIES,
            item_delay: Duration::ZERO,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Pause between consecutive sends.
    pub fn with_item_delay(mut self, item_delay: Duration) -> Self {
        self.item_delay = item_delay;
        self
    }

    /// Send every pending item once, then drop exhausted ones.
    ///
    /// Per-item failures are recorded on the item and never abort the drain.
    /// Only failing to read the queue itself is returned as an error.
    pub async fn process_outbox(&self) -> Result<OutboxReport> {
        let pending = self.store.pending_outbox_items().await?;
        let mut report = OutboxReport::default();

        if pending.is_empty() {
            debug!("Outbox is empty");
            return Ok(report);
        }

        info!("Sending {} pending outbox items", pending.len());

        for (idx, item) in pending.iter().enumerate() {
            if idx > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            report.attempted += 1;

            match self.remote.send_message(&item.to_outgoing()).await {
                Ok(sent) => {
                    info!(
                        "Outbox item {} delivered as message {}",
                        item.temp_id, sent.id
                    );
                    report.sent += 1;
                    if let Err(e) = self.store.delete_outbox_item(&item.temp_id).await {
                        error!("Failed to delete delivered outbox item {}: {}", item.temp_id, e);
                    }
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(
                            "Outbox item {} failed (attempt {}): {}",
                            item.temp_id,
                            item.retry_count + 1,
                            e
                        );
                    } else {
                        warn!(
                            "Outbox item {} rejected with a {} error (attempt {} of {}): {}",
                            item.temp_id,
                            e.kind(),
                            item.retry_count + 1,
                            self.max_retries,
                            e
                        );
                    }
                    report.failed += 1;
                    if let Err(store_err) =
                        self.store.increment_retry(&item.temp_id, &e.to_string()).await
                    {
                        error!(
                            "Failed to record retry for outbox item {}: {}",
                            item.temp_id, store_err
                        );
                    }
                }
            }
        }

        match self.store.purge_exhausted_outbox(self.max_retries).await {
            Ok(purged) => {
                for item in &purged {
                    error!(
                        "Dropping outbox item {} for conversation {} after {} attempts: {}",
                        item.temp_id,
                        item.conversation_id,
                        item.retry_count,
                        item.last_error.as_deref().unwrap_or("unknown error")
                    );
                }
                report.purged = purged.len() as u32;
            }
            Err(e) => error!("Failed to purge exhausted outbox items: {}", e),
        }

        info!(
            "Outbox drain finished: {} sent, {} failed, {} dropped",
            report.sent, report.failed, report.purged
        );
        Ok(report)
    }
}
