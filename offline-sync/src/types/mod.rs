//! Data structures shared across the sync and cache tracks

pub mod cache;
pub mod message;
pub mod status;

pub use cache::{CacheBudget, CacheEntry, CacheType, CacheUsage};
pub use message::{ConversationSyncMetadata, Message, MessageType, OutboxItem, OutgoingMessage};
pub use status::{
    OutboxReport, PassOutcome, PassReport, SyncStatus, SyncTrigger, TriggerOutcome,
};
