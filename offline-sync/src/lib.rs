//! Offline-first sync and cache lifecycle
//!
//! Keeps a local message store in step with a remote messaging server and
//! keeps the on-device asset cache inside its budget.
//!
//! ## Module Organization
//!
//! - `sync/`: outbox drain, conversation pull, connectivity, orchestration,
//!   app lifecycle
//! - `cache/`: asset cache metadata and the eviction policy
//! - `adapters/`: SQLite store, HTTP remote, filesystem assets
//! - `state/`: the [`SyncContext`] that owns everything
//! - `types/`: data structures shared by both tracks
//! - `config/`: TOML configuration
//!
//! ```rust,no_run
//! use offline_sync::{ConnectivityMedium, SyncConfig, SyncContext};
//!
//! # async fn run() -> offline_sync::Result<()> {
//! let config = SyncConfig::load()?;
//! offline_sync::logger::init(config.logging.filter.as_deref());
//!
//! let context = SyncContext::open(config)?;
//! context.start()?;
//! context.report_connectivity(&[ConnectivityMedium::Wifi]);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod logger;
pub mod state;
pub mod sync;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{AssetStore, CacheEvictionPolicy, CacheMetadataStore, EvictionReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use state::{ContextParts, SyncContext};
pub use sync::{
    AppLifecycleEvent, ConnectivityMedium, ConnectivityMonitor, LocalStore, Prefetcher, RemoteApi,
    SyncLifecycleManager, SyncOrchestrator,
};
pub use types::{
    CacheBudget, CacheEntry, CacheType, CacheUsage, ConversationSyncMetadata, Message,
    MessageType, OutboxItem, OutboxReport, OutgoingMessage, PassOutcome, PassReport, SyncStatus,
    SyncTrigger, TriggerOutcome,
};
