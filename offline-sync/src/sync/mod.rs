//! Sync track
//!
//! - `ports`: traits for the local store, remote API and prefetcher
//! - `outbox`: sends locally queued messages with bounded retries
//! - `conversation`: incremental pull of one conversation
//! - `connectivity`: online/offline state and transition events
//! - `orchestrator`: single-flight sync passes and the periodic timer
//! - `lifecycle`: start, resume and teardown driven by the host app

pub mod connectivity;
pub mod conversation;
pub mod lifecycle;
pub mod orchestrator;
pub mod outbox;
pub mod ports;

pub use connectivity::{ConnectivityChange, ConnectivityMedium, ConnectivityMonitor};
pub use conversation::ConversationSyncer;
pub use lifecycle::{AppLifecycleEvent, LifecycleState, SyncLifecycleManager};
pub use orchestrator::SyncOrchestrator;
pub use outbox::OutboxProcessor;
pub use ports::{LocalStore, OutboxCounts, Prefetcher, RemoteApi};
