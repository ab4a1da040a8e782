//! Process-wide state
//!
//! The host creates one [`SyncContext`] and keeps it for the life of the
//! app; nothing here is a global.

mod sync_context;

pub use sync_context::{ContextParts, SyncContext};
