//! Cache lifecycle
//!
//! Two layers:
//! - [`CacheMetadataStore`] records what is cached, when it expires and how
//!   often it is read
//! - [`CacheEvictionPolicy`] runs the maintenance pass that extends hot
//!   entries, drops expired ones and evicts least-recently-used ones until
//!   the cache fits its budget
//!
//! Asset bytes live behind [`AssetStore`]; metadata is only removed once the
//! bytes are gone.

use async_trait::async_trait;

use crate::error::Result;

pub mod eviction;
pub mod metadata;

pub use eviction::{CacheEvictionPolicy, EvictionReport, HotPolicy};
pub use metadata::CacheMetadataStore;

/// Storage for cached asset bytes
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Delete the bytes for `cache_key`. Deleting a missing asset succeeds.
    async fn remove(&self, cache_key: &str) -> Result<()>;
}
