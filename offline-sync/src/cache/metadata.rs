use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info};

use crate::adapters::sqlite::{cache_entries, DbPool};
use crate::clock::{to_millis, Clock};
use crate::config::CacheSettings;
use crate::error::Result;
use crate::types::{CacheEntry, CacheType, CacheUsage};

/// Expiry and access bookkeeping for cached assets
pub struct CacheMetadataStore {
    pool: DbPool,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
}

impl CacheMetadataStore {
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>, settings: CacheSettings) -> Self {
        Self {
            pool,
            clock,
            settings,
        }
    }

    /// Record (or re-record) a freshly cached asset.
    ///
    /// `ttl` defaults to the configured TTL for the cache type. Re-recording a
    /// key replaces the whole row, so its access count starts over at one.
    pub fn record(
        &self,
        cache_key: &str,
        cache_type: CacheType,
        source_url: &str,
        ttl: Option<Duration>,
        size_bytes: Option<u64>,
    ) -> Result<CacheEntry> {
        let now = self.clock.now();
        let ttl = ttl.unwrap_or_else(|| self.settings.ttl_for(&cache_type));

        let entry = CacheEntry {
            cache_key: cache_key.to_string(),
            cache_type,
            source_url: source_url.to_string(),
            cached_at: now,
            expires_at: now + ttl,
            last_accessed_at: now,
            access_count: 1,
            size_bytes: size_bytes.unwrap_or(0),
        };
        cache_entries::upsert(&self.pool, &entry)?;

        debug!(
            "Recorded {} cache entry {} (expires {})",
            entry.cache_type.as_str(),
            cache_key,
            entry.expires_at
        );
        Ok(entry)
    }

    /// Note a read. Returns false when the key was never recorded.
    pub fn record_access(&self, cache_key: &str) -> Result<bool> {
        cache_entries::touch(&self.pool, cache_key, to_millis(self.clock.now()))
    }

    /// Unknown keys count as expired so callers refetch them.
    pub fn is_expired(&self, cache_key: &str) -> Result<bool> {
        let now = self.clock.now();
        Ok(match cache_entries::get(&self.pool, cache_key)? {
            Some(entry) => entry.is_expired_at(now),
            None => true,
        })
    }

    pub fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>> {
        cache_entries::get(&self.pool, cache_key)
    }

    pub fn all(&self) -> Result<Vec<CacheEntry>> {
        cache_entries::all(&self.pool)
    }

    pub fn expired_entries(&self) -> Result<Vec<CacheEntry>> {
        cache_entries::expired(&self.pool, to_millis(self.clock.now()))
    }

    /// Up to `limit` entries, least recently accessed first.
    pub fn lru_candidates(&self, limit: u32) -> Result<Vec<CacheEntry>> {
        cache_entries::least_recently_used(&self.pool, limit)
    }

    pub fn remove_metadata(&self, cache_keys: &[String]) -> Result<usize> {
        let removed = cache_entries::delete_many(&self.pool, cache_keys)?;
        debug!("Removed {} cache metadata rows", removed);
        Ok(removed)
    }

    /// Keep entries read at least `access_threshold` times alive until at
    /// least `extension` from now.
    ///
    /// Expiry only ever moves forward, to `now + extension`, so repeating the
    /// call does not stack extensions. Returns how many entries moved.
    pub fn extend_ttl(&self, access_threshold: u32, extension: Duration) -> Result<usize> {
        let until = self.clock.now() + extension;
        let extended = cache_entries::extend_hot(&self.pool, access_threshold, to_millis(until))?;
        if extended > 0 {
            info!("Extended TTL of {} hot cache entries to {}", extended, until);
        }
        Ok(extended)
    }

    pub fn usage(&self) -> Result<CacheUsage> {
        cache_entries::usage(&self.pool)
    }

    pub fn clear(&self) -> Result<usize> {
        let removed = cache_entries::clear(&self.pool)?;
        info!("Cleared {} cache metadata rows", removed);
        Ok(removed)
    }
}
