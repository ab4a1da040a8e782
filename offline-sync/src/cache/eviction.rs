use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{AssetStore, CacheMetadataStore};
use crate::config::CacheSettings;
use crate::error::Result;
use crate::types::{CacheBudget, CacheUsage};

/// Entries read at least `access_threshold` times are kept alive until at
/// least `extension` from the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotPolicy {
    pub access_threshold: u32,
    pub extension: Duration,
}

/// What one maintenance pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvictionReport {
    pub extended: u32,
    pub expired: u32,
    pub evicted: u32,
    pub freed_bytes: u64,
    /// Entries kept because their asset could not be removed
    pub skipped: u32,
    pub usage_after: CacheUsage,
}

/// Clears the running flag when a pass ends, including when its task is
/// aborted mid-pass.
struct MaintenanceGuard<'a>(&'a AtomicBool);

impl<'a> MaintenanceGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for MaintenanceGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Maintenance pass over the asset cache
///
/// Order within a pass: hot entries are extended first, then expired entries
/// are dropped, then least-recently-used entries are evicted while the cache
/// is over budget. Metadata for an entry is removed only after its asset.
pub struct CacheEvictionPolicy {
    metadata: Arc<CacheMetadataStore>,
    assets: Arc<dyn AssetStore>,
    budget: CacheBudget,
    hot: Option<HotPolicy>,
    batch_size: u32,
    running: AtomicBool,
}

impl CacheEvictionPolicy {
    pub fn new(
        metadata: Arc<CacheMetadataStore>,
        assets: Arc<dyn AssetStore>,
        budget: CacheBudget,
    ) -> Self {
        Self {
            metadata,
            assets,
            budget,
            hot: None,
            batch_size: 32,
            running: AtomicBool::new(false),
        }
    }

    pub fn from_settings(
        metadata: Arc<CacheMetadataStore>,
        assets: Arc<dyn AssetStore>,
        settings: &CacheSettings,
    ) -> Self {
        let budget = CacheBudget {
            max_bytes: settings.max_bytes,
            max_entries: settings.max_entries,
        };
        let hot = (settings.hot_access_threshold > 0).then(|| HotPolicy {
            access_threshold: settings.hot_access_threshold,
            extension: settings.hot_extension(),
        });

        Self {
            hot,
            batch_size: settings.lru_batch_size.max(1),
            ..Self::new(metadata, assets, budget)
        }
    }

    pub fn with_hot_policy(mut self, hot: HotPolicy) -> Self {
        self.hot = Some(hot);
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn budget(&self) -> CacheBudget {
        self.budget
    }

    pub fn metadata(&self) -> &Arc<CacheMetadataStore> {
        &self.metadata
    }

    /// Run one maintenance pass. Overlapping calls return an empty report.
    pub async fn run_eviction_pass(&self) -> Result<EvictionReport> {
        let Some(guard) = MaintenanceGuard::acquire(&self.running) else {
            debug!("Cache maintenance already running, skipping");
            return Ok(EvictionReport::default());
        };

        let result = self.maintain().await;
        drop(guard);

        match &result {
            Ok(report) => info!(
                "Cache maintenance: {} extended, {} expired, {} evicted ({} bytes freed), {} skipped",
                report.extended, report.expired, report.evicted, report.freed_bytes, report.skipped
            ),
            Err(e) => error!("Cache maintenance failed: {}", e),
        }
        result
    }

    async fn maintain(&self) -> Result<EvictionReport> {
        let mut report = EvictionReport::default();

        if let Some(hot) = self.hot {
            report.extended =
                self.metadata.extend_ttl(hot.access_threshold, hot.extension)? as u32;
        }

        let expired = self.metadata.expired_entries()?;
        let mut removed = Vec::with_capacity(expired.len());
        for entry in &expired {
            match self.assets.remove(&entry.cache_key).await {
                Ok(()) => removed.push(entry.cache_key.clone()),
                Err(e) => {
                    warn!("Keeping expired entry {}: {}", entry.cache_key, e);
                    report.skipped += 1;
                }
            }
        }
        report.expired = self.metadata.remove_metadata(&removed)? as u32;

        let mut usage = self.metadata.usage()?;
        let mut skipped: HashSet<String> = HashSet::new();

        while self.budget.is_exceeded_by(&usage) {
            let limit = self.batch_size.saturating_add(skipped.len() as u32);
            let candidates: Vec<_> = self
                .metadata
                .lru_candidates(limit)?
                .into_iter()
                .filter(|entry| !skipped.contains(&entry.cache_key))
                .collect();
            if candidates.is_empty() {
                warn!(
                    "Cache still over budget ({} entries, {} bytes) with nothing left to evict",
                    usage.entries, usage.bytes
                );
                break;
            }

            let mut evicted = Vec::new();
            for entry in candidates {
                if !self.budget.is_exceeded_by(&usage) {
                    break;
                }
                match self.assets.remove(&entry.cache_key).await {
                    Ok(()) => {
                        usage.entries = usage.entries.saturating_sub(1);
                        usage.bytes = usage.bytes.saturating_sub(entry.size_bytes);
                        report.freed_bytes += entry.size_bytes;
                        evicted.push(entry.cache_key);
                    }
                    Err(e) => {
                        warn!("Could not evict {}: {}", entry.cache_key, e);
                        report.skipped += 1;
                        skipped.insert(entry.cache_key);
                    }
                }
            }
            report.evicted += self.metadata.remove_metadata(&evicted)? as u32;
        }

        report.usage_after = self.metadata.usage()?;
        Ok(report)
    }

    /// Drop every cached asset and its metadata.
    pub async fn clear_cache(&self) -> Result<usize> {
        let entries = self.metadata.all()?;
        let mut removed = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.assets.remove(&entry.cache_key).await {
                Ok(()) => removed.push(entry.cache_key),
                Err(e) => warn!("Failed to remove cached asset {}: {}", entry.cache_key, e),
            }
        }

        let cleared = self.metadata.remove_metadata(&removed)?;
        info!("Cleared {} cache entries", cleared);
        Ok(cleared)
    }

    /// Run a maintenance pass every `period`, first one after one period.
    ///
    /// The task ends on its own once the policy is dropped.
    pub fn spawn_periodic(self: &Arc<Self>, period: std::time::Duration) -> JoinHandle<()> {
        let policy: Weak<Self> = Arc::downgrade(self);
        info!("Starting cache maintenance every {}s", period.as_secs());

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(policy) = policy.upgrade() else {
                    debug!("Cache policy dropped, stopping maintenance timer");
                    break;
                };
                let _ = policy.run_eviction_pass().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::pool;
    use crate::clock::{from_millis, ManualClock};
    use crate::testing::FakeAssets;
    use crate::types::CacheType;

    fn metadata() -> (Arc<CacheMetadataStore>, ManualClock) {
        let clock = ManualClock::new(from_millis(1_700_000_000_000));
        let store = CacheMetadataStore::new(
            pool::in_memory().unwrap(),
            Arc::new(clock.clone()),
            CacheSettings::default(),
        );
        (Arc::new(store), clock)
    }

    fn entry_budget(max_entries: u64) -> CacheBudget {
        CacheBudget {
            max_bytes: None,
            max_entries: Some(max_entries),
        }
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used_down_to_budget() {
        let (metadata, clock) = metadata();
        for i in 0..100 {
            metadata
                .record(&format!("img:{i:03}"), CacheType::Image, "u", None, Some(10))
                .unwrap();
            clock.advance(Duration::minutes(1));
        }
        // Reading the oldest entry makes it the most recent.
        metadata.record_access("img:000").unwrap();

        let assets = FakeAssets::new();
        let policy = CacheEvictionPolicy::new(metadata.clone(), assets.clone(), entry_budget(80))
            .with_batch_size(8);

        let report = policy.run_eviction_pass().await.unwrap();

        let expected: Vec<String> = (1..=20).map(|i| format!("img:{i:03}")).collect();
        assert_eq!(assets.removed(), expected);
        assert_eq!(report.evicted, 20);
        assert_eq!(report.freed_bytes, 200);
        assert_eq!(report.usage_after.entries, 80);
        assert!(metadata.get("img:000").unwrap().is_some());
        assert!(metadata.get("img:020").unwrap().is_none());
        assert!(metadata.get("img:021").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_within_budget_evicts_nothing() {
        let (metadata, _clock) = metadata();
        metadata.record("a", CacheType::Image, "u", None, Some(10)).unwrap();

        let assets = FakeAssets::new();
        let policy = CacheEvictionPolicy::new(metadata, assets.clone(), entry_budget(1));
        let report = policy.run_eviction_pass().await.unwrap();

        assert_eq!(report.evicted, 0);
        assert!(assets.removed().is_empty());
    }

    #[tokio::test]
    async fn test_hot_entry_survives_expiry() {
        let (metadata, clock) = metadata();
        metadata.record("hot", CacheType::Avatar, "u", None, None).unwrap();
        metadata.record("cold", CacheType::Avatar, "u", None, None).unwrap();
        for _ in 0..4 {
            metadata.record_access("hot").unwrap();
        }
        clock.advance(Duration::days(8));

        let assets = FakeAssets::new();
        let policy = CacheEvictionPolicy::new(metadata.clone(), assets.clone(), CacheBudget::default())
            .with_hot_policy(HotPolicy {
                access_threshold: 5,
                extension: Duration::days(7),
            });

        let report = policy.run_eviction_pass().await.unwrap();

        assert_eq!(report.extended, 1);
        assert_eq!(report.expired, 1);
        assert_eq!(assets.removed(), vec!["cold".to_string()]);
        assert!(!metadata.is_expired("hot").unwrap());
    }

    #[tokio::test]
    async fn test_hourly_passes_do_not_stack_hot_extensions() {
        let (metadata, clock) = metadata();
        let start = from_millis(1_700_000_000_000);
        metadata.record("hot", CacheType::Avatar, "u", None, None).unwrap();
        for _ in 0..4 {
            metadata.record_access("hot").unwrap();
        }

        let policy = CacheEvictionPolicy::new(metadata.clone(), FakeAssets::new(), CacheBudget::default())
            .with_hot_policy(HotPolicy {
                access_threshold: 5,
                extension: Duration::days(7),
            });

        for hour in 1..=24 {
            clock.advance(Duration::hours(1));
            let report = policy.run_eviction_pass().await.unwrap();
            assert_eq!(report.extended, 1);
            assert_eq!(
                metadata.get("hot").unwrap().unwrap().expires_at,
                start + Duration::hours(hour) + Duration::days(7)
            );
        }
    }

    #[tokio::test]
    async fn test_aborted_pass_does_not_block_later_passes() {
        let (metadata, _clock) = metadata();
        metadata
            .record("stale", CacheType::Image, "u", Some(Duration::zero()), None)
            .unwrap();

        let assets = FakeAssets::new();
        let _gate = assets.hold_removals();
        let policy = Arc::new(CacheEvictionPolicy::new(
            metadata.clone(),
            assets.clone(),
            CacheBudget::default(),
        ));

        let pass = tokio::spawn({
            let policy = policy.clone();
            async move { policy.run_eviction_pass().await }
        });
        assets.entered.notified().await;
        pass.abort();
        assert!(pass.await.unwrap_err().is_cancelled());

        assets.release_removals();
        let report = policy.run_eviction_pass().await.unwrap();

        assert_eq!(report.expired, 1);
        assert_eq!(assets.removed(), vec!["stale".to_string()]);
        assert!(metadata.get("stale").unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_maintenance_runs_once_per_period() {
        let (metadata, _clock) = metadata();
        metadata
            .record("stale", CacheType::Image, "u", Some(Duration::zero()), None)
            .unwrap();

        let assets = FakeAssets::new();
        let policy = Arc::new(CacheEvictionPolicy::new(
            metadata.clone(),
            assets.clone(),
            CacheBudget::default(),
        ));
        let period = std::time::Duration::from_secs(3600);
        let second = std::time::Duration::from_secs(1);
        let task = policy.spawn_periodic(period);

        tokio::time::sleep(period - second).await;
        assert!(assets.removed().is_empty());

        tokio::time::sleep(2 * second).await;
        assert_eq!(assets.removed(), vec!["stale".to_string()]);

        metadata
            .record("later", CacheType::Image, "u", Some(Duration::zero()), None)
            .unwrap();
        tokio::time::sleep(period).await;
        assert_eq!(assets.removed(), vec!["stale".to_string(), "later".to_string()]);

        // The timer only holds a weak reference.
        drop(policy);
        tokio::time::sleep(period).await;
        assert!(task.is_finished());
    }

    #[tokio::test]
    async fn test_failed_asset_removal_keeps_metadata() {
        let (metadata, clock) = metadata();
        for key in ["locked", "a", "b"] {
            metadata.record(key, CacheType::Image, "u", None, Some(1)).unwrap();
            clock.advance(Duration::minutes(1));
        }

        let assets = FakeAssets::new();
        assets.failing.lock().unwrap().insert("locked".to_string());
        let policy = CacheEvictionPolicy::new(metadata.clone(), assets.clone(), entry_budget(1))
            .with_batch_size(1);

        let report = policy.run_eviction_pass().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.evicted, 2);
        assert_eq!(assets.removed(), vec!["a".to_string(), "b".to_string()]);
        assert!(metadata.get("locked").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let (metadata, _clock) = metadata();
        metadata.record("a", CacheType::Image, "u", None, None).unwrap();
        metadata.record("b", CacheType::Document, "u", None, None).unwrap();

        let assets = FakeAssets::new();
        let policy = CacheEvictionPolicy::new(metadata.clone(), assets.clone(), CacheBudget::default());

        assert_eq!(policy.clear_cache().await.unwrap(), 2);
        assert_eq!(metadata.usage().unwrap().entries, 0);
        assert_eq!(assets.removed().len(), 2);
    }
}
