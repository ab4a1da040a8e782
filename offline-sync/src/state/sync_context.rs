//! Sync context
//!
//! Explicitly constructed owner of every sync and cache component. The host
//! builds one, hands it connectivity reports and lifecycle events, and
//! disposes it on shutdown.

use std::sync::Arc;
use tracing::info;

use crate::adapters::sqlite::{DbPool, SqliteStore};
use crate::cache::{AssetStore, CacheEvictionPolicy, CacheMetadataStore, EvictionReport};
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::sync::{
    AppLifecycleEvent, ConnectivityMedium, ConnectivityMonitor, LocalStore, Prefetcher, RemoteApi,
    SyncLifecycleManager, SyncOrchestrator,
};
use crate::types::{
    Message, MessageType, OutboxItem, PassOutcome, SyncStatus, SyncTrigger, TriggerOutcome,
};

/// Collaborators a context is assembled from
pub struct ContextParts {
    pub pool: DbPool,
    pub remote: Arc<dyn RemoteApi>,
    pub assets: Arc<dyn AssetStore>,
    pub clock: Arc<dyn Clock>,
    pub prefetcher: Option<Arc<dyn Prefetcher>>,
    /// Until the platform binding reports otherwise
    pub initially_online: bool,
}

pub struct SyncContext {
    config: SyncConfig,
    store: Arc<SqliteStore>,
    connectivity: Arc<ConnectivityMonitor>,
    lifecycle: Arc<SyncLifecycleManager>,
    cache: Arc<CacheMetadataStore>,
    eviction: Arc<CacheEvictionPolicy>,
}

impl SyncContext {
    /// Production wiring: SQLite file, HTTP remote, assets on disk.
    ///
    /// Starts offline; the platform binding is expected to report
    /// connectivity right after startup.
    #[cfg(feature = "http")]
    pub fn open(config: SyncConfig) -> Result<Self> {
        use crate::adapters::sqlite::pool;
        use crate::adapters::{FsAssetStore, HttpRemoteApi};
        use crate::clock::SystemClock;

        config.validate()?;
        info!("Sync database: {:?}", config.storage.db_path);
        info!("Asset cache directory: {:?}", config.storage.assets_dir);

        let parts = ContextParts {
            pool: pool::open(&config.storage.db_path)?,
            remote: Arc::new(HttpRemoteApi::new(&config.remote)?),
            assets: Arc::new(FsAssetStore::new(config.storage.assets_dir.clone())),
            clock: Arc::new(SystemClock),
            prefetcher: None,
            initially_online: false,
        };
        Ok(Self::new(config, parts))
    }

    pub fn new(config: SyncConfig, parts: ContextParts) -> Self {
        let store = Arc::new(SqliteStore::new(parts.pool.clone()));
        let connectivity = Arc::new(ConnectivityMonitor::new(parts.initially_online));

        let mut orchestrator = SyncOrchestrator::new(
            store.clone(),
            parts.remote,
            connectivity.clone(),
            parts.clock.clone(),
            config.sync.clone(),
        );
        if let Some(prefetcher) = parts.prefetcher {
            orchestrator = orchestrator.with_prefetcher(prefetcher);
        }

        let cache = Arc::new(CacheMetadataStore::new(
            parts.pool,
            parts.clock,
            config.cache.clone(),
        ));
        let eviction = Arc::new(CacheEvictionPolicy::from_settings(
            cache.clone(),
            parts.assets,
            &config.cache,
        ));

        let lifecycle = Arc::new(
            SyncLifecycleManager::new(config.clone(), Arc::new(orchestrator))
                .with_maintenance(eviction.clone(), config.cache.maintenance_interval()),
        );

        Self {
            config,
            store,
            connectivity,
            lifecycle,
            cache,
            eviction,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn lifecycle(&self) -> &Arc<SyncLifecycleManager> {
        &self.lifecycle
    }

    pub fn cache(&self) -> &Arc<CacheMetadataStore> {
        &self.cache
    }

    pub fn eviction(&self) -> &Arc<CacheEvictionPolicy> {
        &self.eviction
    }

    /// Start periodic sync and cache maintenance. Must run inside a Tokio
    /// runtime.
    pub fn start(&self) -> Result<()> {
        self.lifecycle.initialize()
    }

    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    pub fn dispose(&self) {
        self.lifecycle.dispose();
    }

    /// Must run inside a Tokio runtime: `Resumed` spawns a pass.
    pub fn handle_lifecycle(&self, event: AppLifecycleEvent) -> Option<TriggerOutcome> {
        self.lifecycle.handle_event(event)
    }

    pub fn listen_lifecycle(&self, events: flume::Receiver<AppLifecycleEvent>) {
        self.lifecycle.listen(events);
    }

    /// Forward a platform connectivity report. Returns true on a transition.
    pub fn report_connectivity(&self, mediums: &[ConnectivityMedium]) -> bool {
        self.connectivity.report(mediums)
    }

    /// Start a pass in the background.
    ///
    /// The pass is spawned onto the current Tokio runtime. Outside a runtime
    /// this returns an error instead of starting anything; use
    /// [`SyncContext::run_pass`] to drive a pass from your own executor.
    pub fn trigger_sync(&self, trigger: SyncTrigger) -> Result<TriggerOutcome> {
        let orchestrator = self.lifecycle.orchestrator()?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Other(format!("trigger_sync needs a Tokio runtime: {e}")))?;
        Ok(orchestrator.trigger_sync(trigger))
    }

    pub async fn run_pass(&self, trigger: SyncTrigger) -> Result<PassOutcome> {
        Ok(self.lifecycle.orchestrator()?.run_pass(trigger).await)
    }

    pub async fn sync_conversation(&self, conversation_id: &str) -> Result<usize> {
        self.lifecycle
            .orchestrator()?
            .sync_conversation(conversation_id)
            .await
    }

    pub async fn status(&self) -> Result<SyncStatus> {
        Ok(self.lifecycle.orchestrator()?.status().await)
    }

    /// Queue a composed message for the next pass.
    pub async fn enqueue_message(
        &self,
        conversation_id: &str,
        content: &str,
        message_type: MessageType,
        media_ref: Option<String>,
    ) -> Result<OutboxItem> {
        let item = OutboxItem::new(conversation_id, content, message_type, media_ref);
        self.store.enqueue_outbox(&item).await?;
        Ok(item)
    }

    /// Locally stored messages, oldest first.
    pub fn messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.store.conversation_messages(conversation_id)
    }

    pub async fn run_eviction_pass(&self) -> Result<EvictionReport> {
        self.eviction.run_eviction_pass().await
    }

    pub async fn clear_cache(&self) -> Result<usize> {
        self.eviction.clear_cache().await
    }
}
