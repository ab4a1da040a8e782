//! App lifecycle wiring
//!
//! Owns the orchestrator and the cache maintenance timer for the lifetime of
//! the host app. Both start once configuration checks out; resume events
//! become a sync; termination tears everything down.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::orchestrator::SyncOrchestrator;
use crate::cache::CacheEvictionPolicy;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::types::{SyncTrigger, TriggerOutcome};

/// Foreground/background transitions reported by the host.
///
/// Hosts that distinguish "inactive" or "hidden" report them as `Paused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecycleEvent {
    Resumed,
    Paused,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Running,
    Stopped,
    Disposed,
}

pub struct SyncLifecycleManager {
    config: SyncConfig,
    orchestrator: Mutex<Option<Arc<SyncOrchestrator>>>,
    state: Mutex<LifecycleState>,
    listener: Mutex<Option<JoinHandle<()>>>,
    maintenance: Option<(Arc<CacheEvictionPolicy>, Duration)>,
    maintenance_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncLifecycleManager {
    pub fn new(config: SyncConfig, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            config,
            orchestrator: Mutex::new(Some(orchestrator)),
            state: Mutex::new(LifecycleState::Uninitialized),
            listener: Mutex::new(None),
            maintenance: None,
            maintenance_task: Mutex::new(None),
        }
    }

    /// Also run cache maintenance every `period` while initialized.
    pub fn with_maintenance(mut self, policy: Arc<CacheEvictionPolicy>, period: Duration) -> Self {
        self.maintenance = Some((policy, period));
        self
    }

    pub fn state(&self) -> LifecycleState {
        *self.lock_state()
    }

    pub fn orchestrator(&self) -> Result<Arc<SyncOrchestrator>> {
        self.orchestrator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(SyncError::NotInitialized)
    }

    /// Validate configuration and start background sync.
    ///
    /// Must be called from within a Tokio runtime. Calling it again while
    /// running is a no-op; after [`stop`](Self::stop) it restarts the timers.
    pub fn initialize(&self) -> Result<()> {
        let mut state = self.lock_state();
        match *state {
            LifecycleState::Running => {
                warn!("Sync lifecycle already initialized");
                return Ok(());
            }
            LifecycleState::Disposed => {
                warn!("Sync lifecycle was disposed, not initializing again");
                return Err(SyncError::NotInitialized);
            }
            LifecycleState::Uninitialized | LifecycleState::Stopped => {}
        }

        self.config.validate()?;

        let orchestrator = self.orchestrator()?;
        orchestrator.start();
        self.start_maintenance();

        if *state == LifecycleState::Uninitialized && self.config.sync.sync_on_start {
            let outcome = orchestrator.trigger_sync(SyncTrigger::Manual);
            debug!("Initial sync: {:?}", outcome);
        }

        *state = LifecycleState::Running;
        info!("Sync lifecycle initialized");
        Ok(())
    }

    /// Pause the timers without tearing anything down.
    pub fn stop(&self) {
        let mut state = self.lock_state();
        if *state != LifecycleState::Running {
            return;
        }
        if let Ok(orchestrator) = self.orchestrator() {
            orchestrator.stop();
        }
        self.stop_maintenance();
        *state = LifecycleState::Stopped;
    }

    fn start_maintenance(&self) {
        let Some((policy, period)) = &self.maintenance else {
            return;
        };
        let mut task = self.maintenance_task.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_none() {
            *task = Some(policy.spawn_periodic(*period));
        }
    }

    fn stop_maintenance(&self) {
        if let Some(task) = self
            .maintenance_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
            debug!("Cache maintenance timer stopped");
        }
    }

    /// Resumed syncs right away, Paused leaves timers running, Terminated
    /// disposes.
    pub fn handle_event(&self, event: AppLifecycleEvent) -> Option<TriggerOutcome> {
        debug!("App lifecycle event: {:?}", event);
        match event {
            AppLifecycleEvent::Resumed => {
                if !matches!(self.state(), LifecycleState::Running | LifecycleState::Stopped) {
                    debug!("Resumed before initialization, ignoring");
                    return None;
                }
                let orchestrator = self.orchestrator().ok()?;
                info!("App resumed, triggering sync");
                Some(orchestrator.trigger_sync(SyncTrigger::Manual))
            }
            AppLifecycleEvent::Paused => {
                debug!("App paused, sync timers keep running");
                None
            }
            AppLifecycleEvent::Terminated => {
                self.dispose();
                None
            }
        }
    }

    /// Feed host lifecycle events from a channel until it closes or the app
    /// terminates.
    pub fn listen(self: &Arc<Self>, events: flume::Receiver<AppLifecycleEvent>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Ok(event) = events.recv_async().await {
                let Some(this) = weak.upgrade() else { break };
                this.handle_event(event);
                if event == AppLifecycleEvent::Terminated {
                    break;
                }
            }
            debug!("Lifecycle listener stopped");
        });

        if let Some(previous) = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle)
        {
            previous.abort();
        }
    }

    /// Stop everything and release the orchestrator. Safe to call more than
    /// once, and before `initialize`.
    pub fn dispose(&self) {
        let mut state = self.lock_state();
        if *state == LifecycleState::Disposed {
            debug!("Sync lifecycle already disposed");
            return;
        }

        if let Some(orchestrator) = self
            .orchestrator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            orchestrator.stop();
        }
        self.stop_maintenance();

        // The listener may be the caller; it exits after a Terminated event.
        if let Some(listener) = self.listener.lock().unwrap_or_else(|e| e.into_inner()).take() {
            if !listener.is_finished() {
                listener.abort();
            }
        }

        *state = LifecycleState::Disposed;
        info!("Sync lifecycle disposed");
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{pool, SqliteStore};
    use crate::clock::SystemClock;
    use crate::sync::connectivity::ConnectivityMonitor;
    use crate::testing::FakeRemote;
    use std::time::Duration;

    fn config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.remote.base_url = Some("https://chat.example.com/api".to_string());
        config.remote.auth_token = Some("secret".to_string());
        config.sync.conversation_delay_ms = 0;
        config.sync.outbox_item_delay_ms = 0;
        config
    }

    fn manager(config: SyncConfig, online: bool) -> (Arc<SyncLifecycleManager>, Arc<FakeRemote>) {
        let store = Arc::new(SqliteStore::new(pool::in_memory().unwrap()));
        store.ensure_conversation("c1").unwrap();
        let remote = FakeRemote::new();
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store,
            remote.clone(),
            Arc::new(ConnectivityMonitor::new(online)),
            Arc::new(SystemClock),
            config.sync.clone(),
        ));
        (Arc::new(SyncLifecycleManager::new(config, orchestrator)), remote)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent_and_syncs_once() {
        let (manager, remote) = manager(config(), true);

        manager.initialize().unwrap();
        manager.initialize().unwrap();
        assert_eq!(manager.state(), LifecycleState::Running);

        tokio::time::timeout(Duration::from_secs(5), remote.entered.notified())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(remote.fetch_count(), 1);

        manager.dispose();
    }

    #[tokio::test]
    async fn test_invalid_config_aborts_initialize() {
        let mut config = config();
        config.remote.base_url = None;
        let (manager, _remote) = manager(config, true);

        assert!(matches!(manager.initialize(), Err(SyncError::Config(_))));
        assert_eq!(manager.state(), LifecycleState::Uninitialized);
    }

    #[tokio::test]
    async fn test_dispose_without_initialize_is_safe() {
        let (manager, _remote) = manager(config(), true);
        manager.dispose();
        manager.dispose();

        assert_eq!(manager.state(), LifecycleState::Disposed);
        assert!(matches!(manager.orchestrator(), Err(SyncError::NotInitialized)));
        assert!(manager.initialize().is_err());
    }

    #[tokio::test]
    async fn test_resume_triggers_manual_sync() {
        let mut config = config();
        config.sync.sync_on_start = false;
        let (manager, remote) = manager(config, true);

        assert_eq!(manager.handle_event(AppLifecycleEvent::Resumed), None);
        manager.initialize().unwrap();
        assert_eq!(remote.fetch_count(), 0);

        assert_eq!(
            manager.handle_event(AppLifecycleEvent::Resumed),
            Some(TriggerOutcome::Started)
        );
        assert_eq!(manager.handle_event(AppLifecycleEvent::Paused), None);
        tokio::time::timeout(Duration::from_secs(5), remote.entered.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_terminated_event_disposes() {
        let (manager, _remote) = manager(config(), false);
        manager.initialize().unwrap();
        let orchestrator = manager.orchestrator().unwrap();
        assert!(orchestrator.is_running());

        let (tx, rx) = flume::unbounded();
        manager.listen(rx);
        tx.send(AppLifecycleEvent::Terminated).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.state() != LifecycleState::Disposed {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(!orchestrator.is_running());
    }
}
