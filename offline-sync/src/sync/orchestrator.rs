//! Sync pass orchestration
//!
//! A pass runs three stages in order:
//! 1. drain the outbox (local writes go up before remote reads come down)
//! 2. pull every known conversation, one at a time with a short pause
//! 3. best-effort prefetch
//!
//! Triggers come from the periodic timer, connectivity restoration and
//! explicit requests. At most one pass runs at a time; a trigger that
//! arrives while one is running is rejected, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::connectivity::ConnectivityMonitor;
use super::conversation::ConversationSyncer;
use super::outbox::OutboxProcessor;
use super::ports::{LocalStore, Prefetcher, RemoteApi};
use crate::clock::Clock;
use crate::config::SyncSettings;
use crate::error::Result;
use crate::logger::fmt_elapsed;
use crate::types::{OutboxReport, PassOutcome, PassReport, SyncStatus, SyncTrigger, TriggerOutcome};

/// Clears the in-progress flag when the pass ends, however it ends.
struct PassGuard(Arc<AtomicBool>);

impl PassGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncOrchestrator {
    store: Arc<dyn LocalStore>,
    outbox: OutboxProcessor,
    syncer: ConversationSyncer,
    prefetcher: Option<Arc<dyn Prefetcher>>,
    connectivity: Arc<ConnectivityMonitor>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    /// Last connectivity state this orchestrator acted on, for edge detection
    last_seen_online: AtomicBool,
    in_progress: Arc<AtomicBool>,
    last_pass: RwLock<Option<PassReport>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteApi>,
        connectivity: Arc<ConnectivityMonitor>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        let outbox = OutboxProcessor::new(store.clone(), remote.clone())
            .with_max_retries(settings.max_outbox_retries)
            .with_item_delay(settings.outbox_item_delay());
        let syncer = ConversationSyncer::new(store.clone(), remote, clock.clone())
            .with_page_size(settings.page_size)
            .with_max_pages(settings.max_pages_per_conversation);

        Self {
            store,
            outbox,
            syncer,
            prefetcher: None,
            last_seen_online: AtomicBool::new(connectivity.is_online()),
            connectivity,
            clock,
            settings,
            in_progress: Arc::new(AtomicBool::new(false)),
            last_pass: RwLock::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_prefetcher(mut self, prefetcher: Arc<dyn Prefetcher>) -> Self {
        self.prefetcher = Some(prefetcher);
        self
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.lock_tasks().is_empty()
    }

    /// Record a connectivity change. Coming back online triggers a pass.
    ///
    /// The pass is spawned, so this must be called inside a Tokio runtime.
    pub fn handle_connectivity_change(self: &Arc<Self>, online: bool) -> Option<TriggerOutcome> {
        let was_online = self.last_seen_online.swap(online, Ordering::SeqCst);
        match (was_online, online) {
            (false, true) => {
                info!("Back online, triggering sync");
                Some(self.trigger_sync(SyncTrigger::ConnectivityRestored))
            }
            (true, false) => {
                info!("Went offline, sync suspended");
                None
            }
            _ => None,
        }
    }

    /// Start a pass in the background and return immediately.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn trigger_sync(self: &Arc<Self>, trigger: SyncTrigger) -> TriggerOutcome {
        if !self.is_online() {
            debug!("Offline, ignoring {} sync trigger", trigger.as_str());
            return TriggerOutcome::Offline;
        }

        let Some(guard) = PassGuard::acquire(&self.in_progress) else {
            info!("Sync already in progress, rejecting {} trigger", trigger.as_str());
            return TriggerOutcome::Busy;
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            this.execute(trigger).await;
        });
        TriggerOutcome::Started
    }

    /// Run a pass to completion on the caller's task.
    pub async fn run_pass(&self, trigger: SyncTrigger) -> PassOutcome {
        if !self.is_online() {
            debug!("Offline, skipping {} sync pass", trigger.as_str());
            return PassOutcome::Offline;
        }

        let Some(_guard) = PassGuard::acquire(&self.in_progress) else {
            info!("Sync already in progress, rejecting {} pass", trigger.as_str());
            return PassOutcome::Busy;
        };

        PassOutcome::Completed(self.execute(trigger).await)
    }

    /// Pull one conversation now, outside of a pass.
    ///
    /// Offline this does nothing and reports zero new messages. Errors are
    /// returned to the caller rather than swallowed.
    pub async fn sync_conversation(&self, conversation_id: &str) -> Result<usize> {
        if !self.is_online() {
            debug!("Offline, not syncing conversation {}", conversation_id);
            return Ok(0);
        }
        self.syncer.sync_conversation(conversation_id).await
    }

    pub async fn status(&self) -> SyncStatus {
        let counts = match self.store.outbox_counts().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!("Failed to read outbox counts: {}", e);
                Default::default()
            }
        };
        let last_pass = self.last_pass.read().await.clone();

        SyncStatus {
            online: self.is_online(),
            in_progress: self.is_syncing(),
            interval_minutes: self.settings.interval_minutes,
            outbox_pending: counts.pending,
            outbox_failed: counts.failed,
            last_sync_at: last_pass.as_ref().map(|p| p.finished_at),
            last_pass,
        }
    }

    async fn execute(&self, trigger: SyncTrigger) -> PassReport {
        let started_at = self.clock.now();
        let timer = Instant::now();
        info!("Starting {} sync pass", trigger.as_str());

        let (outbox, outbox_error) = match self.outbox.process_outbox().await {
            Ok(report) => (report, None),
            Err(e) => {
                error!("Outbox stage failed: {}", e);
                (OutboxReport::default(), Some(e.to_string()))
            }
        };

        let conversation_ids = match self.store.all_conversation_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to list conversations: {}", e);
                Vec::new()
            }
        };

        let mut conversations_synced = 0;
        let mut conversations_failed = 0;
        let mut new_messages = 0;
        let delay = self.settings.conversation_delay();

        for (idx, conversation_id) in conversation_ids.iter().enumerate() {
            if idx > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.syncer.sync_conversation(conversation_id).await {
                Ok(stored) => {
                    conversations_synced += 1;
                    new_messages += stored as u32;
                }
                Err(e) => {
                    conversations_failed += 1;
                    warn!("Failed to sync conversation {}: {}", conversation_id, e);
                }
            }
        }

        if let Some(prefetcher) = &self.prefetcher {
            if let Err(e) = prefetcher.prefetch().await {
                warn!("Prefetch failed: {}", e);
            }
        }

        let report = PassReport {
            trigger,
            started_at,
            finished_at: self.clock.now(),
            outbox,
            outbox_error,
            conversations_synced,
            conversations_failed,
            new_messages,
        };

        info!(
            "{} sync pass finished in {}: {} sent, {} conversations synced, {} failed, {} new messages",
            trigger.as_str(),
            fmt_elapsed(timer.elapsed()),
            report.outbox.sent,
            conversations_synced,
            conversations_failed,
            new_messages
        );

        *self.last_pass.write().await = Some(report.clone());
        report
    }

    /// Start the periodic timer and the connectivity listener.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.lock_tasks();
        if !tasks.is_empty() {
            warn!("Sync orchestrator already started");
            return;
        }

        let changes = self.connectivity.subscribe();
        // A reconnect reported while stopped still counts as a transition.
        self.handle_connectivity_change(self.connectivity.is_online());

        let period = self.settings.interval();
        info!("Starting periodic sync every {} minutes", self.settings.interval_minutes);

        let weak: Weak<Self> = Arc::downgrade(self);
        tasks.push(tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(this) = weak.upgrade() else { break };
                let outcome = this.trigger_sync(SyncTrigger::Periodic);
                debug!("Periodic sync tick: {:?}", outcome);
            }
        }));

        let weak: Weak<Self> = Arc::downgrade(self);
        tasks.push(tokio::spawn(async move {
            while let Ok(change) = changes.recv_async().await {
                let Some(this) = weak.upgrade() else { break };
                this.handle_connectivity_change(change.online);
            }
            debug!("Connectivity listener stopped");
        }));
    }

    /// Stop timers and listeners. A pass already running finishes on its own.
    pub fn stop(&self) {
        let tasks: Vec<_> = self.lock_tasks().drain(..).collect();
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            task.abort();
        }
        info!("Sync orchestrator stopped");
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}
