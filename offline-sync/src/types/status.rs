use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What asked for a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Periodic timer tick
    Periodic,
    /// Offline to online transition
    ConnectivityRestored,
    /// Resume, pull-to-refresh, explicit retry
    Manual,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::ConnectivityRestored => "connectivity",
            Self::Manual => "manual",
        }
    }
}

/// Immediate answer to a fire-and-forget trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// A pass was started in the background
    Started,
    /// A pass is already running; the next tick covers this request
    Busy,
    /// No connectivity, nothing was done
    Offline,
}

/// Result of awaiting a pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "report", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed(PassReport),
    Busy,
    Offline,
}

/// Counters from one outbox drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxReport {
    pub attempted: u32,
    pub sent: u32,
    pub failed: u32,
    /// Items dropped after exhausting their retries
    pub purged: u32,
}

/// Summary of one sync pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub trigger: SyncTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outbox: OutboxReport,
    /// Set when the outbox stage itself could not run
    pub outbox_error: Option<String>,
    pub conversations_synced: u32,
    pub conversations_failed: u32,
    pub new_messages: u32,
}

/// Snapshot exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub online: bool,
    pub in_progress: bool,
    pub interval_minutes: u64,
    pub outbox_pending: u32,
    pub outbox_failed: u32,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_pass: Option<PassReport>,
}
