use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::error::{Result, SyncError};
use crate::types::CacheType;

/// Sync subsystem configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote API endpoint and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the messaging API
    pub base_url: Option<String>,

    /// Bearer token sent with every request
    pub auth_token: Option<String>,

    /// Per-request transport timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Message sync tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Periodic trigger interval
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Pause between two conversation pulls
    #[serde(default = "default_conversation_delay_ms")]
    pub conversation_delay_ms: u64,

    /// Pause between two outbox sends
    #[serde(default = "default_outbox_item_delay_ms")]
    pub outbox_item_delay_ms: u64,

    /// Outbox items reaching this many failures are dropped
    #[serde(default = "default_max_outbox_retries")]
    pub max_outbox_retries: u32,

    /// Messages requested per pull
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Full pages followed per conversation in one pass
    #[serde(default = "default_max_pages")]
    pub max_pages_per_conversation: u32,

    /// Run a pass as soon as the subsystem is initialized
    #[serde(default = "default_true")]
    pub sync_on_start: bool,
}

/// Asset cache budget and TTL policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Byte budget for cached assets (None = unbounded)
    #[serde(default = "default_max_bytes")]
    pub max_bytes: Option<u64>,

    /// Entry budget for cached assets (None = unbounded)
    #[serde(default)]
    pub max_entries: Option<u64>,

    /// Maintenance timer interval
    #[serde(default = "default_maintenance_interval_minutes")]
    pub maintenance_interval_minutes: u64,

    /// LRU candidates fetched per round
    #[serde(default = "default_lru_batch_size")]
    pub lru_batch_size: u32,

    /// Entries accessed at least this often get their TTL extended (0 = off)
    #[serde(default = "default_hot_access_threshold")]
    pub hot_access_threshold: u32,

    /// How far a hot entry's expiry is pushed
    #[serde(default = "default_hot_extension_hours")]
    pub hot_extension_hours: u64,

    /// TTL overrides, keyed by cache type name
    #[serde(default)]
    pub ttl_hours: HashMap<String, u64>,
}

/// Database and asset locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// EnvFilter directive, used when RUST_LOG is unset
    pub filter: Option<String>,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_interval_minutes() -> u64 {
    5
}

fn default_conversation_delay_ms() -> u64 {
    100
}

fn default_outbox_item_delay_ms() -> u64 {
    50
}

fn default_max_outbox_retries() -> u32 {
    5
}

fn default_page_size() -> u32 {
    50
}

fn default_max_pages() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_max_bytes() -> Option<u64> {
    Some(500 * 1024 * 1024)
}

fn default_maintenance_interval_minutes() -> u64 {
    60
}

fn default_lru_batch_size() -> u32 {
    32
}

fn default_hot_access_threshold() -> u32 {
    5
}

fn default_hot_extension_hours() -> u64 {
    7 * 24
}

/// Base data directory
///
/// On mobile the CWD is read-only, so data_dir() is used there.
fn data_dir() -> PathBuf {
    #[cfg(any(target_os = "ios", target_os = "android"))]
    let base = dirs::data_dir();

    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    let base = dirs::data_local_dir();

    base.unwrap_or_else(|| PathBuf::from(".")).join("offline-sync")
}

fn default_db_path() -> PathBuf {
    data_dir().join("sync.db")
}

fn default_assets_dir() -> PathBuf {
    data_dir().join("assets")
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            conversation_delay_ms: default_conversation_delay_ms(),
            outbox_item_delay_ms: default_outbox_item_delay_ms(),
            max_outbox_retries: default_max_outbox_retries(),
            page_size: default_page_size(),
            max_pages_per_conversation: default_max_pages(),
            sync_on_start: true,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            max_entries: None,
            maintenance_interval_minutes: default_maintenance_interval_minutes(),
            lru_batch_size: default_lru_batch_size(),
            hot_access_threshold: default_hot_access_threshold(),
            hot_extension_hours: default_hot_extension_hours(),
            ttl_hours: HashMap::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            assets_dir: default_assets_dir(),
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn conversation_delay(&self) -> Duration {
        Duration::from_millis(self.conversation_delay_ms)
    }

    pub fn outbox_item_delay(&self) -> Duration {
        Duration::from_millis(self.outbox_item_delay_ms)
    }
}

impl CacheSettings {
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_minutes * 60)
    }

    pub fn hot_extension(&self) -> chrono::Duration {
        chrono::Duration::hours(self.hot_extension_hours as i64)
    }

    /// TTL for a cache type, honouring configured overrides.
    pub fn ttl_for(&self, cache_type: &CacheType) -> chrono::Duration {
        match self.ttl_hours.get(cache_type.as_str()) {
            Some(hours) => chrono::Duration::hours(*hours as i64),
            None => cache_type.default_ttl(),
        }
    }
}

impl SyncConfig {
    /// Load from the first existing default path, or fall back to defaults.
    pub fn load() -> Result<Self> {
        for path in default_config_paths() {
            if path.exists() {
                info!("Found config at: {:?}", path);
                return Self::from_path(&path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {:?}", path);

        let content = fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SyncError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Reject configurations the subsystem cannot start with.
    pub fn validate(&self) -> Result<()> {
        let base_url = self
            .remote
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SyncError::Config("remote.base_url is not set".to_string()))?;
        Url::parse(base_url)?;

        if self
            .remote
            .auth_token
            .as_deref()
            .map_or(true, |t| t.trim().is_empty())
        {
            return Err(SyncError::Config(
                "remote.auth_token is not set".to_string(),
            ));
        }

        if self.sync.interval_minutes == 0 {
            return Err(SyncError::Config(
                "sync.interval_minutes must be greater than zero".to_string(),
            ));
        }

        if self.sync.page_size == 0 {
            return Err(SyncError::Config(
                "sync.page_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Get default config paths
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("offline-sync").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(
            home_dir
                .join(".config")
                .join("offline-sync")
                .join("config.toml"),
        );
        paths.push(home_dir.join(".offline-sync.toml"));
    }

    paths
}
