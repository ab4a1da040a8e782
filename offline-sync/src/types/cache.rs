use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// TTL class of a cached asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    Avatar,
    Thumbnail,
    Image,
    Media,
    Document,
    Other,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::Thumbnail => "thumbnail",
            Self::Image => "image",
            Self::Media => "media",
            Self::Document => "document",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "avatar" => Self::Avatar,
            "thumbnail" => Self::Thumbnail,
            "image" => Self::Image,
            "media" => Self::Media,
            "document" => Self::Document,
            _ => Self::Other,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        match self {
            Self::Avatar => Duration::days(7),
            Self::Thumbnail => Duration::days(14),
            Self::Image => Duration::days(30),
            Self::Media => Duration::days(7),
            Self::Document => Duration::days(30),
            Self::Other => Duration::days(7),
        }
    }
}

/// Metadata row for one cached asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub cache_key: String,
    pub cache_type: CacheType,
    pub source_url: String,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u32,
    pub size_bytes: u64,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Current footprint of the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheUsage {
    pub entries: u64,
    pub bytes: u64,
}

/// Budget the maintenance pass evicts down to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheBudget {
    pub max_bytes: Option<u64>,
    pub max_entries: Option<u64>,
}

impl CacheBudget {
    pub fn is_exceeded_by(&self, usage: &CacheUsage) -> bool {
        self.max_bytes.is_some_and(|max| usage.bytes > max)
            || self.max_entries.is_some_and(|max| usage.entries > max)
    }
}
