//! Unified error type for the sync subsystem
//!
//! Every stage maps its failures onto [`SyncError`]. Payloads are plain
//! strings so the error can be cloned into status snapshots and logged
//! without holding on to driver-specific types.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Timeout, refused connection, connectivity loss
    #[error("Network error: {0}")]
    Network(String),

    /// The remote rejected the payload (4xx)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote failed to process a well-formed request (5xx, bad reply)
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Asset error: {0}")]
    Asset(String),

    #[error("Sync subsystem is not initialized")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Short tag used as a prefix when persisting the failure reason.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Validation(_) => "validation",
            Self::Remote(_) => "remote",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Parse(_) => "parse",
            Self::Asset(_) => "asset",
            Self::NotInitialized => "not_initialized",
            Self::Other(_) => "other",
        }
    }
}

// Serialize as a plain string so status snapshots stay readable.
impl Serialize for SyncError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        SyncError::Database(e.to_string())
    }
}

impl From<r2d2::Error> for SyncError {
    fn from(e: r2d2::Error) -> Self {
        SyncError::Database(e.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(e: toml::de::Error) -> Self {
        SyncError::Config(e.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(e: url::ParseError) -> Self {
        SyncError::Config(format!("Invalid URL: {}", e))
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            return SyncError::Network(e.to_string());
        }

        match e.status() {
            Some(status) if status.is_client_error() => SyncError::Validation(e.to_string()),
            Some(_) => SyncError::Remote(e.to_string()),
            None if e.is_decode() => SyncError::Parse(e.to_string()),
            None => SyncError::Network(e.to_string()),
        }
    }
}

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;
