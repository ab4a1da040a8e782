use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cache::AssetStore;
use crate::error::{Result, SyncError};

/// Cached asset bytes as plain files under one directory
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing a cache key. Keys are flattened to a safe file name.
    pub fn path_for(&self, cache_key: &str) -> PathBuf {
        let name: String = cache_key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
                _ => '_',
            })
            .collect();
        let name = name.trim_start_matches('.');
        let name = if name.is_empty() { "_" } else { name };
        self.root.join(name)
    }

    pub async fn write(&self, cache_key: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(cache_key);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn remove(&self, cache_key: &str) -> Result<()> {
        let path = self.path_for(cache_key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed cached asset {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Asset(format!(
                "Failed to remove {:?}: {}",
                path, e
            ))),
        }
    }
}
