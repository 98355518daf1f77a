//! Content-addressed disk store for fetched source bytes.
//!
//! One file per source URL, named by the SHA-256 hex digest of the URL with
//! an extension matching the upstream-declared format. Writes publish
//! atomically (temp file then rename) so a concurrent reader never observes
//! a partially written entry, and all mutation runs under a single lock so
//! eviction cannot race a write.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::domain::entities::{CacheKey, SourceFormat};
use crate::domain::errors::CacheError;

/// Default bound on the number of cache entries.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Disk-backed cache mapping source URLs to previously fetched raw bytes,
/// bounded to `max_entries` files with oldest-first eviction.
///
/// The cache is a best-effort performance optimization, not a source of
/// truth: every failure here is logged and degrades to no-cache behavior.
pub struct DiskCacheStore {
    cache_dir: PathBuf,
    max_entries: usize,
    write_lock: Mutex<()>,
}

impl DiskCacheStore {
    /// Creates a store rooted at `cache_dir`, creating the directory if
    /// needed.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created.
    pub async fn new(cache_dir: PathBuf, max_entries: usize) -> Result<Self, CacheError> {
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(CacheError::io)?;

        Ok(Self {
            cache_dir,
            max_entries,
            write_lock: Mutex::new(()),
        })
    }

    /// Looks up the entry for `key`, matching on the digest stem regardless
    /// of which format extension the entry was written with.
    pub async fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let mut entries = fs::read_dir(&self.cache_dir).await.ok()?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !is_entry_file(&path) {
                continue;
            }
            if path.file_stem().is_some_and(|stem| stem == key.as_hex()) {
                match fs::read(&path).await {
                    Ok(bytes) => {
                        trace!(key = %key, path = %path.display(), "Cache hit");
                        return Some(Bytes::from(bytes));
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to read cache entry");
                        return None;
                    }
                }
            }
        }

        trace!(key = %key, "Cache miss");
        None
    }

    /// Writes the entry for `key`, replacing any previous entry for the same
    /// URL (last-writer-wins), then enforces the entry bound by removing the
    /// oldest entries beyond it.
    ///
    /// # Errors
    /// Returns error if the entry cannot be written. Eviction failures are
    /// logged and ignored.
    pub async fn put(
        &self,
        key: &CacheKey,
        bytes: &[u8],
        format: SourceFormat,
    ) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;

        let final_path = self
            .cache_dir
            .join(format!("{}.{}", key.as_hex(), format.extension()));
        let tmp_path = self.cache_dir.join(format!(".{}.tmp", key.as_hex()));

        fs::write(&tmp_path, bytes).await.map_err(CacheError::io)?;

        // A re-fetch may declare a different format; drop the stale variant
        // so the key never resolves to two files.
        self.remove_stale_variants(key, &final_path).await;

        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(CacheError::io)?;

        debug!(key = %key, size = bytes.len(), path = %final_path.display(), "Stored cache entry");

        self.evict_excess().await;

        Ok(())
    }

    /// Number of entries currently in the store.
    pub async fn len(&self) -> usize {
        self.entry_files().await.len()
    }

    /// Returns true if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn remove_stale_variants(&self, key: &CacheKey, keep: &Path) {
        for (path, _) in self.entry_files().await {
            if path != keep && path.file_stem().is_some_and(|stem| stem == key.as_hex()) {
                if let Err(e) = fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "Failed to remove stale cache variant");
                }
            }
        }
    }

    /// Removes the oldest entries (by modification time) until the store is
    /// within its bound. Best-effort: removal failures are logged and
    /// skipped.
    async fn evict_excess(&self) {
        let mut files = self.entry_files().await;
        if files.len() <= self.max_entries {
            return;
        }

        files.sort_by_key(|(_, modified)| *modified);
        let excess = files.len() - self.max_entries;

        for (path, _) in files.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to evict cache entry");
            } else {
                debug!(path = %path.display(), "Evicted oldest cache entry");
            }
        }
    }

    async fn entry_files(&self) -> Vec<(PathBuf, SystemTime)> {
        let mut files = Vec::new();

        let Ok(mut entries) = fs::read_dir(&self.cache_dir).await else {
            return files;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !is_entry_file(&path) {
                continue;
            }
            if let Ok(meta) = entry.metadata().await {
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                files.push((path, modified));
            }
        }

        files
    }
}

/// Entry files are non-hidden regular names; in-flight temp files start with
/// a dot and are never counted or evicted.
fn is_entry_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| !n.starts_with('.'))
}
