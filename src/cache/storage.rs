//! File-backed cache storage.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::traits::CacheKey;
use crate::config::CacheConfig;

/// File-backed response cache.
///
/// The store exclusively owns its directory. Each call opens, fully reads or
/// writes, and closes the entry file before returning, so no file handle ever
/// escapes this type; callers always receive owned byte buffers.
///
/// Calls for different keys may run concurrently. Two concurrent writers for
/// the same key are not coordinated: each write lands in a private temporary
/// file and is renamed into place, so a reader never sees a torn entry, but the
/// last rename wins.
#[derive(Debug, Clone)]
pub struct CacheStore {
  dir: PathBuf,
}

impl CacheStore {
  /// Open the store, creating the cache directory if it does not exist yet.
  pub fn open(config: &CacheConfig) -> io::Result<Self> {
    std::fs::create_dir_all(&config.dir)?;
    Ok(Self {
      dir: config.dir.clone(),
    })
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Path of the entry file for a key.
  pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
    self.dir.join(key.file_name())
  }

  /// Read a cached body. A missing entry is a miss, not an error.
  pub async fn get(&self, key: &CacheKey) -> io::Result<Option<Vec<u8>>> {
    let path = self.entry_path(key);
    match tokio::fs::read(&path).await {
      Ok(body) => {
        debug!(cache_file = %path.display(), "Loading response body from cache file");
        Ok(Some(body))
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e),
    }
  }

  /// Store a response body under a key, replacing any previous entry.
  pub async fn put(&self, key: &CacheKey, body: &[u8]) -> io::Result<()> {
    let path = self.entry_path(key);
    let tmp = self
      .dir
      .join(format!("{}.{:016x}.tmp", key.file_name(), rand::random::<u64>()));

    debug!(cache_file = %path.display(), "Storing response body into cache file");
    if let Err(e) = tokio::fs::write(&tmp, body).await {
      let _ = tokio::fs::remove_file(&tmp).await;
      return Err(e);
    }
    tokio::fs::rename(&tmp, &path).await
  }

  /// Delete an entry. Deleting an entry that does not exist succeeds.
  pub async fn invalidate(&self, key: &CacheKey) -> io::Result<()> {
    let path = self.entry_path(key);
    match tokio::fs::remove_file(&path).await {
      Ok(()) => {
        debug!(cache_file = %path.display(), "Cleared cache file");
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e),
    }
  }
}
