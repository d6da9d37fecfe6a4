//! Remote cache store abstraction
//!
//! The phases only need three operations from a cache backend: restore an
//! archive by primary key (with prefix-matched fallbacks), save an archive
//! under a key, and delete an entry. Backends are chosen by configuration
//! through [`crate::backend::create_store`].

use crate::error::XcacheResult;
use async_trait::async_trait;
use std::path::Path;

/// Restores and saves cache archives
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Restore the archive for the first matching key into `archive`
    ///
    /// `primary_key` must match exactly; each of `restore_keys` is tried in
    /// order as a prefix. Returns the key that produced the hit.
    async fn restore(
        &self,
        archive: &Path,
        primary_key: &str,
        restore_keys: &[String],
    ) -> XcacheResult<Option<String>>;

    /// Save `archive` under `key`
    ///
    /// Fails with `CacheEntryExists` when the key is already taken.
    async fn save(&self, archive: &Path, key: &str) -> XcacheResult<()>;

    /// Get the human-readable backend name for display
    fn backend_name(&self) -> &'static str;

    /// Whether archives in the temp directory are the cache itself
    fn keeps_archives(&self) -> bool {
        false
    }
}

/// Deletes cache entries
#[async_trait]
pub trait EntryPruner: Send + Sync {
    /// Delete the entry stored under `key`
    ///
    /// Fails with `CacheEntryNotFound` when there is no such entry.
    async fn delete(&self, key: &str) -> XcacheResult<()>;
}
