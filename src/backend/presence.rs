//! Presence-only cache store for local debugging
//!
//! Nothing is uploaded or downloaded. A restore "hits" when the archive is
//! already sitting at the requested path, which lets the whole restore/store
//! cycle run on a laptop against a hand-placed `DerivedData.tar`.
//!
//! Hits report [`PRESENCE_RESTORED_KEY`] rather than the primary key, so the
//! following `store` still packs and saves instead of skipping.

use crate::backend::store::{CacheStore, EntryPruner};
use crate::error::{XcacheError, XcacheResult};
use async_trait::async_trait;
use std::path::Path;
use tracing::{error, info};

/// Key reported for every presence hit
pub const PRESENCE_RESTORED_KEY: &str = "restore-key";

/// Cache store that only checks for the archive on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceStore;

impl PresenceStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheStore for PresenceStore {
    async fn restore(
        &self,
        archive: &Path,
        _primary_key: &str,
        _restore_keys: &[String],
    ) -> XcacheResult<Option<String>> {
        if archive.exists() {
            info!("Debug: restore success: {}", archive.display());
            Ok(Some(PRESENCE_RESTORED_KEY.to_string()))
        } else {
            error!("Debug: restore failure: {}", archive.display());
            Ok(None)
        }
    }

    async fn save(&self, archive: &Path, _key: &str) -> XcacheResult<()> {
        if archive.exists() {
            info!("Debug: save success: {}", archive.display());
            Ok(())
        } else {
            Err(XcacheError::CacheBackend(format!("file not exist: {}", archive.display())))
        }
    }

    fn backend_name(&self) -> &'static str {
        "presence"
    }

    fn keeps_archives(&self) -> bool {
        true
    }
}

#[async_trait]
impl EntryPruner for PresenceStore {
    async fn delete(&self, key: &str) -> XcacheResult<()> {
        Err(XcacheError::CacheEntryNotFound { key: key.to_string() })
    }
}
