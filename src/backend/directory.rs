//! Directory-backed cache store
//!
//! Every entry is one archive file under the store root, named after the hex
//! encoding of its key. Hex keeps key prefixes as file-name prefixes, so
//! fallback keys can be prefix-matched by listing the directory.

use crate::backend::store::{CacheStore, EntryPruner};
use crate::error::{XcacheError, XcacheResult};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info, warn};

const ENTRY_EXTENSION: &str = "tar";

/// Cache store persisted in a local (or mounted) directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", hex::encode(key), ENTRY_EXTENSION))
    }

    /// Newest entry whose key starts with `prefix`
    async fn find_prefixed(&self, prefix: &str) -> XcacheResult<Option<(String, PathBuf)>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(XcacheError::io(format!("listing {}", self.root.display()), e)),
        };

        let hex_prefix = hex::encode(prefix);
        let mut best: Option<(SystemTime, String, PathBuf)> = None;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| XcacheError::io(format!("listing {}", self.root.display()), e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !stem.starts_with(&hex_prefix) {
                continue;
            }
            let Some(key) = hex::decode(stem).ok().and_then(|b| String::from_utf8(b).ok()) else {
                continue;
            };
            let modified = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            if best.as_ref().is_none_or(|(newest, _, _)| modified > *newest) {
                best = Some((modified, key, path));
            }
        }

        Ok(best.map(|(_, key, path)| (key, path)))
    }

    async fn entry_exists(path: &Path) -> XcacheResult<bool> {
        fs::try_exists(path)
            .await
            .map_err(|e| XcacheError::io(format!("checking {}", path.display()), e))
    }

    async fn copy_out(&self, entry: &Path, archive: &Path) -> XcacheResult<()> {
        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| XcacheError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::copy(entry, archive)
            .await
            .map_err(|e| XcacheError::io(format!("copying {} to {}", entry.display(), archive.display()), e))?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for DirectoryStore {
    async fn restore(
        &self,
        archive: &Path,
        primary_key: &str,
        restore_keys: &[String],
    ) -> XcacheResult<Option<String>> {
        let exact = self.entry_path(primary_key);
        if Self::entry_exists(&exact).await? {
            debug!("Exact cache hit: {}", primary_key);
            self.copy_out(&exact, archive).await?;
            return Ok(Some(primary_key.to_string()));
        }

        for prefix in restore_keys {
            if let Some((key, entry)) = self.find_prefixed(prefix).await? {
                debug!("Cache hit for restore key {}: {}", prefix, key);
                self.copy_out(&entry, archive).await?;
                return Ok(Some(key));
            }
        }

        Ok(None)
    }

    async fn save(&self, archive: &Path, key: &str) -> XcacheResult<()> {
        let target = self.entry_path(key);
        if Self::entry_exists(&target).await? {
            return Err(XcacheError::CacheEntryExists { key: key.to_string() });
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| XcacheError::io(format!("creating {}", self.root.display()), e))?;

        // Write next to the target, then rename, so readers never see a partial entry
        let partial = self
            .root
            .join(format!(".{}.partial-{}", hex::encode(key), std::process::id()));
        fs::copy(archive, &partial)
            .await
            .map_err(|e| XcacheError::io(format!("copying {} to {}", archive.display(), partial.display()), e))?;

        if Self::entry_exists(&target).await? {
            if let Err(e) = fs::remove_file(&partial).await {
                warn!("Failed to remove {}: {}", partial.display(), e);
            }
            return Err(XcacheError::CacheEntryExists { key: key.to_string() });
        }
        fs::rename(&partial, &target)
            .await
            .map_err(|e| XcacheError::io(format!("finalizing cache entry {}", target.display()), e))?;

        info!("Cache saved with key: {}", key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "directory"
    }
}

#[async_trait]
impl EntryPruner for DirectoryStore {
    async fn delete(&self, key: &str) -> XcacheResult<()> {
        let target = self.entry_path(key);
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(XcacheError::CacheEntryNotFound { key: key.to_string() })
            }
            Err(e) => Err(XcacheError::io(format!("deleting cache entry {}", target.display()), e)),
        }
    }
}
