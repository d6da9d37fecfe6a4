//! Cache-key coordination
//!
//! Decides, per domain, whether the store phase has anything to upload and
//! carries the save out against the backend:
//!
//! - restored key == primary key: the remote entry is already current, skip
//! - otherwise pack and save under the primary key
//! - a concurrent writer winning the key is a warning, not a failure
//! - with pruning enabled, the entry the run restored from is deleted after
//!   the save (a missing entry is only logged)

use crate::backend::store::{CacheStore, EntryPruner};
use crate::error::{XcacheError, XcacheResult};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Independently keyed cache domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheDomain {
    /// Build products
    DerivedData,
    /// Resolved package checkouts
    SourcePackages,
}

impl CacheDomain {
    pub const ALL: [CacheDomain; 2] = [CacheDomain::DerivedData, CacheDomain::SourcePackages];

    /// Name under which the restored key is kept between phases
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::DerivedData => "deriveddata-restored-key",
            Self::SourcePackages => "sourcepackages-restored-key",
        }
    }

    /// Archive file name inside the temp directory
    pub fn archive_name(&self) -> &'static str {
        match self {
            Self::DerivedData => "DerivedData.tar",
            Self::SourcePackages => "SourcePackages.tar",
        }
    }
}

impl fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DerivedData => write!(f, "DerivedData"),
            Self::SourcePackages => write!(f, "SourcePackages"),
        }
    }
}

/// What the store phase should do for one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveDecision {
    /// The entry restored from is exactly the primary key
    Skip { key: String },
    /// Saving is disabled for this run
    ReadOnly,
    /// Pack and save under `key`, then delete `prune` if set
    Save { key: String, prune: Option<String> },
}

/// Decide what to do with a domain at store time
///
/// `prune_used` only has an effect when something was restored under a key
/// other than the primary.
pub fn decide(primary: &str, restored: Option<&str>, prune_used: bool, read_only: bool) -> SaveDecision {
    if restored == Some(primary) {
        return SaveDecision::Skip {
            key: primary.to_string(),
        };
    }
    if read_only {
        return SaveDecision::ReadOnly;
    }
    SaveDecision::Save {
        key: primary.to_string(),
        prune: restored.filter(|_| prune_used).map(str::to_string),
    }
}

/// Result of carrying out a save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Uploaded under the primary key
    Saved,
    /// Another writer already holds the key
    AlreadyExists,
}

/// Carries out save decisions against a backend
pub struct KeyCoordinator<'a> {
    store: &'a dyn CacheStore,
    pruner: Option<&'a dyn EntryPruner>,
}

impl<'a> KeyCoordinator<'a> {
    pub fn new(store: &'a dyn CacheStore) -> Self {
        Self { store, pruner: None }
    }

    pub fn with_pruner(mut self, pruner: &'a dyn EntryPruner) -> Self {
        self.pruner = Some(pruner);
        self
    }

    /// Restore `domain` into `archive`, returning the key that hit
    pub async fn restore(
        &self,
        domain: CacheDomain,
        archive: &Path,
        primary: &str,
        fallbacks: &[String],
    ) -> XcacheResult<Option<String>> {
        let restored = self.store.restore(archive, primary, fallbacks).await?;
        match &restored {
            Some(key) => info!("{} cache restored from key: {}", domain, key),
            None => info!("{} cache not found", domain),
        }
        Ok(restored)
    }

    /// Save `archive` under the decided key, then prune
    pub async fn save(&self, domain: CacheDomain, key: &str, prune: Option<&str>, archive: &Path) -> XcacheResult<SaveOutcome> {
        let outcome = match self.store.save(archive, key).await {
            Ok(()) => {
                info!("{} cache saved with key: {}", domain, key);
                SaveOutcome::Saved
            }
            Err(XcacheError::CacheEntryExists { key }) => {
                warn!("{} cache for key {} was written by another job, keeping it", domain, key);
                SaveOutcome::AlreadyExists
            }
            Err(e) => return Err(e),
        };

        if let Some(used) = prune {
            self.prune(domain, used).await?;
        }
        Ok(outcome)
    }

    async fn prune(&self, domain: CacheDomain, key: &str) -> XcacheResult<()> {
        let Some(pruner) = self.pruner else {
            debug!("No pruner configured, keeping {}", key);
            return Ok(());
        };
        match pruner.delete(key).await {
            Ok(()) => {
                info!("Deleted used {} cache: {}", domain, key);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("Used {} cache already gone: {}", domain, key);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
