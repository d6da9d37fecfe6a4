//! Cache backends and the archive tool
//!
//! Backends are picked once from configuration and then used through the
//! [`CacheStore`] and [`EntryPruner`] traits.

pub mod archive;
pub mod directory;
pub mod github;
pub mod presence;
pub mod store;

pub use archive::{Archiver, TarArchiver};
pub use directory::DirectoryStore;
pub use github::GithubPruner;
pub use presence::PresenceStore;
pub use store::{CacheStore, EntryPruner};

use crate::config::schema::BackendKind;
use crate::config::{expand_home, Config, ConfigManager};
use crate::error::{XcacheError, XcacheResult};
use std::path::PathBuf;
use tracing::debug;

/// Detected platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// macOS - the Xcode host
    MacOS,
    /// Linux - directory and presence backends only
    Linux,
    /// Unsupported platform
    Unsupported,
}

impl Platform {
    /// Detect the current platform
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOS,
            "linux" => Platform::Linux,
            _ => Platform::Unsupported,
        }
    }

    /// Get a human-readable platform name
    pub fn name(&self) -> &'static str {
        match self {
            Platform::MacOS => "macOS",
            Platform::Linux => "Linux",
            Platform::Unsupported => "Unsupported",
        }
    }

    /// Detect the platform, failing on unsupported hosts
    pub fn require_supported() -> XcacheResult<Self> {
        match Self::detect() {
            Platform::Unsupported => Err(XcacheError::UnsupportedPlatform(std::env::consts::OS.to_string())),
            platform => Ok(platform),
        }
    }
}

fn store_root(config: &Config) -> PathBuf {
    config
        .backend
        .root
        .as_deref()
        .map(expand_home)
        .unwrap_or_else(ConfigManager::default_store_dir)
}

/// Create the configured cache store
pub fn create_store(config: &Config) -> XcacheResult<Box<dyn CacheStore>> {
    Platform::require_supported()?;
    match config.backend.kind {
        BackendKind::Directory => Ok(Box::new(DirectoryStore::new(store_root(config)))),
        BackendKind::Presence => Ok(Box::new(PresenceStore::new())),
    }
}

/// Create the pruner for used DerivedData entries
///
/// With a token and a repository (configured or `$GITHUB_REPOSITORY`), entries
/// are deleted through the GitHub API; otherwise from the configured store.
pub fn create_pruner(config: &Config) -> XcacheResult<Box<dyn EntryPruner>> {
    Platform::require_supported()?;

    let token = config.backend.token.as_deref().filter(|t| !t.is_empty());
    let repository = config
        .backend
        .repository
        .clone()
        .or_else(|| std::env::var("GITHUB_REPOSITORY").ok())
        .filter(|r| !r.is_empty());

    if let (Some(token), Some(repository)) = (token, repository) {
        debug!("Pruning through the GitHub API for {}", repository);
        return Ok(Box::new(GithubPruner::new(&config.backend.api_url, repository, token)));
    }

    match config.backend.kind {
        BackendKind::Directory => Ok(Box::new(DirectoryStore::new(store_root(config)))),
        BackendKind::Presence => Ok(Box::new(PresenceStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_name() {
        assert_eq!(Platform::MacOS.name(), "macOS");
        assert_eq!(Platform::Linux.name(), "Linux");
        assert_eq!(Platform::Unsupported.name(), "Unsupported");
    }

    #[test]
    fn create_store_follows_configured_kind() {
        let mut config = Config::default();
        config.backend.root = Some(PathBuf::from("/tmp/xcache-store"));

        match Platform::detect() {
            Platform::MacOS | Platform::Linux => {
                assert_eq!(create_store(&config).unwrap().backend_name(), "directory");
                config.backend.kind = BackendKind::Presence;
                assert_eq!(create_store(&config).unwrap().backend_name(), "presence");
            }
            Platform::Unsupported => {
                assert!(matches!(
                    create_store(&config),
                    Err(XcacheError::UnsupportedPlatform(_))
                ));
            }
        }
    }

    #[test]
    fn store_root_defaults_to_cache_dir() {
        let config = Config::default();
        assert!(store_root(&config).ends_with("xcache/store"));
    }
}
