//! Configuration schema for xcache
//!
//! Every value may come from the TOML file; command-line flags and
//! `XCACHE_*` variables override it (see [`crate::cli::args::CacheArgs`]).

use crate::cache::dedup::NestedStrategy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// DerivedData cache settings
    pub cache: CacheConfig,

    /// SourcePackages cache settings
    pub swiftpm: SwiftpmConfig,

    /// Remote cache backend
    pub backend: BackendConfig,

    /// Cross-phase state
    pub state: StateConfig,
}

/// General application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// List per-entry decisions and run the archive tool verbosely
    pub verbose: bool,

    /// Scratch directory for archives (default: `$RUNNER_TEMP/xcache`)
    pub temp_directory: Option<PathBuf>,
}

/// DerivedData cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Primary cache key (required)
    pub key: Option<String>,

    /// Prefix-matched fallback keys
    pub restore_keys: Vec<String>,

    /// DerivedData directory (default: `~/Library/Developer/Xcode/DerivedData`)
    pub deriveddata_directory: Option<PathBuf>,

    /// Extra mtime targets; `!`-prefixed lines are excludes
    pub restore_mtime_targets: Vec<String>,

    /// Start the targets from the built-in source patterns
    pub use_default_mtime_targets: bool,

    /// Delete the restored entry after saving a new one
    pub delete_used_deriveddata_cache: bool,

    /// Restore only, never save
    pub cache_read_only: bool,

    /// How SourcePackages is kept out of the DerivedData archive
    pub nested_strategy: NestedStrategy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: None,
            restore_keys: vec![],
            deriveddata_directory: None,
            restore_mtime_targets: vec![],
            use_default_mtime_targets: true,
            delete_used_deriveddata_cache: false,
            cache_read_only: false,
            nested_strategy: NestedStrategy::default(),
        }
    }
}

/// SourcePackages cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwiftpmConfig {
    /// SourcePackages directory (default: first `<deriveddata>/*/SourcePackages`)
    pub sourcepackages_directory: Option<PathBuf>,

    /// Package.resolved globs hashed into the default key
    pub package_resolved_files: Vec<String>,

    /// Explicit cache key
    pub cache_key: Option<String>,

    /// Prefix-matched fallback keys
    pub cache_restore_keys: Vec<String>,
}

/// Cache backend kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One archive file per key in a directory
    #[default]
    Directory,
    /// Hits whenever the archive already exists locally
    Presence,
}

/// Remote cache backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,

    /// Root of the directory store (default: `<cache dir>/xcache/store`)
    pub root: Option<PathBuf>,

    /// GitHub token; enables deletion through the Actions cache API
    pub token: Option<String>,

    /// GitHub API base URL
    pub api_url: String,

    /// `owner/repo` whose Actions caches are pruned (default: `$GITHUB_REPOSITORY`)
    pub repository: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            root: None,
            token: None,
            api_url: "https://api.github.com".to_string(),
            repository: None,
        }
    }
}

/// State store kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// JSON file shared by both phases
    #[default]
    File,
    /// GitHub Actions `$GITHUB_STATE` / `STATE_*`
    Github,
}

/// Cross-phase state configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub kind: StateKind,

    /// State file for the file store (default: `$RUNNER_TEMP/xcache-state.json`)
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("[backend]"));
        assert!(toml.contains("nested_strategy = \"relocate\""));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.cache.use_default_mtime_targets);
        assert!(config.cache.key.is_none());
        assert_eq!(config.backend.kind, BackendKind::Directory);
        assert_eq!(config.state.kind, StateKind::File);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [cache]
            key = "deriveddata-main"
            restore_mtime_targets = ["Sources/**/*", "!Sources/Generated"]
            nested_strategy = "exclude"

            [backend]
            kind = "presence"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.key.as_deref(), Some("deriveddata-main"));
        assert_eq!(config.cache.restore_mtime_targets.len(), 2);
        assert_eq!(config.cache.nested_strategy, NestedStrategy::Exclude);
        assert_eq!(config.backend.kind, BackendKind::Presence);
        assert!(config.cache.use_default_mtime_targets); // default preserved
        assert_eq!(config.backend.api_url, "https://api.github.com");
    }
}
