//! CLI argument definitions using clap derive

use crate::cache::dedup::NestedStrategy;
use crate::config::schema::{BackendKind, StateKind};
use crate::config::Config;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// xcache - Xcode DerivedData and SourcePackages cache
///
/// Restores build products before a build and stores them afterwards,
/// rewinding source mtimes so incremental builds stay incremental.
#[derive(Parser, Debug)]
#[command(name = "xcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug and verbose tar)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "XCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text", env = "XCACHE_LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore caches and rewind mtimes (run before the build)
    Restore(CacheArgs),

    /// Record mtimes and save caches (run after the build)
    Store(CacheArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

/// Cache inputs shared by `restore` and `store`
///
/// Every flag overrides the matching config file value.
#[derive(Args, Debug, Default)]
pub struct CacheArgs {
    /// Primary DerivedData cache key
    #[arg(long, env = "XCACHE_KEY")]
    pub key: Option<String>,

    /// Fallback DerivedData key prefixes, in order
    #[arg(long = "restore-keys", env = "XCACHE_RESTORE_KEYS", value_delimiter = '\n')]
    pub restore_keys: Vec<String>,

    /// DerivedData directory
    #[arg(long, env = "XCACHE_DERIVEDDATA_DIRECTORY")]
    pub deriveddata_directory: Option<PathBuf>,

    /// SourcePackages directory
    #[arg(long, env = "XCACHE_SOURCEPACKAGES_DIRECTORY")]
    pub sourcepackages_directory: Option<PathBuf>,

    /// Extra mtime targets; prefix with `!` to exclude
    #[arg(
        long = "restore-mtime-targets",
        env = "XCACHE_RESTORE_MTIME_TARGETS",
        value_delimiter = '\n',
        allow_hyphen_values = true
    )]
    pub restore_mtime_targets: Vec<String>,

    /// Package.resolved globs hashed into the SourcePackages key
    #[arg(
        long = "swiftpm-package-resolved-file",
        env = "XCACHE_SWIFTPM_PACKAGE_RESOLVED_FILE",
        value_delimiter = '\n'
    )]
    pub swiftpm_package_resolved_file: Vec<String>,

    /// Explicit SourcePackages cache key
    #[arg(long, env = "XCACHE_SWIFTPM_CACHE_KEY")]
    pub swiftpm_cache_key: Option<String>,

    /// Fallback SourcePackages key prefixes, in order
    #[arg(long = "swiftpm-cache-restore-keys", env = "XCACHE_SWIFTPM_CACHE_RESTORE_KEYS", value_delimiter = '\n')]
    pub swiftpm_cache_restore_keys: Vec<String>,

    /// Include the built-in source file targets
    #[arg(long, env = "XCACHE_USE_DEFAULT_MTIME_TARGETS")]
    pub use_default_mtime_targets: Option<bool>,

    /// Delete the DerivedData entry this run restored from after saving
    #[arg(long, env = "XCACHE_DELETE_USED_DERIVEDDATA_CACHE")]
    pub delete_used_deriveddata_cache: Option<bool>,

    /// GitHub token for deleting Actions cache entries
    #[arg(long, env = "XCACHE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Never save caches
    #[arg(long, env = "XCACHE_CACHE_READ_ONLY")]
    pub cache_read_only: Option<bool>,

    /// Cache backend
    #[arg(long, value_enum, env = "XCACHE_BACKEND")]
    pub backend: Option<BackendKind>,

    /// Root directory of the directory backend
    #[arg(long, env = "XCACHE_BACKEND_ROOT")]
    pub backend_root: Option<PathBuf>,

    /// Where restored keys are kept between phases
    #[arg(long, value_enum, env = "XCACHE_STATE")]
    pub state: Option<StateKind>,

    /// State file for the file state store
    #[arg(long, env = "XCACHE_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Scratch directory for archives
    #[arg(long, env = "XCACHE_TEMP_DIRECTORY")]
    pub temp_directory: Option<PathBuf>,

    /// How SourcePackages is kept out of the DerivedData archive
    #[arg(long, value_enum, env = "XCACHE_NESTED_STRATEGY")]
    pub nested_strategy: Option<NestedStrategy>,
}

impl CacheArgs {
    /// Overlay the given flags on top of `config`
    pub fn apply(&self, config: &mut Config) {
        if let Some(key) = &self.key {
            config.cache.key = Some(key.clone());
        }
        if !self.restore_keys.is_empty() {
            config.cache.restore_keys = self.restore_keys.clone();
        }
        if let Some(dir) = &self.deriveddata_directory {
            config.cache.deriveddata_directory = Some(dir.clone());
        }
        if let Some(dir) = &self.sourcepackages_directory {
            config.swiftpm.sourcepackages_directory = Some(dir.clone());
        }
        if !self.restore_mtime_targets.is_empty() {
            config.cache.restore_mtime_targets = self.restore_mtime_targets.clone();
        }
        if !self.swiftpm_package_resolved_file.is_empty() {
            config.swiftpm.package_resolved_files = self.swiftpm_package_resolved_file.clone();
        }
        if let Some(key) = &self.swiftpm_cache_key {
            config.swiftpm.cache_key = Some(key.clone());
        }
        if !self.swiftpm_cache_restore_keys.is_empty() {
            config.swiftpm.cache_restore_keys = self.swiftpm_cache_restore_keys.clone();
        }
        if let Some(value) = self.use_default_mtime_targets {
            config.cache.use_default_mtime_targets = value;
        }
        if let Some(value) = self.delete_used_deriveddata_cache {
            config.cache.delete_used_deriveddata_cache = value;
        }
        if let Some(token) = &self.token {
            config.backend.token = Some(token.clone());
        }
        if let Some(value) = self.cache_read_only {
            config.cache.cache_read_only = value;
        }
        if let Some(kind) = self.backend {
            config.backend.kind = kind;
        }
        if let Some(root) = &self.backend_root {
            config.backend.root = Some(root.clone());
        }
        if let Some(kind) = self.state {
            config.state.kind = kind;
        }
        if let Some(file) = &self.state_file {
            config.state.file = Some(file.clone());
        }
        if let Some(dir) = &self.temp_directory {
            config.general.temp_directory = Some(dir.clone());
        }
        if let Some(strategy) = self.nested_strategy {
            config.cache.nested_strategy = strategy;
        }
    }
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
