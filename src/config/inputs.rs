//! Resolved phase inputs
//!
//! Turns the merged configuration into concrete values: absolute paths,
//! derived keys and defaults filled in. Both phases resolve the same way so
//! that the store phase sees what the restore phase saw.

use crate::cache::dedup::NestedStrategy;
use crate::cache::lockfile::hash_files;
use crate::config::{expand_home, Config, ConfigManager};
use crate::error::{XcacheError, XcacheResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Xcode's default DerivedData location
pub const DEFAULT_DERIVEDDATA_DIRECTORY: &str = "~/Library/Developer/Xcode/DerivedData";

/// Directory name Xcode uses for resolved package checkouts
pub const SOURCE_PACKAGES_DIR_NAME: &str = "SourcePackages";

/// Fully resolved inputs for one phase
#[derive(Debug, Clone)]
pub struct Inputs {
    /// Directory manifest paths are relative to (the working directory)
    pub workspace: PathBuf,
    pub key: String,
    pub restore_keys: Vec<String>,
    pub deriveddata_directory: PathBuf,
    sourcepackages_directory: Option<PathBuf>,
    pub restore_mtime_targets: Vec<String>,
    pub use_default_mtime_targets: bool,
    pub swiftpm_cache_key: String,
    pub swiftpm_cache_restore_keys: Vec<String>,
    pub delete_used_deriveddata_cache: bool,
    pub cache_read_only: bool,
    pub verbose: bool,
    pub nested_strategy: NestedStrategy,
    pub temp_directory: PathBuf,
}

impl Inputs {
    /// Resolve `config` against `workspace`
    ///
    /// Fails when no primary key is configured.
    pub fn resolve(config: &Config, workspace: &Path) -> XcacheResult<Self> {
        let key = config
            .cache
            .key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(XcacheError::ConfigMissing("key"))?
            .to_string();

        let absolute = |path: &Path| workspace.join(expand_home(path));

        let deriveddata_directory = absolute(
            config
                .cache
                .deriveddata_directory
                .as_deref()
                .unwrap_or(Path::new(DEFAULT_DERIVEDDATA_DIRECTORY)),
        );

        let swiftpm_cache_key = match config.swiftpm.cache_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => key.to_string(),
            None => {
                let resolved = hash_files(workspace, &config.swiftpm.package_resolved_files)?;
                debug!("Package.resolved files: {:?}", resolved.paths);
                resolved.cache_key()
            }
        };

        let temp_directory = match &config.general.temp_directory {
            Some(dir) => absolute(dir),
            None => ConfigManager::runner_temp_dir().join("xcache"),
        };

        Ok(Self {
            workspace: workspace.to_path_buf(),
            key,
            restore_keys: non_empty(&config.cache.restore_keys),
            deriveddata_directory,
            sourcepackages_directory: config.swiftpm.sourcepackages_directory.as_deref().map(absolute),
            restore_mtime_targets: non_empty(&config.cache.restore_mtime_targets),
            use_default_mtime_targets: config.cache.use_default_mtime_targets,
            swiftpm_cache_key,
            swiftpm_cache_restore_keys: non_empty(&config.swiftpm.cache_restore_keys),
            delete_used_deriveddata_cache: config.cache.delete_used_deriveddata_cache,
            cache_read_only: config.cache.cache_read_only,
            verbose: config.general.verbose,
            nested_strategy: config.cache.nested_strategy,
            temp_directory,
        })
    }

    /// The SourcePackages directory, if configured or discoverable
    ///
    /// Without an explicit setting this is the first `<deriveddata>/*/SourcePackages`
    /// in name order, looked up on every call since a restore can create it.
    pub fn sourcepackages_directory(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.sourcepackages_directory {
            return Some(dir.clone());
        }
        discover_source_packages(&self.deriveddata_directory)
    }

    /// Log every input at info level
    pub fn log(&self) {
        info!("> inputs");
        info!("key: {}", self.key);
        info!("restore-keys: {:?}", self.restore_keys);
        info!("deriveddata-directory: {}", self.deriveddata_directory.display());
        match self.sourcepackages_directory() {
            Some(dir) => info!("sourcepackages-directory: {}", dir.display()),
            None => info!("sourcepackages-directory: (none)"),
        }
        info!("restore-mtime-targets: {:?}", self.restore_mtime_targets);
        info!("use-default-mtime-targets: {}", self.use_default_mtime_targets);
        info!("swiftpm-cache-key: {}", self.swiftpm_cache_key);
        info!("swiftpm-cache-restore-keys: {:?}", self.swiftpm_cache_restore_keys);
        info!("delete-used-deriveddata-cache: {}", self.delete_used_deriveddata_cache);
        info!("cache-read-only: {}", self.cache_read_only);
        info!("nested-strategy: {}", self.nested_strategy);
        info!("temp-directory: {}", self.temp_directory.display());
    }
}

fn non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn discover_source_packages(deriveddata: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(deriveddata)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path().join(SOURCE_PACKAGES_DIR_NAME))
        .filter(|path| path.exists())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}
