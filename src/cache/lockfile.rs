//! Package.resolved hashing for the SourcePackages cache key
//!
//! The dependency domain is keyed by the content of the SwiftPM resolution
//! files. Same resolved dependencies = same cache.

use crate::cache::patterns::{GlobResolver, PatternSet};
use crate::error::{XcacheError, XcacheResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix of every derived SourcePackages key
pub const SOURCE_PACKAGES_KEY_PREFIX: &str = "xcache-sourcepackages-";

/// Where Xcode keeps Package.resolved for projects and workspaces
pub const DEFAULT_RESOLVED_FILES: &[&str] = &[
    "**/*.xcodeproj/project.xcworkspace/xcshareddata/swiftpm/Package.resolved",
    "**/*.xcworkspace/xcshareddata/swiftpm/Package.resolved",
];

/// Resolution files found for a key computation
#[derive(Debug, Clone)]
pub struct ResolvedFiles {
    /// Matched files, relative to the search root, sorted
    pub paths: Vec<PathBuf>,
    /// Combined SHA-256, empty when nothing matched
    pub hash: String,
}

impl ResolvedFiles {
    /// Cache key for the SourcePackages domain
    pub fn cache_key(&self) -> String {
        format!("{}{}", SOURCE_PACKAGES_KEY_PREFIX, self.hash)
    }
}

/// Hash every file matched by `patterns` under `root`
///
/// Each file is hashed on its own and the digests are fed, in path order,
/// into an outer SHA-256. No matches yields an empty hash.
pub fn hash_files(root: &Path, patterns: &[String]) -> XcacheResult<ResolvedFiles> {
    let patterns = if patterns.is_empty() {
        PatternSet::from_lines(DEFAULT_RESOLVED_FILES)
    } else {
        PatternSet::from_lines(patterns)
    };

    let resolver = GlobResolver::new(root, &patterns, &[])?;
    let paths = resolver.resolve_files();
    if paths.is_empty() {
        debug!("No Package.resolved files matched under {}", root.display());
        return Ok(ResolvedFiles {
            paths,
            hash: String::new(),
        });
    }

    let mut outer = Sha256::new();
    for relative in &paths {
        let path = resolver.root().join(relative);
        let contents = fs::read(&path)
            .map_err(|e| XcacheError::io(format!("reading {}", path.display()), e))?;
        debug!("Hashing resolved file: {}", relative.display());
        outer.update(Sha256::digest(&contents));
    }

    Ok(ResolvedFiles {
        paths,
        hash: hex::encode(outer.finalize()),
    })
}
