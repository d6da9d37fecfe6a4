//! Include/exclude glob resolution for mtime targets
//!
//! Patterns are kept as two explicit lists. Excludes are applied after
//! includes, so the order in which a user wrote them never matters. A pattern
//! that matches a directory also matches everything beneath it.

use crate::error::{XcacheError, XcacheResult};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Marker that turns a pattern line into an exclusion
pub const NEGATION_MARKER: char = '!';

/// Sources and resources whose mtime the build tool checks
pub const DEFAULT_MTIME_TARGETS: &[&str] = &[
    "**/*.swift",
    "**/*.xib",
    "**/*.storyboard",
    "**/*.strings",
    "**/*.plist",
    "**/*.bundle",
    "**/*.bundle/**/*",
    "**/*.m",
    "**/*.mm",
    "**/*.h",
    "**/*.c",
    "**/*.cc",
    "**/*.cpp",
    "**/*.hpp",
    "**/*.hxx",
];

/// Include and exclude patterns, stored apart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in source/resource patterns
    pub fn defaults() -> Self {
        Self {
            includes: DEFAULT_MTIME_TARGETS.iter().map(|p| p.to_string()).collect(),
            excludes: Vec::new(),
        }
    }

    /// Partition user-written lines into includes and excludes
    ///
    /// Lines starting with `!` are excludes; blank lines and `#` comments are
    /// ignored.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        set.extend_from_lines(lines);
        set
    }

    /// Append user-written lines, partitioning them as in [`Self::from_lines`]
    pub fn extend_from_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.strip_prefix(NEGATION_MARKER) {
                Some(excluded) => self.exclude(excluded.trim()),
                None => self.include(line),
            }
        }
    }

    pub fn include(&mut self, pattern: impl Into<String>) {
        self.includes.push(pattern.into());
    }

    pub fn exclude(&mut self, pattern: impl Into<String>) {
        self.excludes.push(pattern.into());
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
    }
}

/// Resolves a [`PatternSet`] against the files under a root directory
#[derive(Debug)]
pub struct GlobResolver {
    root: PathBuf,
    includes: GlobSet,
    excludes: GlobSet,
    excluded_roots: Vec<PathBuf>,
}

impl GlobResolver {
    /// Compile `patterns` relative to `root`
    ///
    /// `excluded_roots` are whole subtrees that are never reported, such as
    /// the cache directories themselves. Relative entries are taken relative
    /// to `root`.
    pub fn new(root: &Path, patterns: &PatternSet, excluded_roots: &[PathBuf]) -> XcacheResult<Self> {
        let root = normalize(root);
        Ok(Self {
            includes: build_globset(&root, patterns.includes())?,
            excludes: build_globset(&root, patterns.excludes())?,
            excluded_roots: excluded_roots.iter().map(|p| normalize(&root.join(p))).collect(),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a root-relative path is selected
    pub fn is_match(&self, relative: &Path) -> bool {
        if self.is_excluded_root(&self.root.join(relative)) {
            return false;
        }
        matches_with_ancestors(&self.includes, relative) && !matches_with_ancestors(&self.excludes, relative)
    }

    /// Walk the root and return every selected path, relative to the root and sorted
    ///
    /// Directories and files are both reported. Unreadable entries are logged
    /// and skipped.
    pub fn resolve(&self) -> Vec<PathBuf> {
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !self.is_excluded_root(entry.path()) && !self.is_excluded_subtree(entry.path()));

        let mut matched = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable path while resolving globs: {}", e);
                    continue;
                }
            };
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if self.is_match(relative) {
                matched.push(relative.to_path_buf());
            }
        }

        matched.sort();
        debug!("Resolved {} paths under {}", matched.len(), self.root.display());
        matched
    }

    /// Like [`Self::resolve`] but only regular files
    pub fn resolve_files(&self) -> Vec<PathBuf> {
        self.resolve()
            .into_iter()
            .filter(|relative| self.root.join(relative).is_file())
            .collect()
    }

    fn is_excluded_root(&self, path: &Path) -> bool {
        self.excluded_roots.iter().any(|root| path.starts_with(root))
    }

    fn is_excluded_subtree(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root)
            .map(|relative| self.excludes.is_match(relative))
            .unwrap_or(false)
    }
}

fn build_globset(root: &Path, patterns: &[String]) -> XcacheResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let relative = relative_pattern(root, pattern);
        let glob = GlobBuilder::new(&relative)
            .literal_separator(true)
            .build()
            .map_err(|e| XcacheError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| XcacheError::InvalidPattern {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}

/// Express a pattern relative to the walk root
fn relative_pattern(root: &Path, pattern: &str) -> String {
    let pattern = pattern.trim_start_matches("./");
    if Path::new(pattern).is_absolute() {
        if let Ok(stripped) = Path::new(pattern).strip_prefix(root) {
            return stripped.to_string_lossy().into_owned();
        }
        warn!("Pattern {} is outside of {} and will not match", pattern, root.display());
    }
    pattern.to_string()
}

/// A path matches if it, or any directory above it, matches the set
fn matches_with_ancestors(set: &GlobSet, relative: &Path) -> bool {
    relative
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .any(|p| set.is_match(p))
}

/// Resolve `.` and `..` lexically, without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
