//! Mtime manifest: the persisted `(path, mtime, fingerprint)` record
//!
//! The manifest is written inside the DerivedData directory right before it
//! is packed, so it travels with the cached tree and is captured before any
//! repackaging can touch inode timestamps.
//!
//! # Format
//!
//! ```json
//! [ { "path": "App/A.swift", "time": "1694535491.104939637", "sha256": "<hex>" } ]
//! ```

use crate::cache::fingerprint::Fingerprint;
use crate::cache::mtime::MtimeStamp;
use crate::cache::patterns::{GlobResolver, PatternSet};
use crate::error::{XcacheError, XcacheResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the manifest inside the DerivedData directory
pub const MANIFEST_FILE_NAME: &str = "xcache-mtime.json";

/// One tracked filesystem object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Path relative to the working directory at store time
    pub path: PathBuf,
    /// Modification time at store time
    pub time: MtimeStamp,
    /// Content fingerprint at store time
    pub sha256: Fingerprint,
}

/// Ordered list of entries; order carries no meaning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: Vec<Entry>,
}

impl Manifest {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Location of the manifest inside a tracked directory
    pub fn location(directory: &Path) -> PathBuf {
        directory.join(MANIFEST_FILE_NAME)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a manifest, `None` if the file does not exist
    pub fn load(path: &Path) -> XcacheResult<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(XcacheError::io(format!("reading manifest {}", path.display()), e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| XcacheError::ManifestInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Write the manifest, replacing any previous one
    pub fn write(&self, path: &Path) -> XcacheResult<()> {
        let content = serde_json::to_string(self)?;
        fs::write(path, content)
            .map_err(|e| XcacheError::io(format!("writing manifest {}", path.display()), e))
    }
}

impl IntoIterator for Manifest {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Collects manifest entries for every path matched by the mtime targets
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    root: PathBuf,
    patterns: PatternSet,
    excluded_roots: Vec<PathBuf>,
}

impl ManifestBuilder {
    /// Build entries relative to `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: PatternSet::new(),
            excluded_roots: Vec::new(),
        }
    }

    /// Add the built-in source/resource targets
    pub fn with_default_targets(mut self) -> Self {
        for pattern in PatternSet::defaults().includes() {
            self.patterns.include(pattern.clone());
        }
        self
    }

    /// Add user-written target lines (`!` marks an exclusion)
    pub fn with_targets<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.patterns.extend_from_lines(lines);
        self
    }

    /// Never track anything inside `path`
    pub fn exclude_subtree(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded_roots.push(path.into());
        self
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Stat and fingerprint every matched path
    ///
    /// Paths that vanish or cannot be read after matching are logged and
    /// dropped.
    pub fn build(&self) -> XcacheResult<Manifest> {
        if self.patterns.is_empty() {
            debug!("No mtime targets configured");
            return Ok(Manifest::default());
        }

        let resolver = GlobResolver::new(&self.root, &self.patterns, &self.excluded_roots)?;
        let mut entries = Vec::new();

        for relative in resolver.resolve() {
            let absolute = resolver.root().join(&relative);
            match read_entry(&absolute) {
                Ok((time, sha256)) => {
                    debug!("=> {} : {}", time, relative.display());
                    entries.push(Entry {
                        path: relative,
                        time,
                        sha256,
                    });
                }
                Err(e) => warn!("Cannot read file stat: {}: {}", relative.display(), e),
            }
        }

        Ok(Manifest::new(entries))
    }

    /// Build the manifest and write it into `directory`
    pub fn write_into(&self, directory: &Path) -> XcacheResult<Manifest> {
        let manifest = self.build()?;
        let location = Manifest::location(directory);
        manifest.write(&location)?;
        info!("Stored {} files : {}", manifest.len(), location.display());
        Ok(manifest)
    }
}

fn read_entry(path: &Path) -> XcacheResult<(MtimeStamp, Fingerprint)> {
    let metadata = fs::metadata(path)
        .map_err(|e| XcacheError::io(format!("reading metadata of {}", path.display()), e))?;
    let time = MtimeStamp::from_metadata(&metadata);
    let fingerprint = if metadata.is_dir() {
        Fingerprint::of_directory(path)?
    } else {
        Fingerprint::of_file(path)?
    };
    Ok((time, fingerprint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn parse_wire_format() {
        let json = r#"[{"path":"A.swift","time":"100.000000000","sha256":"h1"}]"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();

        assert_eq!(manifest.len(), 1);
        let entry = &manifest.entries()[0];
        assert_eq!(entry.path, PathBuf::from("A.swift"));
        assert_eq!(entry.time, MtimeStamp::new(100, 0).unwrap());
        assert_eq!(entry.sha256.as_str(), "h1");

        assert_eq!(serde_json::to_string(&manifest).unwrap(), json);
    }

    #[test]
    fn load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(Manifest::load(&Manifest::location(dir.path())).unwrap().is_none());
    }

    #[test]
    fn load_garbage_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = Manifest::location(dir.path());
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Manifest::load(&path).unwrap_err(),
            XcacheError::ManifestInvalid { .. }
        ));
    }

    #[test]
    fn builder_records_matched_paths() {
        let work = TempDir::new().unwrap();
        touch(work.path(), "App/A.swift", "let a = 1");
        touch(work.path(), "App/README.md", "docs");
        touch(work.path(), "App/Res.bundle/icon.png", "png");

        let manifest = ManifestBuilder::new(work.path()).with_default_targets().build().unwrap();
        let paths: Vec<_> = manifest.entries().iter().map(|e| e.path.clone()).collect();

        assert_eq!(
            paths,
            vec![
                PathBuf::from("App/A.swift"),
                PathBuf::from("App/Res.bundle"),
                PathBuf::from("App/Res.bundle/icon.png"),
            ]
        );

        let swift = &manifest.entries()[0];
        assert_eq!(swift.sha256, Fingerprint::of_file(&work.path().join("App/A.swift")).unwrap());
        let bundle = &manifest.entries()[1];
        assert_eq!(
            bundle.sha256,
            Fingerprint::of_directory(&work.path().join("App/Res.bundle")).unwrap()
        );
    }

    #[test]
    fn builder_honors_excludes_and_subtrees() {
        let work = TempDir::new().unwrap();
        touch(work.path(), "Sources/A.swift", "a");
        touch(work.path(), "Generated/B.swift", "b");
        touch(work.path(), "DerivedData/SourcePackages/C.swift", "c");

        let manifest = ManifestBuilder::new(work.path())
            .with_targets(["!Generated/**", "**/*.swift"])
            .exclude_subtree("DerivedData")
            .build()
            .unwrap();

        let paths: Vec<_> = manifest.entries().iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("Sources/A.swift")]);
    }

    #[test]
    fn write_into_overwrites() {
        let work = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        touch(work.path(), "A.swift", "a");

        let builder = ManifestBuilder::new(work.path()).with_targets(["*.swift"]);
        builder.write_into(cache.path()).unwrap();

        fs::remove_file(work.path().join("A.swift")).unwrap();
        touch(work.path(), "B.swift", "b");
        builder.write_into(cache.path()).unwrap();

        let loaded = Manifest::load(&Manifest::location(cache.path())).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entries()[0].path, PathBuf::from("B.swift"));
    }

    #[test]
    fn empty_targets_produce_empty_manifest() {
        let work = TempDir::new().unwrap();
        touch(work.path(), "A.swift", "a");
        assert!(ManifestBuilder::new(work.path()).build().unwrap().is_empty());
    }
}
