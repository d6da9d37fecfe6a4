//! Restore-phase mtime reconciliation
//!
//! Each manifest entry goes through one decision and ends in a terminal
//! outcome:
//!
//! | Current state | Outcome |
//! |---------------|---------|
//! | path missing | `NotFound` |
//! | mtime equal to the manifest | `AlreadyConsistent` |
//! | mtime differs, fingerprint equal | `Restored` (mtime rewound) |
//! | mtime differs, fingerprint differs | `ContentChanged` |
//!
//! Only `Restored` touches the filesystem. `ContentChanged` keeps the fresh
//! mtime so the build tool recompiles that file.

use crate::cache::fingerprint::Fingerprint;
use crate::cache::manifest::{Entry, Manifest};
use crate::cache::mtime::MtimeStamp;
use crate::error::{XcacheError, XcacheResult};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Terminal outcome of reconciling one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Content matched and the cached mtime was written back
    Restored,
    /// mtime already equal to the cached value
    AlreadyConsistent,
    /// Content differs from the cached fingerprint
    ContentChanged,
    /// Path no longer exists
    NotFound,
}

impl Outcome {
    pub fn is_skip(&self) -> bool {
        !matches!(self, Self::Restored)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restored => write!(f, "restored"),
            Self::AlreadyConsistent => write!(f, "mtime not changed"),
            Self::ContentChanged => write!(f, "content changed"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

/// Per-outcome counts for a restore summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub restored: usize,
    pub already_consistent: usize,
    pub content_changed: usize,
    pub not_found: usize,
}

impl ReconcileSummary {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Restored => self.restored += 1,
            Outcome::AlreadyConsistent => self.already_consistent += 1,
            Outcome::ContentChanged => self.content_changed += 1,
            Outcome::NotFound => self.not_found += 1,
        }
    }

    /// Entries whose mtime was left alone
    pub fn skipped(&self) -> usize {
        self.already_consistent + self.content_changed + self.not_found
    }

    /// Entries examined
    pub fn total(&self) -> usize {
        self.restored + self.skipped()
    }
}

/// Decide and apply the outcome for a single entry
///
/// `root` is the directory the entry paths are relative to.
pub fn reconcile_entry(root: &Path, entry: &Entry) -> XcacheResult<Outcome> {
    let path = root.join(&entry.path);

    let metadata = match fs::metadata(&path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Outcome::NotFound),
        Err(e) => return Err(XcacheError::io(format!("reading metadata of {}", path.display()), e)),
    };

    if MtimeStamp::from_metadata(&metadata) == entry.time {
        return Ok(Outcome::AlreadyConsistent);
    }

    let current = if metadata.is_dir() {
        Fingerprint::of_directory(&path)
    } else {
        Fingerprint::of_file(&path)
    };
    let current = match current {
        Ok(fingerprint) => fingerprint,
        Err(e) if e.is_not_found() => return Ok(Outcome::NotFound),
        Err(e) => return Err(e),
    };

    if current != entry.sha256 {
        return Ok(Outcome::ContentChanged);
    }

    entry.time.apply(&path)?;
    Ok(Outcome::Restored)
}

/// Reconcile every entry of a manifest, consuming it
pub fn reconcile(root: &Path, manifest: Manifest) -> XcacheResult<ReconcileSummary> {
    let mut summary = ReconcileSummary::default();

    for entry in manifest {
        let outcome = reconcile_entry(root, &entry)?;
        if outcome.is_skip() {
            debug!("{} : {}", outcome, entry.path.display());
        } else {
            debug!("=> {} : {}", entry.time, entry.path.display());
        }
        summary.record(outcome);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn stamp(seconds: i64) -> MtimeStamp {
        MtimeStamp::new(seconds, 0).unwrap()
    }

    fn mtime_of(path: &Path) -> MtimeStamp {
        MtimeStamp::from_metadata(&fs::metadata(path).unwrap())
    }

    fn entry(path: &str, time: MtimeStamp, sha256: Fingerprint) -> Entry {
        Entry {
            path: PathBuf::from(path),
            time,
            sha256,
        }
    }

    #[test]
    fn unchanged_content_rewinds_mtime() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("A.swift");
        fs::write(&file, "let a = 1").unwrap();
        stamp(200).apply(&file).unwrap();

        let h1 = Fingerprint::of_file(&file).unwrap();
        let manifest = Manifest::new(vec![entry("A.swift", stamp(100), h1)]);

        let summary = reconcile(dir.path(), manifest).unwrap();

        assert_eq!(summary.restored, 1);
        assert_eq!(summary.skipped(), 0);
        assert_eq!(mtime_of(&file), stamp(100));
    }

    #[test]
    fn changed_content_keeps_fresh_mtime() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("A.swift");
        fs::write(&file, "let a = 2").unwrap();
        stamp(200).apply(&file).unwrap();

        let h1 = Fingerprint::from_hex("h1");
        let manifest = Manifest::new(vec![entry("A.swift", stamp(100), h1)]);

        let summary = reconcile(dir.path(), manifest).unwrap();

        assert_eq!(summary.restored, 0);
        assert_eq!(summary.content_changed, 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(mtime_of(&file), stamp(200));
    }

    #[test]
    fn equal_mtime_short_circuits() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("A.swift");
        fs::write(&file, "let a = 1").unwrap();
        let exact = MtimeStamp::new(1694535491, 104939637).unwrap();
        exact.apply(&file).unwrap();

        // A bogus fingerprint proves no hashing happened
        let e = entry("A.swift", mtime_of(&file), Fingerprint::from_hex("bogus"));
        assert_eq!(reconcile_entry(dir.path(), &e).unwrap(), Outcome::AlreadyConsistent);
        assert_eq!(mtime_of(&file), e.time);
    }

    #[test]
    fn missing_path_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::new(vec![entry("gone.swift", stamp(100), Fingerprint::from_hex("h"))]);

        let summary = reconcile(dir.path(), manifest).unwrap();
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.total(), 1);
    }

    #[test]
    fn directory_entries_use_shallow_fingerprint() {
        let dir = TempDir::new().unwrap();
        let bundle = dir.path().join("Res.bundle");
        fs::create_dir(&bundle).unwrap();
        fs::write(bundle.join("icon.png"), "png").unwrap();
        let fingerprint = Fingerprint::of_directory(&bundle).unwrap();
        stamp(300).apply(&bundle).unwrap();

        let e = entry("Res.bundle", stamp(50), fingerprint);
        assert_eq!(reconcile_entry(dir.path(), &e).unwrap(), Outcome::Restored);
        assert_eq!(mtime_of(&bundle), stamp(50));
    }

    #[test]
    fn mixed_manifest_counts_each_outcome() {
        let dir = TempDir::new().unwrap();
        let same = dir.path().join("same.swift");
        let moved = dir.path().join("moved.swift");
        let edited = dir.path().join("edited.swift");
        for f in [&same, &moved, &edited] {
            fs::write(f, "x").unwrap();
            stamp(500).apply(f).unwrap();
        }
        let fp = Fingerprint::of_file(&same).unwrap();

        let manifest = Manifest::new(vec![
            entry("same.swift", stamp(500), fp.clone()),
            entry("moved.swift", stamp(10), fp.clone()),
            entry("edited.swift", stamp(10), Fingerprint::from_hex("other")),
            entry("gone.swift", stamp(10), fp),
        ]);

        let summary = reconcile(dir.path(), manifest).unwrap();
        assert_eq!(
            summary,
            ReconcileSummary {
                restored: 1,
                already_consistent: 1,
                content_changed: 1,
                not_found: 1,
            }
        );
        assert_eq!(mtime_of(&moved), stamp(10));
        assert_eq!(mtime_of(&edited), stamp(500));
    }

    #[test]
    fn outcome_display() {
        assert_eq!(Outcome::ContentChanged.to_string(), "content changed");
        assert!(Outcome::NotFound.is_skip());
        assert!(!Outcome::Restored.is_skip());
    }
}
