//! Nested cache-domain deduplication
//!
//! SourcePackages usually lives inside DerivedData. Both are cached under
//! their own keys, so the DerivedData archive must never carry the
//! SourcePackages content (at most its empty directory).
//!
//! Two strategies are supported:
//!
//! - `Relocate` moves the nested directory next to DerivedData while the
//!   archive is written, then moves it back.
//! - `Exclude` asks the archive tool to skip every child of the nested
//!   directory.

use crate::backend::archive::{split_directory, Archiver};
use crate::cache::patterns::normalize;
use crate::error::{XcacheError, XcacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// How a nested cache directory is kept out of its parent's archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NestedStrategy {
    /// Move the nested directory out while packing
    #[default]
    Relocate,
    /// Pass per-child exclusions to the archive tool
    Exclude,
}

impl fmt::Display for NestedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relocate => write!(f, "relocate"),
            Self::Exclude => write!(f, "exclude"),
        }
    }
}

/// Whether `child` is `parent` itself or lies beneath it
///
/// Purely lexical: the relative path from parent to child must not start
/// with `..`.
pub fn contains(parent: &Path, child: &Path) -> bool {
    normalize(child).starts_with(normalize(parent))
}

/// A directory moved out of the way, restored by [`Relocation::restore`]
///
/// An empty directory stands in at the original path until then. Dropping an unrestored relocation makes a best-effort attempt to move the
/// directory back.
#[derive(Debug)]
pub struct Relocation {
    original: PathBuf,
    temporary: PathBuf,
    restored: bool,
}

impl Relocation {
    /// Move `directory` into `holding` (which must be on the same filesystem)
    pub fn begin(directory: &Path, holding: &Path) -> XcacheResult<Self> {
        let name = directory
            .file_name()
            .ok_or_else(|| XcacheError::Internal(format!("cannot relocate {}", directory.display())))?;
        let temporary = holding.join(format!(".xcache-relocated-{}", name.to_string_lossy()));

        if temporary.exists() {
            return Err(XcacheError::Internal(format!(
                "relocation target {} already exists",
                temporary.display()
            )));
        }

        fs::rename(directory, &temporary).map_err(|e| {
            XcacheError::io(
                format!("moving {} to {}", directory.display(), temporary.display()),
                e,
            )
        })?;
        debug!("Relocated {} to {}", directory.display(), temporary.display());

        let relocation = Self {
            original: directory.to_path_buf(),
            temporary,
            restored: false,
        };

        // Empty placeholder so the archive still carries the directory itself
        fs::create_dir(directory)
            .map_err(|e| XcacheError::io(format!("creating placeholder {}", directory.display()), e))?;

        Ok(relocation)
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    pub fn temporary(&self) -> &Path {
        &self.temporary
    }

    /// Move the directory back to its original path
    pub fn restore(mut self) -> XcacheResult<()> {
        self.restored = true;
        self.move_back()
    }

    fn move_back(&self) -> XcacheResult<()> {
        if !self.temporary.exists() {
            return Err(XcacheError::RelocationCorruption {
                original: self.original.clone(),
                temporary: self.temporary.clone(),
            });
        }

        match fs::remove_dir(&self.original) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(XcacheError::io(
                    format!("removing placeholder {}", self.original.display()),
                    e,
                ))
            }
        }

        fs::rename(&self.temporary, &self.original).map_err(|e| {
            XcacheError::io(
                format!("moving {} back to {}", self.temporary.display(), self.original.display()),
                e,
            )
        })?;
        debug!("Restored {}", self.original.display());
        Ok(())
    }
}

impl Drop for Relocation {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(e) = self.move_back() {
                error!("Failed to restore relocated directory: {}", e);
            }
        }
    }
}

/// Parent-relative exclusions for every child of `nested`
///
/// Entries are plain `<root name>/<path>` member names, matching what the
/// archive tool stores when packing `root` relative to its parent. GNU tar
/// stores no `./` prefix in that mode, so a `./` pattern would never match.
pub fn exclusions_for(root: &Path, nested: &Path) -> XcacheResult<Vec<String>> {
    let (parent, _) = split_directory(root)?;
    let parent = normalize(parent);
    let nested = normalize(nested);
    let relative = nested
        .strip_prefix(&parent)
        .map_err(|_| XcacheError::Internal(format!("{} is not under {}", nested.display(), parent.display())))?;

    let entries =
        fs::read_dir(&nested).map_err(|e| XcacheError::io(format!("listing {}", nested.display()), e))?;

    let mut excludes = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| XcacheError::io(format!("listing {}", nested.display()), e))?;
        let path = relative.join(entry.file_name());
        excludes.push(path.to_string_lossy().into_owned());
    }
    excludes.sort();
    Ok(excludes)
}

/// Pack `root` into `archive`, keeping `nested` out of it when it lies inside
pub async fn pack_without_nested(
    archiver: &dyn Archiver,
    root: &Path,
    nested: Option<&Path>,
    strategy: NestedStrategy,
    archive: &Path,
) -> XcacheResult<()> {
    let nested = match nested {
        Some(nested) if contains(root, nested) && normalize(nested) != normalize(root) && nested.exists() => nested,
        _ => return archiver.pack(root, archive, &[]).await,
    };

    info!("{} is inside {}, keeping it out of the archive ({})", nested.display(), root.display(), strategy);

    match strategy {
        NestedStrategy::Exclude => {
            let excludes = exclusions_for(root, nested)?;
            archiver.pack(root, archive, &excludes).await
        }
        NestedStrategy::Relocate => {
            let (holding, _) = split_directory(root)?;
            let relocation = Relocation::begin(nested, holding)?;
            let packed = archiver.pack(root, archive, &[]).await;
            relocation.restore()?;
            packed
        }
    }
}
