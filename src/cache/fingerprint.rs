//! Content fingerprints for tracked files and directories
//!
//! Files are fingerprinted by the SHA-256 of their full contents. Directories
//! are fingerprinted shallowly: the SHA-256 of their direct children's names
//! in byte order. Nested content is not hashed because every nested entry is
//! tracked on its own.

use crate::error::{XcacheError, XcacheResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// A SHA-256 fingerprint stored as a lowercase hex string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint whatever lives at `path`, file or directory
    pub fn of_path(path: &Path) -> XcacheResult<Self> {
        let metadata = fs::metadata(path).map_err(|e| not_found_or_io(path, "reading metadata of", e))?;
        if metadata.is_dir() {
            Self::of_directory(path)
        } else {
            Self::of_file(path)
        }
    }

    /// SHA-256 over the full byte content of a file
    pub fn of_file(path: &Path) -> XcacheResult<Self> {
        let file = fs::File::open(path).map_err(|e| not_found_or_io(path, "opening", e))?;
        Self::from_reader(file).map_err(|e| not_found_or_io(path, "reading", e))
    }

    /// SHA-256 over the sorted names of a directory's direct children
    pub fn of_directory(path: &Path) -> XcacheResult<Self> {
        let entries = fs::read_dir(path).map_err(|e| not_found_or_io(path, "listing", e))?;

        let mut names: Vec<OsString> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| not_found_or_io(path, "listing", e))?;
            names.push(entry.file_name());
        }
        names.sort_by(|a, b| a.as_encoded_bytes().cmp(b.as_encoded_bytes()));

        let mut hasher = Sha256::new();
        for name in &names {
            hasher.update(name.as_encoded_bytes());
        }
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// SHA-256 of everything `reader` yields
    pub fn from_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Wrap an already computed hex digest
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn not_found_or_io(path: &Path, action: &str, source: io::Error) -> XcacheError {
    if source.kind() == io::ErrorKind::NotFound {
        XcacheError::PathNotFound(path.to_path_buf())
    } else {
        XcacheError::io(format!("{action} {}", path.display()), source)
    }
}
