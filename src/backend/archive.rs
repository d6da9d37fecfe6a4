//! Archive tool abstraction
//!
//! Packs a directory into a single archive file and unpacks it again. The
//! real implementation shells out to `tar`; only exclusion support and the
//! relative layout of the packed tree matter to callers.

use crate::error::{XcacheError, XcacheResult};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Packs and unpacks cached directory trees
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Pack `directory` into `archive`
    ///
    /// Entries are stored under the directory's own name, relative to its
    /// parent. `excludes` are member names such as `DerivedData/App/Build` to
    /// leave out, together with everything beneath them.
    async fn pack(&self, directory: &Path, archive: &Path, excludes: &[String]) -> XcacheResult<()>;

    /// Unpack `archive` into `destination`
    async fn unpack(&self, archive: &Path, destination: &Path) -> XcacheResult<()>;
}

/// Archiver backed by the system `tar`
#[derive(Debug, Clone, Default)]
pub struct TarArchiver {
    verbose: bool,
}

impl TarArchiver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run `tar` with the given arguments, failing on a non-zero exit
    async fn exec(&self, args: Vec<OsString>) -> XcacheResult<()> {
        let mut args = args;
        if self.verbose {
            args.insert(0, OsString::from("-v"));
        }
        debug!("Executing: tar {:?}", args);

        let stdout = if self.verbose { Stdio::inherit() } else { Stdio::null() };
        let output = Command::new("tar")
            .args(&args)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| XcacheError::command_failed(format!("tar {:?}", args), e))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(XcacheError::command_exec(format!("tar {:?}", args), stderr.trim()))
        }
    }
}

#[async_trait]
impl Archiver for TarArchiver {
    async fn pack(&self, directory: &Path, archive: &Path, excludes: &[String]) -> XcacheResult<()> {
        let (parent, name) = split_directory(directory)?;

        if let Some(dir) = archive.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| XcacheError::io(format!("creating {}", dir.display()), e))?;
        }

        let mut args: Vec<OsString> = vec!["-cf".into(), archive.into()];
        for exclude in excludes {
            args.push("--exclude".into());
            args.push(exclude.into());
        }
        args.push("-C".into());
        args.push(parent.into());
        args.push(name.into());

        self.exec(args).await?;
        info!("Packed {}: {}", directory.display(), archive.display());
        Ok(())
    }

    async fn unpack(&self, archive: &Path, destination: &Path) -> XcacheResult<()> {
        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|e| XcacheError::io(format!("creating {}", destination.display()), e))?;

        let args: Vec<OsString> = vec!["-xf".into(), archive.into(), "-C".into(), destination.into()];
        self.exec(args).await
    }
}

/// Split a directory into `(parent, file name)`
pub fn split_directory(directory: &Path) -> XcacheResult<(&Path, &std::ffi::OsStr)> {
    let invalid = || XcacheError::Internal(format!("cannot archive {}", directory.display()));
    let name = directory.file_name().ok_or_else(invalid)?;
    let parent = match directory.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(invalid()),
    };
    Ok((parent, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn split_absolute_directory() {
        let (parent, name) = split_directory(Path::new("/Users/ci/DerivedData")).unwrap();
        assert_eq!(parent, Path::new("/Users/ci"));
        assert_eq!(name, "DerivedData");
    }

    #[test]
    fn split_relative_directory() {
        let (parent, name) = split_directory(Path::new("DerivedData")).unwrap();
        assert_eq!(parent, Path::new("."));
        assert_eq!(name, "DerivedData");
    }

    #[test]
    fn split_root_fails() {
        assert!(split_directory(&PathBuf::from("/")).is_err());
    }
}
