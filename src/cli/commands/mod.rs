//! CLI command implementations

pub mod config;
pub mod restore;
pub mod store;

pub use config::execute as config;
pub use restore::execute as restore;
pub use store::execute as store;

use crate::error::{XcacheError, XcacheResult};
use std::path::Path;

/// Remove the scratch directory, ignoring one that is already gone
pub(crate) async fn remove_temp_directory(path: &Path) -> XcacheResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(XcacheError::io(format!("removing {}", path.display()), e)),
    }
}
