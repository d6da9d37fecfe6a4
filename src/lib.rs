//! xcache - Xcode build cache with mtime restoration
//!
//! Caches DerivedData and SourcePackages between CI runs and rewinds the
//! mtimes of unchanged sources after a restore, so the build system keeps
//! the cached products instead of rebuilding everything.

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod state;

pub use error::{XcacheError, XcacheResult};
