//! Error types for xcache
//!
//! All modules use `XcacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for xcache operations
pub type XcacheResult<T> = Result<T, XcacheError>;

/// All errors that can occur in xcache
#[derive(Error, Debug)]
pub enum XcacheError {
    // Environment errors
    #[error("Unsupported platform: {0}. xcache supports macOS and Linux.")]
    UnsupportedPlatform(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Missing required input: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // Manifest errors
    #[error("Invalid mtime manifest {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Invalid timestamp {0:?}, expected <seconds>.<nanoseconds>")]
    InvalidTimestamp(String),

    // Archive errors
    #[error("Relocated directory lost: neither {original} nor {temporary} exists")]
    RelocationCorruption { original: PathBuf, temporary: PathBuf },

    // Remote cache errors
    #[error("Cache entry already exists: {key}")]
    CacheEntryExists { key: String },

    #[error("Cache entry not found: {key}")]
    CacheEntryNotFound { key: String },

    #[error("Cache backend error: {0}")]
    CacheBackend(String),

    // State errors
    #[error("Restored key for {domain} was already recorded in this run")]
    StateConflict { domain: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl XcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the error means "the thing is not there"
    ///
    /// Missing files during reconciliation and missing remote keys during
    /// pruning are expected outcomes, not run failures.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::PathNotFound(_) | Self::CacheEntryNotFound { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigMissing(_) => Some("Pass the value as a flag, an XCACHE_* variable or in the config file"),
            Self::RelocationCorruption { .. } => {
                Some("The nested cache directory was moved and not restored; do not save caches from this run")
            }
            Self::UnsupportedPlatform(_) => Some("Run xcache on a macOS or Linux runner"),
            Self::CommandFailed { .. } => Some("Check that `tar` is installed and on PATH"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = XcacheError::CacheEntryExists {
            key: "deriveddata-abc".to_string(),
        };
        assert!(err.to_string().contains("already exists"));
        assert!(err.to_string().contains("deriveddata-abc"));
    }

    #[test]
    fn error_hint() {
        let err = XcacheError::ConfigMissing("key");
        assert!(err.hint().is_some());
        assert!(XcacheError::Internal("x".into()).hint().is_none());
    }

    #[test]
    fn error_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(XcacheError::io("stat", io).is_not_found());
        assert!(XcacheError::CacheEntryNotFound { key: "k".into() }.is_not_found());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(!XcacheError::io("stat", denied).is_not_found());
        assert!(!XcacheError::CacheEntryExists { key: "k".into() }.is_not_found());
    }
}
