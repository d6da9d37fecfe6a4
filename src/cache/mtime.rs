//! Nanosecond-precision file timestamps
//!
//! Timestamps travel through the manifest as `<seconds>.<9-digit-nanoseconds>`
//! strings so that equality is exact integer equality, never a float compare.

use crate::error::{XcacheError, XcacheResult};
use filetime::FileTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::Metadata;
use std::path::Path;
use std::str::FromStr;

/// A file modification time with nanosecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MtimeStamp {
    seconds: i64,
    nanos: u32,
}

impl MtimeStamp {
    /// Create a timestamp; `nanos` must be below one second
    pub fn new(seconds: i64, nanos: u32) -> XcacheResult<Self> {
        if nanos >= 1_000_000_000 {
            return Err(XcacheError::InvalidTimestamp(format!("{seconds}.{nanos}")));
        }
        Ok(Self { seconds, nanos })
    }

    /// Whole seconds since the Unix epoch
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Sub-second part in nanoseconds
    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Modification time recorded in `metadata`
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let time = FileTime::from_last_modification_time(metadata);
        Self {
            seconds: time.unix_seconds(),
            nanos: time.nanoseconds(),
        }
    }

    /// Set both access and modification time of `path` to this timestamp
    pub fn apply(&self, path: &Path) -> XcacheResult<()> {
        let time = FileTime::from_unix_time(self.seconds, self.nanos);
        filetime::set_file_times(path, time, time)
            .map_err(|e| XcacheError::io(format!("setting mtime of {}", path.display()), e))
    }
}

impl fmt::Display for MtimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl FromStr for MtimeStamp {
    type Err = XcacheError;

    /// Accepts `.` and the older `,` separator. The fraction must be exactly
    /// nine digits so that `1.5` is never silently read as 1.000000005.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || XcacheError::InvalidTimestamp(s.to_string());

        let (seconds, nanos) = s
            .split_once(|c: char| c == '.' || c == ',')
            .ok_or_else(invalid)?;
        if nanos.len() != 9 || !nanos.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let seconds = seconds.parse::<i64>().map_err(|_| invalid())?;
        let nanos = nanos.parse::<u32>().map_err(|_| invalid())?;
        Self::new(seconds, nanos)
    }
}

impl Serialize for MtimeStamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MtimeStamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
