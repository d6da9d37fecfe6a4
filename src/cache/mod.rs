//! Xcode build cache core
//!
//! Everything that decides what a restored build tree looks like on disk:
//!
//! | Module | Role |
//! |--------|------|
//! | `mtime` | nanosecond timestamps |
//! | `fingerprint` | content hashes for files and directories |
//! | `patterns` | mtime target globs |
//! | `manifest` | the mtime manifest stored inside DerivedData |
//! | `reconcile` | rewinding mtimes after a restore |
//! | `lockfile` | Package.resolved hashing for the SourcePackages key |
//! | `dedup` | keeping SourcePackages out of the DerivedData archive |
//! | `key` | per-domain save decisions |

pub mod dedup;
pub mod fingerprint;
pub mod key;
pub mod lockfile;
pub mod manifest;
pub mod mtime;
pub mod patterns;
pub mod reconcile;

pub use dedup::{pack_without_nested, NestedStrategy};
pub use fingerprint::Fingerprint;
pub use key::{decide, CacheDomain, KeyCoordinator, SaveDecision, SaveOutcome};
pub use lockfile::{hash_files, ResolvedFiles};
pub use manifest::{Entry, Manifest, ManifestBuilder};
pub use mtime::MtimeStamp;
pub use patterns::{GlobResolver, PatternSet};
pub use reconcile::{reconcile, Outcome, ReconcileSummary};
