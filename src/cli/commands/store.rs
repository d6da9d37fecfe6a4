//! Store command - the post-build phase
//!
//! Records the mtime manifest into DerivedData, then saves SourcePackages
//! and DerivedData under their keys unless the restored entry is current.

use crate::backend::archive::{Archiver, TarArchiver};
use crate::backend::{create_pruner, create_store, Platform};
use crate::cache::dedup::pack_without_nested;
use crate::cache::key::{decide, CacheDomain, KeyCoordinator, SaveDecision, SaveOutcome};
use crate::cache::manifest::{Manifest, ManifestBuilder};
use crate::cli::commands::remove_temp_directory;
use crate::config::{Config, Inputs};
use crate::error::{XcacheError, XcacheResult};
use crate::state::{create_state_store, RestoredKeys};
use console::{style, Emoji};
use std::future::Future;
use std::path::Path;
use tracing::{debug, info, warn};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static SKIP: Emoji<'_, '_> = Emoji("· ", "[--] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

/// What happened to one domain
#[derive(Debug, Clone, PartialEq, Eq)]
enum DomainReport {
    Saved(String),
    AlreadyExists(String),
    Current(String),
    ReadOnly,
    Missing,
}

/// Execute the store command
pub async fn execute(config: &Config) -> XcacheResult<()> {
    let platform = Platform::require_supported()?;
    debug!("Platform: {}", platform.name());

    let workspace =
        std::env::current_dir().map_err(|e| XcacheError::io("getting current directory", e))?;
    let inputs = Inputs::resolve(config, &workspace)?;
    inputs.log();

    let store = create_store(config)?;
    let pruner = if inputs.delete_used_deriveddata_cache {
        Some(create_pruner(config)?)
    } else {
        None
    };
    let mut coordinator = KeyCoordinator::new(store.as_ref());
    if let Some(pruner) = &pruner {
        coordinator = coordinator.with_pruner(pruner.as_ref());
    }

    let state = create_state_store(config);
    let restored = RestoredKeys::load(state.as_ref()).await?;
    let archiver = TarArchiver::new(inputs.verbose);

    let derived = inputs.deriveddata_directory.as_path();
    let packages = inputs.sourcepackages_directory();

    let manifest = if derived.is_dir() {
        Some(store_mtime(&inputs, packages.as_deref())?)
    } else {
        warn!("DerivedData directory not found: {}", derived.display());
        warn!("Skipped storing mtime");
        None
    };

    let packages_report = match &packages {
        None => {
            info!("SourcePackages directory not found, skip storing SourcePackages");
            DomainReport::Missing
        }
        Some(directory) if !directory.exists() => {
            warn!("SourcePackages directory not found: {}", directory.display());
            warn!("Skipped storing SourcePackages");
            DomainReport::Missing
        }
        Some(directory) => {
            let decision = decide(
                &inputs.swiftpm_cache_key,
                restored.get(CacheDomain::SourcePackages),
                false,
                inputs.cache_read_only,
            );
            let archive = inputs.temp_directory.join(CacheDomain::SourcePackages.archive_name());
            save_domain(
                &coordinator,
                CacheDomain::SourcePackages,
                decision,
                &archive,
                archiver.pack(directory, &archive, &[]),
            )
            .await?
        }
    };

    let derived_report = if derived.is_dir() {
        let decision = decide(
            &inputs.key,
            restored.get(CacheDomain::DerivedData),
            inputs.delete_used_deriveddata_cache,
            inputs.cache_read_only,
        );
        let archive = inputs.temp_directory.join(CacheDomain::DerivedData.archive_name());
        save_domain(
            &coordinator,
            CacheDomain::DerivedData,
            decision,
            &archive,
            pack_without_nested(
                &archiver,
                derived,
                packages.as_deref(),
                inputs.nested_strategy,
                &archive,
            ),
        )
        .await?
    } else {
        warn!("Skipped storing DerivedData");
        DomainReport::Missing
    };

    if !store.keeps_archives() {
        remove_temp_directory(&inputs.temp_directory).await?;
    }

    print_summary(manifest.as_ref(), &packages_report, &derived_report);
    Ok(())
}

/// Write the mtime manifest for the workspace into DerivedData
fn store_mtime(inputs: &Inputs, packages: Option<&Path>) -> XcacheResult<Manifest> {
    let mut builder = ManifestBuilder::new(&inputs.workspace);
    if inputs.use_default_mtime_targets {
        builder = builder.with_default_targets();
    }
    builder = builder
        .with_targets(&inputs.restore_mtime_targets)
        .exclude_subtree(&inputs.deriveddata_directory);
    if let Some(packages) = packages {
        builder = builder.exclude_subtree(packages);
    }

    debug!(
        "mtime targets: includes {:?}, excludes {:?}",
        builder.patterns().includes(),
        builder.patterns().excludes()
    );
    builder.write_into(&inputs.deriveddata_directory)
}

/// Pack (only when saving) and save one domain
async fn save_domain(
    coordinator: &KeyCoordinator<'_>,
    domain: CacheDomain,
    decision: SaveDecision,
    archive: &Path,
    pack: impl Future<Output = XcacheResult<()>>,
) -> XcacheResult<DomainReport> {
    match decision {
        SaveDecision::Skip { key } => {
            info!("{} cache restored from the primary key, skip saving: {}", domain, key);
            Ok(DomainReport::Current(key))
        }
        SaveDecision::ReadOnly => {
            info!("cache-read-only is set, skip saving {}", domain);
            Ok(DomainReport::ReadOnly)
        }
        SaveDecision::Save { key, prune } => {
            pack.await?;
            info!("{} packed: {}", domain, archive.display());
            match coordinator.save(domain, &key, prune.as_deref(), archive).await? {
                SaveOutcome::Saved => Ok(DomainReport::Saved(key)),
                SaveOutcome::AlreadyExists => Ok(DomainReport::AlreadyExists(key)),
            }
        }
    }
}

fn print_summary(manifest: Option<&Manifest>, packages: &DomainReport, derived: &DomainReport) {
    match manifest {
        Some(manifest) => println!("{}mtime stored for {} files", CHECK, style(manifest.len()).green()),
        None => println!("{}mtime not stored", WARN),
    }

    for (domain, report) in [(CacheDomain::SourcePackages, packages), (CacheDomain::DerivedData, derived)] {
        let name = style(domain).bold();
        match report {
            DomainReport::Saved(key) => println!("{}{} saved as {}", CHECK, name, style(key).cyan()),
            DomainReport::AlreadyExists(key) => {
                println!("{}{} already cached as {}", WARN, name, style(key).cyan())
            }
            DomainReport::Current(key) => println!("{}{} up to date ({})", SKIP, name, key),
            DomainReport::ReadOnly => println!("{}{} not saved (read-only)", SKIP, name),
            DomainReport::Missing => println!("{}{} not found", SKIP, name),
        }
    }
}
