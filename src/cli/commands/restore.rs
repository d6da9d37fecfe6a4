//! Restore command - the pre-build phase
//!
//! Pulls DerivedData and SourcePackages from the cache, then rewinds source
//! mtimes from the manifest shipped inside DerivedData.

use crate::backend::archive::{split_directory, Archiver, TarArchiver};
use crate::backend::{create_store, Platform};
use crate::cache::key::{CacheDomain, KeyCoordinator};
use crate::cache::manifest::Manifest;
use crate::cache::reconcile::{reconcile, ReconcileSummary};
use crate::cli::commands::remove_temp_directory;
use crate::config::{Config, Inputs};
use crate::error::{XcacheError, XcacheResult};
use crate::state::{create_state_store, RestoredKeys};
use console::{style, Emoji};
use std::path::Path;
use tracing::{debug, info};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static MISS: Emoji<'_, '_> = Emoji("· ", "[--] ");

/// Execute the restore command
pub async fn execute(config: &Config) -> XcacheResult<()> {
    let platform = Platform::require_supported()?;
    debug!("Platform: {}", platform.name());

    let workspace =
        std::env::current_dir().map_err(|e| XcacheError::io("getting current directory", e))?;
    let inputs = Inputs::resolve(config, &workspace)?;
    inputs.log();

    let store = create_store(config)?;
    let state = create_state_store(config);
    let archiver = TarArchiver::new(inputs.verbose);
    let coordinator = KeyCoordinator::new(store.as_ref());
    let mut restored = RestoredKeys::new();

    let derived_hit = restore_domain(
        &coordinator,
        &archiver,
        CacheDomain::DerivedData,
        &inputs.deriveddata_directory,
        &inputs.temp_directory,
        &inputs.key,
        &inputs.restore_keys,
    )
    .await?;
    if let Some(key) = &derived_hit {
        restored.record(CacheDomain::DerivedData, key.clone())?;
    }

    // Resolved after DerivedData so a freshly restored tree can supply the default
    let packages_hit = match inputs.sourcepackages_directory() {
        None => {
            info!("SourcePackages directory not found, skip restoring SourcePackages");
            None
        }
        Some(directory) => {
            restore_domain(
                &coordinator,
                &archiver,
                CacheDomain::SourcePackages,
                &directory,
                &inputs.temp_directory,
                &inputs.swiftpm_cache_key,
                &inputs.swiftpm_cache_restore_keys,
            )
            .await?
        }
    };
    if let Some(key) = &packages_hit {
        restored.record(CacheDomain::SourcePackages, key.clone())?;
    }

    let mtimes = if derived_hit.is_some() {
        restore_mtime(&inputs)?
    } else {
        None
    };

    restored.persist(state.as_ref()).await?;

    if !store.keeps_archives() {
        remove_temp_directory(&inputs.temp_directory).await?;
    }

    print_summary(derived_hit.as_deref(), packages_hit.as_deref(), mtimes.as_ref());
    Ok(())
}

/// Restore one domain and unpack it next to its directory
async fn restore_domain(
    coordinator: &KeyCoordinator<'_>,
    archiver: &dyn Archiver,
    domain: CacheDomain,
    directory: &Path,
    temp_directory: &Path,
    primary: &str,
    fallbacks: &[String],
) -> XcacheResult<Option<String>> {
    let archive = temp_directory.join(domain.archive_name());
    let Some(key) = coordinator.restore(domain, &archive, primary, fallbacks).await? else {
        return Ok(None);
    };

    let (parent, _) = split_directory(directory)?;
    archiver.unpack(&archive, parent).await?;
    info!("{} has restored from cache: {}", domain, directory.display());
    Ok(Some(key))
}

/// Rewind mtimes from the manifest inside DerivedData, if there is one
fn restore_mtime(inputs: &Inputs) -> XcacheResult<Option<ReconcileSummary>> {
    let location = Manifest::location(&inputs.deriveddata_directory);
    let Some(manifest) = Manifest::load(&location)? else {
        info!("mtime manifest not found: {}", location.display());
        return Ok(None);
    };

    info!("Restore mtime from {}", location.display());
    let summary = reconcile(&inputs.workspace, manifest)?;
    info!("Restored {} of {} files", summary.restored, summary.total());
    Ok(Some(summary))
}

fn print_summary(derived: Option<&str>, packages: Option<&str>, mtimes: Option<&ReconcileSummary>) {
    for (domain, hit) in [
        (CacheDomain::DerivedData, derived),
        (CacheDomain::SourcePackages, packages),
    ] {
        match hit {
            Some(key) => println!("{}{} restored from {}", CHECK, style(domain).bold(), style(key).cyan()),
            None => println!("{}{} not restored", MISS, style(domain).bold()),
        }
    }

    if let Some(summary) = mtimes {
        println!(
            "{}mtime restored for {} files ({} skipped)",
            CHECK,
            style(summary.restored).green(),
            summary.skipped()
        );
    }
}
