//! xcache - Xcode build cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xcache::cli::{Cli, Commands, LogFormat};
use xcache::config::ConfigManager;
use xcache::error::XcacheResult;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8, format: LogFormat) {
    // 0 = warn, 1 = info, 2+ = debug; XCACHE_LOG wins when set
    let filter = EnvFilter::try_from_env("XCACHE_LOG").unwrap_or_else(|_| match verbosity {
        0 => EnvFilter::new("xcache=warn"),
        1 => EnvFilter::new("xcache=info"),
        _ => EnvFilter::new("xcache=debug"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.without_time().init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run() -> XcacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load().await?;

    match &cli.command {
        Commands::Restore(args) | Commands::Store(args) => args.apply(&mut config),
        Commands::Config(_) => {}
    }

    // -vv and the `verbose` input both list per-entry decisions
    if cli.verbose >= 2 {
        config.general.verbose = true;
    }
    let verbosity = if config.general.verbose { cli.verbose.max(2) } else { cli.verbose };
    init_logging(verbosity, cli.log_format);
    debug!("Config file: {}", config_manager.path().display());

    match cli.command {
        Commands::Restore(_) => xcache::cli::commands::restore(&config).await,
        Commands::Store(_) => xcache::cli::commands::store(&config).await,
        Commands::Config(args) => xcache::cli::commands::config(args, &config, &config_manager).await,
    }
}
