//! Sideloader - sideload Office add-ins from a local network share
//!
//! Shares a directory, registers it as a trusted catalog for Office and
//! copies add-in manifests into it.

// Commands only reach the native backends on Windows
#![cfg_attr(not(windows), allow(dead_code))]

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use sideloader_core::lifecycle::CacheReport;
use sideloader_core::registry::RegistryHive;
use sideloader_core::share::ShareTable;
use sideloader_core::{config, AddOptions, RemoveOptions, Sideloader, SideloaderConfig};

mod info_cli;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "sideloader",
    about = "Sideload Office add-ins through a trusted network share catalog",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Write log lines to stderr as JSON
    #[clap(long, global = true)]
    log_json: bool,

    /// Override configuration file path
    #[clap(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Share a directory, register it as a trusted catalog and install manifests
    Add {
        /// Share name (defaults to the configured netname)
        #[clap(short, long)]
        netname: Option<String>,

        /// Catalog directory (defaults to the configured path)
        #[clap(short, long)]
        path: Option<PathBuf>,

        /// Hide the catalog from the Office add-in menu
        #[clap(long)]
        hide: bool,

        /// Manifest URLs or local paths
        manifests: Vec<String>,
    },

    /// Uninstall manifests from a share, optionally removing the catalog
    Remove {
        /// Share name (defaults to the configured netname)
        #[clap(short, long)]
        netname: Option<String>,

        /// Remove every manifest in the share directory
        #[clap(short, long)]
        all: bool,

        /// Also unregister the catalog and delete the share
        #[clap(short, long)]
        catalog: bool,

        /// Manifest URLs or local paths
        manifests: Vec<String>,
    },

    /// Remove invalid provider entries and clear the Office add-in cache
    #[clap(alias = "repair")]
    Fix,

    /// Show shares, catalogs, providers and installed add-ins
    Info {
        /// Catalog directory to list (defaults to the configured path)
        #[clap(short, long)]
        path: Option<PathBuf>,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
}

/// Targets recorded in the log file; dependencies stay out of it
const FILE_LOG_DIRECTIVES: &str = "sideloader_core=debug,sideloader=debug";

/// Initialize tracing with CLI flags
///
/// Human-readable (or JSON with --log-json) lines go to stderr at the
/// --log-level. Debug and above from this tool is also appended to the log
/// file in the config directory.
fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::new(log_level.to_filter_directive());

    let stderr_layer = if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr) // Critical: logs to stderr, not stdout
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr) // Critical: logs to stderr, not stdout
            .with_filter(filter)
            .boxed()
    };

    let log_path = config::log_file();
    let log_file = log_path
        .parent()
        .map(std::fs::create_dir_all)
        .unwrap_or(Ok(()))
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&log_path));

    let (file_layer, file_error) = match log_file {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(EnvFilter::new(FILE_LOG_DIRECTIVES)),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!(path = %log_path.display(), error = %e, "log file unavailable");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.log_json);

    let config = match &cli.config {
        Some(path) => SideloaderConfig::load_from_path(path),
        None => SideloaderConfig::load(),
    }
    .context("Failed to load configuration")?;
    debug!(?config, "configuration loaded");

    execute(cli.command, config)
}

#[cfg(windows)]
fn execute(command: Command, config: SideloaderConfig) -> Result<()> {
    run(&Sideloader::native(config), command)
}

#[cfg(not(windows))]
fn execute(_command: Command, _config: SideloaderConfig) -> Result<()> {
    Err(sideloader_core::SideloaderError::UnsupportedPlatform.into())
}

/// Dispatch one command against the given backends
fn run<R: RegistryHive, S: ShareTable>(sideloader: &Sideloader<R, S>, command: Command) -> Result<()> {
    let config = sideloader.config();

    match command {
        Command::Add {
            netname,
            path,
            hide,
            manifests,
        } => {
            let options = AddOptions {
                netname: netname.unwrap_or_else(|| config.netname.clone()),
                path: path.unwrap_or_else(|| config.path.clone()),
                hide,
                manifests,
            };
            let report = sideloader.add(&options).context("Failed to add catalog")?;

            println!("Catalog {} registered as {}", report.url, report.catalog_id);
            println!("Serving {}", report.path.display());
            for outcome in &report.manifests.completed {
                println!("  Installed {} -> {}", outcome.id, outcome.file.display());
            }

            print_cache(&sideloader.clear_cache());
            report
                .manifests
                .ensure_complete()
                .context("Failed to install manifests")?;
        }

        Command::Remove {
            netname,
            all,
            catalog,
            manifests,
        } => {
            let options = RemoveOptions {
                netname: netname.unwrap_or_else(|| config.netname.clone()),
                all,
                catalog,
                manifests,
            };
            let report = sideloader
                .remove(&options)
                .context("Failed to remove add-ins")?;

            let Some(share) = &report.share else {
                println!("Share {} does not exist, nothing to remove", options.netname);
                return Ok(());
            };

            for outcome in &report.manifests.completed {
                if outcome.existed {
                    println!("  Removed {} from {}", outcome.id, share.path.display());
                } else {
                    println!("  {} was not installed", outcome.id);
                }
            }
            if let Some(id) = &report.catalog_removed {
                println!("Catalog {id} unregistered");
            }
            if report.share_removed {
                println!("Share {} removed", share.name);
            }

            print_cache(&sideloader.clear_cache());
            report
                .manifests
                .ensure_complete()
                .context("Failed to remove manifests")?;
        }

        Command::Fix => {
            let report = sideloader.repair().context("Failed to repair Office add-ins")?;

            if report.removed_providers.is_empty() {
                println!("No invalid providers found");
            }
            for row in &report.removed_providers {
                println!("  Removed provider {} ({})", row.key, row.value);
            }
            print_cache(&report.cache);
        }

        Command::Info { path, json } => {
            let report = sideloader
                .info(path.as_deref())
                .context("Failed to collect add-in information")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                info_cli::print_info(&report);
            }
        }
    }

    Ok(())
}

fn print_cache(report: &CacheReport) {
    for path in &report.cleared {
        println!("Cleared cache {}", path.display());
    }
    for warning in &report.warnings {
        println!(
            "Warning: could not clear {}: {}",
            warning.path.display(),
            warning.message
        );
    }
}
