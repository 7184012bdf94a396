//! Command-line interface for repo-catalog.
//!
//! Provides commands for building the catalog once, rebuilding it on every
//! source change, inspecting a single entity's digest, and showing the
//! resolved configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::catalog::{build_digest, files::read_record, BuildReport, ENTITY_DOCUMENT};
use crate::config::{self, ConfigOverrides, ResolvedConfig};
use crate::domain::EntityKind;
use crate::watch::{rebuild, CatalogWatcher};

/// repo-catalog - Build a publishable catalog tree from a content repository
#[derive(Parser, Debug)]
#[command(name = "repo-catalog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Location flags shared by every command that needs a build context
#[derive(Args, Debug, Clone, Default)]
pub struct LocationArgs {
    /// Source repository root
    #[arg(short, long, env = "CATALOG_SOURCE")]
    pub source: Option<PathBuf>,

    /// Output tree root (deleted and rebuilt)
    #[arg(short, long, env = "CATALOG_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Published base URL for media and download links
    #[arg(short, long, env = "CATALOG_BASE_URL")]
    pub base_url: Option<String>,

    /// Config file (default: search for .catalog/config.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl LocationArgs {
    fn overrides(&self, debounce_ms: Option<u64>) -> ConfigOverrides {
        ConfigOverrides {
            source: self.source.clone(),
            output: self.output.clone(),
            base_url: self.base_url.clone(),
            config_file: self.config.clone(),
            debounce_ms,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Regenerate the whole catalog once
    Build {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Build, then rebuild every time the source tree changes
    Watch {
        #[command(flatten)]
        location: LocationArgs,

        /// Quiet period before a rebuild (milliseconds)
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Print the digest of a single entity document
    Digest {
        /// Entity document (`<name>.json` or `<folder>/entity.json`)
        file: PathBuf,

        /// Entity kind (inferred from the enclosing folders if not specified)
        #[arg(short, long)]
        kind: Option<EntityKind>,
    },

    /// Show resolved configuration (debug)
    Config {
        #[command(flatten)]
        location: LocationArgs,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Build { location } => {
                run_build(&location).await
            }
            Commands::Watch { location, debounce_ms } => {
                run_watch(&location, debounce_ms).await
            }
            Commands::Digest { file, kind } => {
                show_digest(&file, kind)
            }
            Commands::Config { location } => {
                show_config(&location)
            }
        }
    }
}

/// Regenerate the catalog once and print the report
async fn run_build(location: &LocationArgs) -> Result<()> {
    let cfg = config::load_config(&location.overrides(None))?;

    let report = rebuild(cfg.to_context())
        .await
        .context("Catalog build failed")?;

    print_report(&cfg, &report);
    Ok(())
}

/// Build once, then keep rebuilding until interrupted
async fn run_watch(location: &LocationArgs, debounce_ms: Option<u64>) -> Result<()> {
    let cfg = config::load_config(&location.overrides(debounce_ms))?;

    let report = rebuild(cfg.to_context())
        .await
        .context("Initial catalog build failed")?;
    print_report(&cfg, &report);

    let watcher = CatalogWatcher::new(cfg.to_context(), cfg.debounce_ms);
    let (mut reports, handle) = watcher.watch()?;

    println!("Watching {} (Ctrl-C to stop)", cfg.source.display());

    loop {
        tokio::select! {
            Some(report) = reports.recv() => {
                print_report(&cfg, &report);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    handle.stop().await?;
    println!("Stopped.");
    Ok(())
}

fn print_report(cfg: &ResolvedConfig, report: &BuildReport) {
    println!("Built catalog: {}", cfg.output.display());
    println!("  Directories:  {}", report.directories);
    println!("  Entities:     {}", report.entities);
    println!("  Packages:     {}", report.packages);
    println!("  Files:        {}", report.opaque_files);
    println!("  Media files:  {}", report.media_files);
    if report.warnings > 0 {
        println!("  Warnings:     {} (see log)", report.warnings);
    }
}

/// Print the digest of one entity document as JSON
fn show_digest(file: &Path, kind: Option<EntityKind>) -> Result<()> {
    let record = read_record(file)
        .with_context(|| format!("Failed to read entity document: {}", file.display()))?;

    let kind = kind.unwrap_or_else(|| infer_kind(file));
    let name = fallback_name(file);
    let digest = build_digest(&record, kind, &name);

    println!("{}", serde_json::to_string_pretty(&digest)?);
    Ok(())
}

/// Kind of the nearest enclosing folder that names one
fn infer_kind(file: &Path) -> EntityKind {
    file.ancestors()
        .skip(1)
        .filter_map(|dir| dir.file_name())
        .map(|name| EntityKind::from_folder_name(&name.to_string_lossy()))
        .find(|kind| *kind != EntityKind::Unknown)
        .unwrap_or(EntityKind::Unknown)
}

/// Display name used when the record has none: the folder for
/// `entity.json`, the file stem otherwise
fn fallback_name(file: &Path) -> String {
    let is_folder_entity = file
        .file_name()
        .map(|n| n == ENTITY_DOCUMENT)
        .unwrap_or(false);

    let named = if is_folder_entity {
        file.parent().and_then(|p| p.file_name())
    } else {
        file.file_stem()
    };
    named
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Show resolved configuration
fn show_config(location: &LocationArgs) -> Result<()> {
    let cfg = config::load_config(&location.overrides(None))?;

    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("  Catalog Configuration");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using flags and environment)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Source: {}", cfg.source.display());
    println!("  Output: {}", cfg.output.display());
    println!();
    println!("Publishing:");
    println!("  Base URL: {}", cfg.base_url);
    println!();
    println!("Watch:");
    println!("  Debounce: {}ms", cfg.debounce_ms);

    Ok(())
}
