//! Configuration for catalog builds.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags
//! 2. Environment variables (CATALOG_SOURCE, CATALOG_OUTPUT, CATALOG_BASE_URL),
//!    merged into the flags by clap
//! 3. Config file (.catalog/config.yaml)
//! 4. Defaults (output at ./public; source and base URL have none)
//!
//! Config file discovery:
//! - Searches the current directory and its parents for .catalog/config.yaml
//! - Paths in the config file are relative to the project root (parent of .catalog/)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::catalog::BuildContext;

/// Directory holding the config file, relative to the project root
pub const CONFIG_DIR: &str = ".catalog";

/// Config file name inside [`CONFIG_DIR`]
pub const CONFIG_FILE: &str = "config.yaml";

/// Output directory used when nothing else is configured
pub const DEFAULT_OUTPUT_DIR: &str = "public";

/// Quiet period before a watch rebuild
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Source repository (relative to project root)
    pub source: Option<String>,
    /// Output tree (relative to project root)
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchConfig {
    pub debounce_ms: Option<u64>,
}

/// Values given on the command line (or through their environment variables)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub base_url: Option<String>,
    /// Explicit config file, skipping discovery
    pub config_file: Option<PathBuf>,
    pub debounce_ms: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Always ends with `/`
    pub base_url: String,
    pub debounce_ms: u64,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Pack the resolved values for the pipeline
    pub fn to_context(&self) -> BuildContext {
        BuildContext::new(&self.source, &self.output, &self.base_url)
    }
}

/// Find config file by searching `start` and its parents
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`, expanding a leading `~/`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Project root of a config file: the parent of `.catalog/`
fn project_root(config_path: &Path) -> &Path {
    config_path
        .parent()
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."))
}

/// Load configuration, searching for a config file from the current directory
pub fn load_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    resolve_config(overrides, &cwd)
}

/// Merge overrides, config file and defaults relative to `cwd`
pub fn resolve_config(overrides: &ConfigOverrides, cwd: &Path) -> Result<ResolvedConfig> {
    let config_file = match &overrides.config_file {
        Some(path) => Some(resolve_path(cwd, &path.to_string_lossy())),
        None => find_config_file(cwd),
    };

    let (file_source, file_output, file_base_url, file_debounce) = match &config_file {
        Some(config_path) => {
            let config = load_config_file(config_path)?;
            let base_dir = project_root(config_path);

            (
                config.paths.source.map(|p| resolve_path(base_dir, &p)),
                config.paths.output.map(|p| resolve_path(base_dir, &p)),
                config.publish.base_url,
                config.watch.debounce_ms,
            )
        }
        None => (None, None, None, None),
    };

    let source = overrides
        .source
        .as_ref()
        .map(|p| resolve_path(cwd, &p.to_string_lossy()))
        .or(file_source)
        .context("No source repository configured (use --source or CATALOG_SOURCE)")?;

    if !source.is_dir() {
        bail!("Source repository not found: {}", source.display());
    }

    let output = overrides
        .output
        .as_ref()
        .map(|p| resolve_path(cwd, &p.to_string_lossy()))
        .or(file_output)
        .unwrap_or_else(|| cwd.join(DEFAULT_OUTPUT_DIR));

    let mut base_url = overrides
        .base_url
        .clone()
        .or(file_base_url)
        .filter(|url| !url.trim().is_empty())
        .context("No base URL configured (use --base-url or CATALOG_BASE_URL)")?;
    if !base_url.ends_with('/') {
        base_url.push('/');
    }

    Ok(ResolvedConfig {
        source,
        output,
        base_url,
        debounce_ms: overrides
            .debounce_ms
            .or(file_debounce)
            .unwrap_or(DEFAULT_DEBOUNCE_MS),
        config_file,
    })
}
