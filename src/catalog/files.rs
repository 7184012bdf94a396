//! Whole-file helpers shared by the pipeline stages.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::error::{CatalogError, Result};
use crate::domain::record::{nesting_depth, MAX_NESTING_DEPTH};
use crate::domain::EntityRecord;

/// Read and parse an entity document.
///
/// Documents nested deeper than the JSON parser accepts are refused up front
/// with [`CatalogError::TooDeep`].
pub fn read_record(path: &Path) -> Result<EntityRecord> {
    let text = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;

    let depth = nesting_depth(&text);
    if depth > MAX_NESTING_DEPTH {
        return Err(CatalogError::TooDeep {
            path: path.to_path_buf(),
            depth,
            limit: MAX_NESTING_DEPTH,
        });
    }

    EntityRecord::parse(&text).map_err(|e| CatalogError::json(path, e))
}

/// Serialize `value` as pretty JSON, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| CatalogError::json(path, e))?;
    write_bytes(path, content.as_bytes())
}

/// Write bytes, creating parent directories
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| CatalogError::io(path, e))
}

/// Copy a single file, creating parent directories
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
    }
    fs::copy(from, to).map_err(|e| CatalogError::io(from, e))?;
    Ok(())
}

/// Recursively copy a directory tree
pub fn copy_dir_all(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            CatalogError::io(path, e.into())
        })?;

        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| CatalogError::io(&target, e))?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Join two forward-slash relative paths, ignoring empty sides
pub fn join_relative(base: &str, tail: &str) -> String {
    let base = base.trim_matches('/');
    let tail = tail.trim_matches('/');
    match (base.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, tail),
    }
}

/// Resolve a forward-slash relative path under `root`
pub fn join_segments(root: &Path, relative_path: &str) -> PathBuf {
    relative_path
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

/// Forward-slash form of `path` relative to `base`
pub fn relative_string(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Make a display name safe to use as a single path segment.
///
/// Falls back to `fallback` when nothing usable remains.
pub fn sanitize_file_name(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();

    if cleaned.is_empty() {
        if fallback.is_empty() {
            "untitled".to_string()
        } else {
            sanitize_file_name(fallback, "")
        }
    } else {
        cleaned.to_string()
    }
}

/// Whether a directory entry name is hidden
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}
