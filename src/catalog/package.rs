//! Program package (zip) unpacking.
//!
//! A package is extracted into a hidden scratch directory next to its final
//! location, searched for the first entity document, and the subtree holding
//! it is moved into the output tree under a name derived from the entity.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use super::digest::build_digest;
use super::error::{CatalogError, Result};
use super::files::{copy_dir_all, is_hidden, read_record, sanitize_file_name};
use super::ENTITY_DOCUMENT;
use crate::domain::{EntityKind, EntityRecord};

/// Archive metadata folders that never hold entities
const IGNORED_FOLDERS: [&str; 1] = ["__MACOSX"];

/// A package relocated into the output tree
#[derive(Debug, Clone)]
pub struct UnpackedPackage {
    /// Folder name under the output parent directory
    pub folder_name: String,

    /// Absolute location of the relocated subtree
    pub folder: PathBuf,

    /// Program record as found in the package
    pub record: EntityRecord,
}

/// Unpack `zip_path` into `output_parent_dir`.
///
/// The scratch directory is removed on every exit path when the `TempDir`
/// guard drops.
pub fn unpack_program_package(
    zip_path: &Path,
    output_parent_dir: &Path,
    source_relative_path: &str,
) -> Result<UnpackedPackage> {
    fs::create_dir_all(output_parent_dir).map_err(|e| CatalogError::io(output_parent_dir, e))?;

    let scratch = tempfile::Builder::new()
        .prefix(".unpack-")
        .tempdir_in(output_parent_dir)
        .map_err(|e| CatalogError::io(output_parent_dir, e))?;

    let file = File::open(zip_path).map_err(|e| CatalogError::io(zip_path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| CatalogError::Zip {
        path: zip_path.to_path_buf(),
        source: e,
    })?;
    archive.extract(scratch.path()).map_err(|e| CatalogError::Zip {
        path: zip_path.to_path_buf(),
        source: e,
    })?;

    let entity_dir = find_entity_dir(scratch.path())
        .ok_or_else(|| CatalogError::NoEntityDocument(zip_path.to_path_buf()))?;
    let record = read_record(&entity_dir.join(ENTITY_DOCUMENT))?;

    let archive_name = zip_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let digest = build_digest(&record, EntityKind::Program, &archive_name);
    let folder_name = unique_folder_name(
        output_parent_dir,
        &sanitize_file_name(digest.name(), &archive_name),
    );
    let folder = output_parent_dir.join(&folder_name);

    relocate(&entity_dir, &folder)?;

    tracing::debug!(
        "Unpacked {} into {}",
        source_relative_path,
        folder.display()
    );

    Ok(UnpackedPackage {
        folder_name,
        folder,
        record,
    })
}

/// Depth-first search for the first folder holding an entity document.
///
/// A folder's own document wins over anything below it; children are
/// visited in name order.
pub fn find_entity_dir(root: &Path) -> Option<PathBuf> {
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if dir.join(ENTITY_DOCUMENT).is_file() {
            return Some(dir);
        }

        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        let mut children: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                !is_hidden(&name) && !IGNORED_FOLDERS.contains(&name.as_str())
            })
            .map(|e| e.path())
            .collect();

        // Reverse so the smallest name is popped first
        children.sort();
        stack.extend(children.into_iter().rev());
    }

    None
}

fn unique_folder_name(parent: &Path, preferred: &str) -> String {
    if !parent.join(preferred).exists() {
        return preferred.to_string();
    }
    (2..)
        .map(|n| format!("{} ({})", preferred, n))
        .find(|candidate| !parent.join(candidate).exists())
        .unwrap_or_else(|| preferred.to_string())
}

fn relocate(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_dir_all(from, to)
}
