//! Source tree traversal and manifest writing.
//!
//! The walker visits the source tree depth-first. Each entry is handled as a
//! folder entity, a plain directory, a Program package, a standalone JSON
//! entity, or an opaque file. Once every child of a directory is processed,
//! that directory's `index.json` is written.
//!
//! Per-entry failures are logged and counted; they never abort the walk of
//! the enclosing directory.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use walkdir::WalkDir;

use super::dependencies::{build_dependency_bundle, SOUND_ELEMENT_FOLDER};
use super::digest::build_digest;
use super::error::{CatalogError, Result};
use super::files::{
    copy_dir_all, copy_file, is_hidden, join_relative, join_segments, read_record,
    relative_string, write_json,
};
use super::media::{extract_and_rewrite, extract_and_rewrite_sound_element, MediaReport, MediaTarget};
use super::package::{unpack_program_package, UnpackedPackage};
use super::{
    BuildContext, BuildReport, BUNDLE_DOCUMENT, ENTITY_DOCUMENT, MANIFEST_DOCUMENT,
    METADATA_DOCUMENT, PACKAGE_FOLDER, RELEASE_NOTES_DOCUMENT,
};
use crate::domain::{EntityKind, EntityRecord, Manifest, ManifestItem};

/// Key the resolved dependencies are stored under in `entity+deps.json`
pub const DEPENDENCIES_FIELD: &str = "dependencies";

/// Recursive source tree walker
pub struct TreeWalker<'a> {
    ctx: &'a BuildContext,
    report: BuildReport,
}

impl<'a> TreeWalker<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self {
            ctx,
            report: BuildReport::default(),
        }
    }

    pub fn into_report(self) -> BuildReport {
        self.report
    }

    /// Process every entry of `source_dir` into `output_dir`, then write its manifest.
    ///
    /// `relative_path` is the location of `source_dir` below the source root
    /// (empty for the root itself).
    pub fn walk(&mut self, source_dir: &Path, output_dir: &Path, relative_path: &str) -> Result<()> {
        fs::create_dir_all(output_dir).map_err(|e| CatalogError::io(output_dir, e))?;

        let mut entries: Vec<(String, PathBuf)> = fs::read_dir(source_dir)
            .map_err(|e| CatalogError::io(source_dir, e))?
            .filter_map(|entry| match entry {
                Ok(entry) => Some((entry.file_name().to_string_lossy().to_string(), entry.path())),
                Err(e) => {
                    tracing::warn!("Unreadable entry in {}: {}", source_dir.display(), e);
                    None
                }
            })
            .collect();
        entries.sort();

        let mut manifest = Manifest::new();
        for (name, path) in entries {
            if self.is_skipped(&name, &path) {
                continue;
            }

            match self.process_entry(&path, &name, relative_path, output_dir) {
                Ok(Some(item)) => manifest.push(item),
                Ok(None) => {}
                Err(e) => self.warn(format_args!(
                    "Skipping {}: {}",
                    join_relative(relative_path, &name),
                    e
                )),
            }
        }

        let manifest = manifest.with_info(self.read_info(source_dir));
        write_json(&output_dir.join(MANIFEST_DOCUMENT), &manifest)?;
        self.report.directories += 1;

        tracing::debug!(
            "Wrote manifest for /{} ({} items)",
            relative_path,
            manifest.len()
        );
        Ok(())
    }

    fn is_skipped(&self, name: &str, path: &Path) -> bool {
        is_hidden(name)
            || name == MANIFEST_DOCUMENT
            || name == METADATA_DOCUMENT
            || path == self.ctx.output_root
    }

    fn process_entry(
        &mut self,
        path: &Path,
        name: &str,
        relative_path: &str,
        output_dir: &Path,
    ) -> Result<Option<ManifestItem>> {
        let child_relative = join_relative(relative_path, name);
        let kind = EntityKind::from_relative_path(&child_relative);
        let in_kind_folder = !relative_path.is_empty();

        if path.is_dir() {
            if self.is_taken(output_dir, name, &child_relative) {
                return Ok(None);
            }
            if in_kind_folder && path.join(ENTITY_DOCUMENT).is_file() {
                if let Some(item) = self.process_folder_entity(path, name, &child_relative, output_dir, kind)? {
                    return Ok(Some(item));
                }
            }

            if let Err(e) = self.walk(path, &output_dir.join(name), &child_relative) {
                self.warn(format_args!("Incomplete directory {}: {}", child_relative, e));
            }
            return Ok(Some(ManifestItem::directory(name)));
        }

        let extension = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());

        match extension.as_deref() {
            Some("zip") if is_package_folder(&child_relative) => {
                self.process_package(path, &child_relative, output_dir)
            }
            Some("json") if in_kind_folder && name != RELEASE_NOTES_DOCUMENT => {
                self.process_json_entity(path, name, &child_relative, output_dir, kind)
            }
            _ => self.copy_opaque(path, name, &child_relative, output_dir),
        }
    }

    /// A folder whose top level holds `entity.json`.
    ///
    /// Returns `None` when the document cannot be parsed, so the caller
    /// falls back to treating the folder as a plain directory.
    fn process_folder_entity(
        &mut self,
        path: &Path,
        name: &str,
        child_relative: &str,
        output_dir: &Path,
        kind: EntityKind,
    ) -> Result<Option<ManifestItem>> {
        let mut record = match read_record(&path.join(ENTITY_DOCUMENT)) {
            Ok(record) => record,
            Err(e) => {
                self.warn(format_args!(
                    "Treating {} as a plain directory: {}",
                    child_relative, e
                ));
                return Ok(None);
            }
        };

        let entity_dir = output_dir.join(name);
        copy_dir_all(path, &entity_dir)?;

        record.ensure_id();
        let image_file_name = kind.default_image_file_name();
        let target = MediaTarget {
            output_folder: &entity_dir,
            image_file_name: &image_file_name,
            source_relative_path: child_relative,
            is_bundle: false,
        };
        self.rewrite(&mut record, kind, &target);

        write_json(&entity_dir.join(ENTITY_DOCUMENT), &record)?;
        self.report.entities += 1;

        let digest = build_digest(&record, kind, name);
        Ok(Some(ManifestItem::entity(name, digest)))
    }

    /// A standalone `*.json` entity, promoted into its own folder.
    ///
    /// Unparsable documents are copied through and listed as opaque files.
    /// A document whose folder name an earlier sibling already produced is
    /// skipped.
    fn process_json_entity(
        &mut self,
        path: &Path,
        name: &str,
        child_relative: &str,
        output_dir: &Path,
        kind: EntityKind,
    ) -> Result<Option<ManifestItem>> {
        let mut record = match read_record(path) {
            Ok(record) => record,
            Err(e) => {
                self.warn(format_args!(
                    "Copying unparsable entity {} through: {}",
                    child_relative, e
                ));
                return self.copy_opaque(path, name, child_relative, output_dir);
            }
        };

        let base_name = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());
        if self.is_taken(output_dir, &base_name, child_relative) {
            return Ok(None);
        }
        let entity_dir = output_dir.join(&base_name);

        record.ensure_id();
        let image_file_name = kind.default_image_file_name();
        let target = MediaTarget {
            output_folder: &entity_dir,
            image_file_name: &image_file_name,
            source_relative_path: child_relative,
            is_bundle: false,
        };
        self.rewrite(&mut record, kind, &target);

        write_json(&entity_dir.join(ENTITY_DOCUMENT), &record)?;
        self.report.entities += 1;

        let digest = build_digest(&record, kind, &base_name);
        Ok(Some(ManifestItem::entity(base_name, digest)))
    }

    /// A zipped Program package: unpack, aggregate dependencies, normalize media.
    fn process_package(
        &mut self,
        path: &Path,
        child_relative: &str,
        output_dir: &Path,
    ) -> Result<Option<ManifestItem>> {
        let UnpackedPackage {
            folder_name,
            folder,
            mut record,
        } = match unpack_program_package(path, output_dir, child_relative) {
            Ok(unpacked) => unpacked,
            Err(e) => {
                self.warn(format_args!("Skipping package {}: {}", child_relative, e));
                return Ok(None);
            }
        };

        let parent_relative = child_relative
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .unwrap_or("");
        let folder_relative = join_relative(parent_relative, &folder_name);

        // Documents are normalized on disk first so the bundle reads back
        // the same ids and media URLs its siblings were given
        self.normalize_package(&folder, &folder_relative);

        record.ensure_id();
        let image_file_name = EntityKind::Program.default_image_file_name();
        let target = MediaTarget {
            output_folder: &folder,
            image_file_name: &image_file_name,
            source_relative_path: &folder_relative,
            is_bundle: false,
        };
        self.rewrite(&mut record, EntityKind::Program, &target);

        self.write_bundle(&record, &folder, &folder_relative)?;
        write_json(&folder.join(ENTITY_DOCUMENT), &record)?;
        self.report.packages += 1;

        let digest = build_digest(&record, EntityKind::Program, &folder_name);
        Ok(Some(ManifestItem::entity(folder_name, digest)))
    }

    /// Write `entity+deps.json`: the Program record plus the records it
    /// references, read from the already normalized package documents.
    fn write_bundle(&self, program: &EntityRecord, folder: &Path, folder_relative: &str) -> Result<()> {
        let empty = Map::new();
        let bundle = build_dependency_bundle(program.spec().unwrap_or(&empty), folder);
        tracing::debug!(
            "Program {} references {} bundled records",
            folder_relative,
            bundle.len()
        );

        let bundle_path = folder.join(BUNDLE_DOCUMENT);
        let bundle = serde_json::to_value(bundle).map_err(|e| CatalogError::json(&bundle_path, e))?;

        let mut document = program.clone();
        document.insert(DEPENDENCIES_FIELD, bundle);
        write_json(&bundle_path, &document)
    }

    /// Rewrite media in every entity document below a relocated package,
    /// except the Program's own document, which the caller owns.
    fn normalize_package(&mut self, folder: &Path, folder_relative: &str) {
        for entry in WalkDir::new(folder).min_depth(2).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.warn(format_args!("Unreadable package entry in {}: {}", folder_relative, e));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = relative_string(folder, entry.path());
            let Some(location) = PackageDocument::classify(&relative) else {
                continue;
            };

            let mut record = match read_record(entry.path()) {
                Ok(record) => record,
                Err(e) => {
                    self.warn(format_args!("Leaving package document as-is: {}", e));
                    continue;
                }
            };

            let source_relative_path = join_relative(folder_relative, location.source_path());
            let output_folder = join_segments(folder, location.media_dir());

            match location.kind {
                Some(kind) => {
                    let image_file_name = kind.default_image_file_name();
                    let target = MediaTarget {
                        output_folder: &output_folder,
                        image_file_name: &image_file_name,
                        source_relative_path: &source_relative_path,
                        is_bundle: false,
                    };
                    self.rewrite(&mut record, kind, &target);
                }
                None => {
                    let target = MediaTarget {
                        output_folder: &output_folder,
                        image_file_name: "",
                        source_relative_path: &source_relative_path,
                        is_bundle: false,
                    };
                    let report = extract_and_rewrite_sound_element(self.ctx, &mut record, &target);
                    self.absorb(report);
                }
            }

            if let Err(e) = write_json(entry.path(), &record) {
                self.warn(e);
            }
        }
    }

    fn copy_opaque(
        &mut self,
        path: &Path,
        name: &str,
        child_relative: &str,
        output_dir: &Path,
    ) -> Result<Option<ManifestItem>> {
        if self.is_taken(output_dir, name, child_relative) {
            return Ok(None);
        }
        copy_file(path, &output_dir.join(name))?;
        self.report.opaque_files += 1;
        Ok(Some(ManifestItem::file(name, self.ctx.url_for(child_relative))))
    }

    /// Whether an earlier sibling already produced `output_name`.
    ///
    /// Siblings are processed in name order, so a folder `Alice` claims its
    /// output before `Alice.json` does. The later entry is skipped with a warning.
    fn is_taken(&mut self, output_dir: &Path, output_name: &str, child_relative: &str) -> bool {
        if !output_dir.join(output_name).exists() {
            return false;
        }
        self.warn(format_args!(
            "Skipping {}: {} was already produced by an earlier entry",
            child_relative, output_name
        ));
        true
    }

    /// Directory metadata for the manifest `info` field, `{}` when absent
    fn read_info(&mut self, source_dir: &Path) -> Value {
        let path = source_dir.join(METADATA_DOCUMENT);
        if !path.is_file() {
            return Value::Object(Map::new());
        }

        let parsed = fs::read_to_string(&path)
            .map_err(|e| CatalogError::io(&path, e))
            .and_then(|text| serde_json::from_str(&text).map_err(|e| CatalogError::json(&path, e)));

        match parsed {
            Ok(info) => info,
            Err(e) => {
                self.warn(format_args!("Ignoring directory metadata: {}", e));
                Value::Object(Map::new())
            }
        }
    }

    fn rewrite(&mut self, record: &mut EntityRecord, kind: EntityKind, target: &MediaTarget<'_>) {
        let report = extract_and_rewrite(self.ctx, record, kind, target);
        self.absorb(report);
    }

    fn absorb(&mut self, report: MediaReport) {
        self.report.media_files += report.files_written;
        self.report.warnings += report.failures;
    }

    fn warn(&mut self, message: impl Display) {
        tracing::warn!("{}", message);
        self.report.warnings += 1;
    }
}

/// Whether a source-relative path sits under the reserved package folder
fn is_package_folder(child_relative: &str) -> bool {
    child_relative
        .split_once('/')
        .is_some_and(|(top, _)| top.eq_ignore_ascii_case(PACKAGE_FOLDER))
}

/// An entity document found inside a relocated package
#[derive(Debug, PartialEq, Eq)]
struct PackageDocument<'a> {
    /// Package-relative path of the document
    relative: &'a str,

    /// `None` for sound elements
    kind: Option<EntityKind>,
}

impl<'a> PackageDocument<'a> {
    /// Classify a package-relative file path.
    ///
    /// Recognizes `<kind>/<id>/entity.json`, sound elements stored as
    /// `soundset/<id>/soundElement/<x>/entity.json` or `.../<x>.json`, and
    /// any other nested `entity.json` as an entity of unknown kind.
    fn classify(relative: &'a str) -> Option<Self> {
        let segments: Vec<&str> = relative.split('/').collect();
        let file_name = *segments.last()?;
        let in_element_folder = segments.len() >= 2
            && segments[segments.len() - 2] == SOUND_ELEMENT_FOLDER;

        if file_name == ENTITY_DOCUMENT && segments.len() >= 2 {
            let in_element_folder = segments.len() >= 3
                && segments[segments.len() - 3] == SOUND_ELEMENT_FOLDER;
            let kind = if in_element_folder {
                None
            } else if segments.len() == 3 {
                Some(EntityKind::from_folder_name(segments[0]))
            } else {
                Some(EntityKind::Unknown)
            };
            return Some(Self { relative, kind });
        }

        if in_element_folder && file_name.ends_with(".json") {
            return Some(Self { relative, kind: None });
        }

        None
    }

    /// Location passed to the media rewriter: the folder for `entity.json`
    /// documents, the file itself for loose sound-element files
    fn source_path(&self) -> &'a str {
        match self.relative.strip_suffix(ENTITY_DOCUMENT) {
            Some(folder) => folder.trim_end_matches('/'),
            None => self.relative,
        }
    }

    /// Package-relative folder media is extracted into
    fn media_dir(&self) -> &'a str {
        let source = self.source_path();
        source.strip_suffix(".json").unwrap_or(source)
    }
}
