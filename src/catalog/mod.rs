//! Catalog generation pipeline.
//!
//! Turns a source repository of entity documents into a publishable tree.
//!
//! # Output Layout
//!
//! ```text
//! <output>/
//! ├── index.json                    # Manifest of the root directory
//! ├── Persons/
//! │   ├── index.json
//! │   └── Alice/
//! │       ├── entity.json           # Canonical entity document
//! │       └── person.png            # Extracted image
//! └── Programs/
//!     ├── index.json
//!     └── Morning Show/             # Unpacked from Morning Show.zip
//!         ├── entity.json
//!         ├── entity+deps.json      # Program + resolved dependencies
//!         └── feed/<id>/entity.json
//! ```
//!
//! The output root is deleted and rebuilt on every run.

pub mod dependencies;
pub mod digest;
pub mod error;
pub mod files;
pub mod media;
pub mod package;
pub mod walker;

use std::path::PathBuf;

use serde::Serialize;

pub use dependencies::build_dependency_bundle;
pub use digest::build_digest;
pub use error::CatalogError;
pub use media::{extract_and_rewrite, MediaReport, MediaTarget};
pub use package::unpack_program_package;
pub use walker::TreeWalker;

/// File name marking a folder as a single entity
pub const ENTITY_DOCUMENT: &str = "entity.json";

/// Program document with its resolved dependencies
pub const BUNDLE_DOCUMENT: &str = "entity+deps.json";

/// Per-directory listing written to every output directory
pub const MANIFEST_DOCUMENT: &str = "index.json";

/// Optional directory metadata, read into the manifest `info` field
pub const METADATA_DOCUMENT: &str = "meta.json";

/// Release notes, copied through unchanged
pub const RELEASE_NOTES_DOCUMENT: &str = "release-notes.json";

/// Top-level folder where Program packages (zip archives) are expected
pub const PACKAGE_FOLDER: &str = "Programs";

/// Values threaded through every pipeline stage
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Root of the source repository
    pub source_root: PathBuf,

    /// Root of the generated catalog tree
    pub output_root: PathBuf,

    /// Published prefix for media and download URLs, always ends with `/`
    pub base_url: String,
}

impl BuildContext {
    pub fn new(
        source_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        base_url: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
            base_url,
        }
    }

    /// Absolute URL of an output-relative path
    pub fn url_for(&self, relative_path: &str) -> String {
        format!("{}{}", self.base_url, relative_path.trim_start_matches('/'))
    }
}

/// Counts gathered over one full build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub directories: usize,
    pub entities: usize,
    pub packages: usize,
    pub opaque_files: usize,
    pub media_files: usize,
    pub warnings: usize,
}

/// Regenerate the whole output tree from the source tree.
///
/// Fails only on setup errors (missing source root, unusable output root);
/// per-item problems are logged and counted in the report.
pub fn build(ctx: &BuildContext) -> Result<BuildReport, CatalogError> {
    if !ctx.source_root.is_dir() {
        return Err(CatalogError::SourceNotFound(ctx.source_root.clone()));
    }

    if ctx.output_root.exists() {
        std::fs::remove_dir_all(&ctx.output_root)
            .map_err(|e| CatalogError::io(&ctx.output_root, e))?;
    }
    std::fs::create_dir_all(&ctx.output_root).map_err(|e| CatalogError::io(&ctx.output_root, e))?;

    tracing::info!(
        "Building catalog {} -> {}",
        ctx.source_root.display(),
        ctx.output_root.display()
    );

    let mut walker = TreeWalker::new(ctx);
    walker.walk(&ctx.source_root, &ctx.output_root, "")?;
    let report = walker.into_report();

    tracing::info!(
        "Catalog built: {} entities, {} packages, {} files, {} directories ({} warnings)",
        report.entities,
        report.packages,
        report.opaque_files,
        report.directories,
        report.warnings
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let ctx = BuildContext::new("/src", "/out", "http://x");
        assert_eq!(ctx.base_url, "http://x/");
        assert_eq!(ctx.url_for("Persons/Alice/person.png"), "http://x/Persons/Alice/person.png");

        let ctx = BuildContext::new("/src", "/out", "http://x/");
        assert_eq!(ctx.url_for("/a"), "http://x/a");
    }

    #[test]
    fn test_missing_source_root_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        let ctx = BuildContext::new(temp.path().join("missing"), temp.path().join("out"), "http://x");
        assert!(matches!(build(&ctx), Err(CatalogError::SourceNotFound(_))));
    }
}
