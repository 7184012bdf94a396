//! repo-catalog - Content repository to catalog tree generator
//!
//! Reads a source repository of JSON entity documents, media files and
//! zipped Program packages, and writes a static tree that a client can
//! browse over plain HTTP.
//!
//! # Pipeline
//!
//! Every build is a full regeneration:
//! - The output root is deleted and recreated
//! - Each source directory becomes an output directory with an `index.json`
//!   manifest listing its children and their digests
//! - Entities are normalized: ids assigned, embedded media extracted to
//!   files, media references rewritten to published URLs
//! - Program packages are unpacked and get an `entity+deps.json` holding the
//!   program and every user-authored record it references
//!
//! # Modules
//!
//! - `domain`: Data structures (EntityKind, MediaRef, Digest, Manifest)
//! - `catalog`: The build pipeline (walker, media, packages, dependencies)
//! - `config`: Layered configuration
//! - `watch`: Rebuild on source changes
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Build once
//! repo-catalog build --source ./content --base-url https://cdn.example.com/catalog
//!
//! # Rebuild on every change
//! repo-catalog watch
//!
//! # Inspect one entity
//! repo-catalog digest content/Persons/Alice.json
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod domain;
pub mod watch;

// Re-export main types at crate root for convenience
pub use catalog::{build, BuildContext, BuildReport, CatalogError};
pub use config::{ConfigOverrides, ResolvedConfig};
pub use domain::{Digest, EntityKind, EntityRecord, Manifest, ManifestItem, MediaRef};
pub use watch::{CatalogWatcher, WatchError};
