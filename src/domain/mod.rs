//! Domain types for the catalog builder.
//!
//! This module contains the data structures the pipeline reads and writes:
//! - Kinds: the closed set of entity kinds
//! - Records: semi-structured entity documents
//! - Media references, digests, manifests and dependency bundles

pub mod bundle;
pub mod digest;
pub mod kind;
pub mod manifest;
pub mod media;
pub mod record;

// Re-export commonly used types
pub use bundle::DependencyBundle;
pub use digest::{Digest, DigestBase};
pub use kind::EntityKind;
pub use manifest::{Manifest, ManifestItem};
pub use media::MediaRef;
pub use record::EntityRecord;
