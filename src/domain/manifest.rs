//! Per-directory listing manifests (`index.json`).

use serde::Serialize;
use serde_json::{Map, Value};

use super::digest::Digest;

/// Listing document written once per output directory
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    /// Directory metadata, `{}` when the directory has none
    pub info: Value,

    /// Entries in listing order
    pub items: Vec<ManifestItem>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            info: Value::Object(Map::new()),
            items: Vec::new(),
        }
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = info;
        self
    }

    pub fn push(&mut self, item: ManifestItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One manifest entry: a directory stub, an opaque file, or an entity
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub name: String,
    pub path: String,
    pub is_directory: bool,

    #[serde(rename = "downloadURL", skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
}

impl ManifestItem {
    /// Stub for a plain subdirectory
    pub fn directory(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            is_directory: true,
            download_url: None,
            digest: None,
        }
    }

    /// Stub for a file copied through as-is
    pub fn file(name: impl Into<String>, download_url: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            is_directory: false,
            download_url: Some(download_url.into()),
            digest: None,
        }
    }

    /// Stub for a processed entity folder
    pub fn entity(name: impl Into<String>, digest: Digest) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            is_directory: false,
            download_url: None,
            digest: Some(digest),
        }
    }
}
