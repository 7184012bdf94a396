//! Errors raised inside the catalog pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Source root does not exist: {0}")]
    SourceNotFound(PathBuf),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid entity document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Zip error in {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Invalid media payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("No entity document found in package: {0}")]
    NoEntityDocument(PathBuf),

    #[error("Invalid dependency id: {0:?}")]
    InvalidId(String),

    #[error("Entity document {path} nests {depth} levels deep (parser limit {limit})")]
    TooDeep {
        path: PathBuf,
        depth: usize,
        limit: usize,
    },
}

impl CatalogError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        CatalogError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
