//! Media references embedded in entity documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where an image or audio asset lives.
///
/// After a build only `Remote` (or the `None` sentinel) may remain in
/// published documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaRef {
    /// Payload is inline in a sibling `embedded*Base64` field
    #[serde(rename = "embedded-base64")]
    Embedded,

    /// Payload already on disk, relative to the record
    Local {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// Payload generated on disk next to the record
    Generated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// Terminal published form
    Remote { url: String },

    /// Sentinel for "no image"
    None,
}

impl MediaRef {
    /// Build a remote reference
    pub fn remote(url: impl Into<String>) -> Self {
        MediaRef::Remote { url: url.into() }
    }

    /// Parse a reference out of an arbitrary JSON value
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Convert to a JSON value for storing back into a record
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Whether the payload is on disk and needs relativizing
    pub fn is_on_disk(&self) -> bool {
        matches!(self, MediaRef::Local { .. } | MediaRef::Generated { .. })
    }

    /// Declared sub-path of an on-disk reference
    pub fn declared_path(&self) -> Option<&str> {
        match self {
            MediaRef::Local { path } | MediaRef::Generated { path } => path
                .as_deref()
                .map(|p| p.trim_start_matches("./").trim_start_matches('/'))
                .filter(|p| !p.is_empty()),
            _ => None,
        }
    }
}

impl Default for MediaRef {
    fn default() -> Self {
        MediaRef::None
    }
}
