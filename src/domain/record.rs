//! Semi-structured entity documents.
//!
//! Records are kept as raw JSON so that fields the pipeline does not
//! understand survive a parse/rewrite/serialize cycle untouched. Only the
//! handful of fields the pipeline owns are read or written through the
//! accessors here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Values of `type` that mark a built-in entity
pub const PREDEFINED_TYPES: [&str; 2] = ["predefined", "preInstalled"];

/// Deepest array/object nesting serde_json's parser accepts
pub const MAX_NESTING_DEPTH: usize = 127;

/// Deepest array/object nesting in a JSON text, ignoring brackets inside strings.
///
/// Runs on raw text, so it also answers for documents the parser would refuse.
pub fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for byte in text.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

/// A parsed entity document (`{"spec": {...}, ...}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRecord(Map<String, Value>);

impl EntityRecord {
    /// Wrap a parsed document. Only JSON objects are entity documents.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Parse a document from text
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value).ok_or_else(|| {
            <serde_json::Error as serde::de::Error>::custom("entity document must be a JSON object")
        })
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a top-level field
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// The `spec` payload, if present
    pub fn spec(&self) -> Option<&Map<String, Value>> {
        self.0.get("spec").and_then(Value::as_object)
    }

    /// The `spec` payload, created empty when missing or not an object
    pub fn spec_mut(&mut self) -> &mut Map<String, Value> {
        if !self.0.get("spec").is_some_and(Value::is_object) {
            self.0.insert("spec".to_string(), Value::Object(Map::new()));
        }
        match self.0.get_mut("spec") {
            Some(Value::Object(spec)) => spec,
            _ => unreachable!("spec was just made an object"),
        }
    }

    /// String field from `spec`
    pub fn spec_str(&self, key: &str) -> Option<&str> {
        self.spec()
            .and_then(|spec| spec.get(key))
            .and_then(Value::as_str)
    }

    /// The entity id, if it has a non-empty one
    pub fn id(&self) -> Option<&str> {
        self.spec_str("id").filter(|id| !id.is_empty())
    }

    /// Assign a fresh id when none is present. Returns the id in effect.
    pub fn ensure_id(&mut self) -> String {
        if let Some(id) = self.id() {
            return id.to_string();
        }
        let id = Uuid::new_v4().to_string();
        self.spec_mut().insert("id".to_string(), Value::String(id.clone()));
        id
    }

    /// Whether this record is a built-in entity (`type` is predefined/preInstalled)
    pub fn is_predefined(&self) -> bool {
        let marker = self
            .spec_str("type")
            .or_else(|| self.0.get("type").and_then(Value::as_str));
        marker.is_some_and(|t| PREDEFINED_TYPES.contains(&t))
    }
}
