//! Dependency bundle attached to unpacked Program packages.

use serde::Serialize;
use serde_json::Value;

use super::kind::EntityKind;

/// Every user-authored entity a Program references, as full records.
///
/// Serialized under the `dependencies` key of `entity+deps.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyBundle {
    pub persons: Vec<Value>,
    pub sound_sets: Vec<Value>,
    pub sound_elements: Vec<Value>,
    pub feeds: Vec<Value>,
    pub api_contents: Vec<Value>,
    pub page_contents: Vec<Value>,
    pub generative_ais: Vec<Value>,
}

impl DependencyBundle {
    /// Group list that records of `kind` are collected into
    pub fn group_mut(&mut self, kind: EntityKind) -> Option<&mut Vec<Value>> {
        match kind {
            EntityKind::Person => Some(&mut self.persons),
            EntityKind::SoundSet => Some(&mut self.sound_sets),
            EntityKind::Feed => Some(&mut self.feeds),
            EntityKind::ApiContent => Some(&mut self.api_contents),
            EntityKind::PageContent => Some(&mut self.page_contents),
            EntityKind::GenerativeAi => Some(&mut self.generative_ais),
            _ => None,
        }
    }

    /// Total number of bundled records
    pub fn len(&self) -> usize {
        self.persons.len()
            + self.sound_sets.len()
            + self.sound_elements.len()
            + self.feeds.len()
            + self.api_contents.len()
            + self.page_contents.len()
            + self.generative_ais.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
