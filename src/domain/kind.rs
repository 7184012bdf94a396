//! Entity kinds and the source-tree conventions tied to them.
//!
//! The kind of an entity is never stored inside its document. It is inferred
//! from the top-level folder the entity lives under.

use serde::{Deserialize, Serialize};

/// Kind of content entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Person,
    Feed,
    SoundSet,
    GenerativeAi,
    PageContent,
    ApiContent,
    Program,
    Broadcast,
    Catalog,
    Unknown,
}

impl EntityKind {
    /// All recognized kinds (excludes `Unknown`)
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Person,
        EntityKind::Feed,
        EntityKind::SoundSet,
        EntityKind::GenerativeAi,
        EntityKind::PageContent,
        EntityKind::ApiContent,
        EntityKind::Program,
        EntityKind::Broadcast,
        EntityKind::Catalog,
    ];

    /// Infer the kind from a top-level folder name.
    ///
    /// Matching is case-insensitive and accepts both `Persons` and `Person`.
    pub fn from_folder_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);

        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == singular)
            .unwrap_or(EntityKind::Unknown)
    }

    /// Infer the kind from a source-relative path (`Persons/Alice.json`).
    ///
    /// Entries sitting directly in the source root have no kind folder.
    pub fn from_relative_path(relative_path: &str) -> Self {
        let mut segments = relative_path.split('/').filter(|s| !s.is_empty());
        match (segments.next(), segments.next()) {
            (Some(top), Some(_)) => Self::from_folder_name(top),
            _ => EntityKind::Unknown,
        }
    }

    /// Lowercase key used for package folders and default image names
    pub fn key(&self) -> &'static str {
        match self {
            EntityKind::Person => "person",
            EntityKind::Feed => "feed",
            EntityKind::SoundSet => "soundset",
            EntityKind::GenerativeAi => "generativeai",
            EntityKind::PageContent => "pagecontent",
            EntityKind::ApiContent => "apicontent",
            EntityKind::Program => "program",
            EntityKind::Broadcast => "broadcast",
            EntityKind::Catalog => "catalog",
            EntityKind::Unknown => "unknown",
        }
    }

    /// Value written to a digest's `entityType` field
    pub fn entity_type(&self) -> &'static str {
        match self {
            EntityKind::Person => "Person",
            EntityKind::Feed => "Feed",
            EntityKind::SoundSet => "SoundSet",
            EntityKind::GenerativeAi => "GenerativeAi",
            EntityKind::PageContent => "PageContent",
            EntityKind::ApiContent => "ApiContent",
            EntityKind::Program => "Program",
            EntityKind::Broadcast => "Broadcast",
            EntityKind::Catalog => "Catalog",
            EntityKind::Unknown => "Unknown",
        }
    }

    /// File name an extracted image is written under
    pub fn default_image_file_name(&self) -> String {
        match self {
            EntityKind::Unknown => "image.png".to_string(),
            kind => format!("{}.png", kind.key()),
        }
    }

    /// Whether the image reference lives in `spec.extensions` as a serialized string
    pub fn uses_nested_image(&self) -> bool {
        matches!(
            self,
            EntityKind::ApiContent | EntityKind::PageContent | EntityKind::GenerativeAi
        )
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.entity_type())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match EntityKind::from_folder_name(s) {
            EntityKind::Unknown if !s.eq_ignore_ascii_case("unknown") => {
                anyhow::bail!("Unknown entity kind: {}", s)
            }
            kind => Ok(kind),
        }
    }
}
