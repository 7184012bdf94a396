//! Digests: flat per-kind summaries listed in directory manifests.
//!
//! One variant per recognized kind plus a generic fallback. Every variant
//! flattens the common [`DigestBase`] fields into its own JSON object.

use serde::Serialize;
use serde_json::Value;

use super::media::MediaRef;

/// Fields every digest carries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestBase {
    pub entity_type: String,
    pub id: String,
    pub name: String,
    /// Epoch seconds
    pub last_modified: i64,
    pub image_source: MediaRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDigest {
    #[serde(flatten)]
    pub base: DigestBase,
    pub personality: String,
    #[serde(rename = "type")]
    pub person_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedDigest {
    #[serde(flatten)]
    pub base: DigestBase,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundSetDigest {
    #[serde(flatten)]
    pub base: DigestBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sound_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerativeAiDigest {
    #[serde(flatten)]
    pub base: DigestBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContentDigest {
    #[serde(flatten)]
    pub base: DigestBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiContentDigest {
    #[serde(flatten)]
    pub base: DigestBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramDigest {
    #[serde(flatten)]
    pub base: DigestBase,
    pub lang: Value,
    pub program_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastDigest {
    #[serde(flatten)]
    pub base: DigestBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDigest {
    #[serde(flatten)]
    pub base: DigestBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub item_count: usize,
}

/// Kind-specific digest
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Digest {
    Person(PersonDigest),
    Feed(FeedDigest),
    SoundSet(SoundSetDigest),
    GenerativeAi(GenerativeAiDigest),
    PageContent(PageContentDigest),
    ApiContent(ApiContentDigest),
    Program(ProgramDigest),
    Broadcast(BroadcastDigest),
    Catalog(CatalogDigest),
    Generic(DigestBase),
}

impl Digest {
    /// Common fields of any variant
    pub fn base(&self) -> &DigestBase {
        match self {
            Digest::Person(d) => &d.base,
            Digest::Feed(d) => &d.base,
            Digest::SoundSet(d) => &d.base,
            Digest::GenerativeAi(d) => &d.base,
            Digest::PageContent(d) => &d.base,
            Digest::ApiContent(d) => &d.base,
            Digest::Program(d) => &d.base,
            Digest::Broadcast(d) => &d.base,
            Digest::Catalog(d) => &d.base,
            Digest::Generic(base) => base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
