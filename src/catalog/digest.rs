//! Digest construction.
//!
//! [`build_digest`] is total: any record, including an empty one, yields a
//! digest with `entityType`, `id`, `name` and `lastModified` populated.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::domain::digest::{
    ApiContentDigest, BroadcastDigest, CatalogDigest, FeedDigest, GenerativeAiDigest,
    PageContentDigest, PersonDigest, ProgramDigest, SoundSetDigest,
};
use crate::domain::{Digest, DigestBase, EntityKind, EntityRecord, MediaRef};

/// BGM category arrays carried by SoundSets
pub const BGM_CATEGORIES: [&str; 5] = [
    "openingBGM",
    "talkBGM",
    "newsBGM",
    "endingBGM",
    "jingleBGM",
];

/// Extension map holding serialized image metadata
pub const EXTENSIONS_FIELD: &str = "extensions";

/// Direct image reference field
pub const IMAGE_SOURCE_FIELD: &str = "imageSource";

const UNTITLED_BROADCAST: &str = "Untitled Broadcast";

/// Values above this are treated as milliseconds
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Build the digest of `record` as an entity of `kind`.
///
/// `fallback_name` (usually the file or folder base name) is used when the
/// record carries no name.
pub fn build_digest(record: &EntityRecord, kind: EntityKind, fallback_name: &str) -> Digest {
    let empty = Map::new();
    let spec = record.spec().unwrap_or(&empty);

    let name = match kind {
        EntityKind::Broadcast => broadcast_name(spec),
        _ => str_field(spec, "name").unwrap_or(fallback_name).to_string(),
    };

    let base = DigestBase {
        entity_type: kind.entity_type().to_string(),
        id: record
            .id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        name,
        last_modified: parse_last_modified(spec.get("lastModified"), Utc::now()),
        image_source: resolve_image(record, kind),
    };

    match kind {
        EntityKind::Person => Digest::Person(PersonDigest {
            base,
            personality: string_or(spec, "personality", "dj"),
            person_type: string_or(spec, "type", "userdefined"),
            voice_id: owned(spec, "voiceId"),
        }),
        EntityKind::Feed => Digest::Feed(FeedDigest {
            base,
            url: string_or(spec, "url", ""),
            category: owned(spec, "category"),
        }),
        EntityKind::SoundSet => Digest::SoundSet(SoundSetDigest {
            base,
            description: owned(spec, "description"),
            sound_count: BGM_CATEGORIES
                .iter()
                .filter_map(|category| spec.get(*category).and_then(Value::as_array))
                .map(Vec::len)
                .sum(),
        }),
        EntityKind::GenerativeAi => Digest::GenerativeAi(GenerativeAiDigest {
            base,
            provider: owned(spec, "provider"),
            model: owned(spec, "model"),
        }),
        EntityKind::PageContent => Digest::PageContent(PageContentDigest {
            base,
            url: owned(spec, "url"),
        }),
        EntityKind::ApiContent => Digest::ApiContent(ApiContentDigest {
            base,
            endpoint: owned(spec, "endpoint"),
            method: string_or(spec, "method", "GET"),
        }),
        EntityKind::Program => Digest::Program(ProgramDigest {
            base,
            lang: spec
                .get("lang")
                .filter(|lang| lang.is_object())
                .cloned()
                .unwrap_or_else(|| json!({"code": "en", "language": "english"})),
            program_mode: string_or(spec, "programMode", "Basic"),
            description: owned(spec, "description"),
        }),
        EntityKind::Broadcast => Digest::Broadcast(BroadcastDigest {
            base,
            program_id: owned(spec, "programId"),
        }),
        EntityKind::Catalog => Digest::Catalog(CatalogDigest {
            base,
            description: owned(spec, "description"),
            item_count: spec
                .get("items")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0),
        }),
        EntityKind::Unknown => Digest::Generic(base),
    }
}

/// Resolve the image reference of a record.
///
/// Prefers a direct `spec.imageSource`; kinds that keep image metadata in
/// `spec.extensions.imageSource` as a serialized string are parsed from there.
/// Anything else resolves to [`MediaRef::None`].
pub fn resolve_image(record: &EntityRecord, kind: EntityKind) -> MediaRef {
    let Some(spec) = record.spec() else {
        return MediaRef::None;
    };

    if let Some(direct) = spec.get(IMAGE_SOURCE_FIELD).and_then(MediaRef::from_value) {
        return direct;
    }

    if kind.uses_nested_image() {
        if let Some(serialized) = nested_image_string(spec) {
            return match serde_json::from_str::<MediaRef>(serialized) {
                Ok(media) => media,
                Err(e) => {
                    tracing::warn!(
                        "Malformed image metadata on {} {}: {}",
                        kind,
                        record.id().unwrap_or("<no id>"),
                        e
                    );
                    MediaRef::None
                }
            };
        }
    }

    MediaRef::None
}

/// Serialized image metadata in `spec.extensions.imageSource`
pub fn nested_image_string(spec: &Map<String, Value>) -> Option<&str> {
    spec.get(EXTENSIONS_FIELD)
        .and_then(|ext| ext.get(IMAGE_SOURCE_FIELD))
        .and_then(Value::as_str)
}

/// Normalize `lastModified` to epoch seconds, defaulting to `now`
pub fn parse_last_modified(value: Option<&Value>, now: DateTime<Utc>) -> i64 {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(normalize_epoch),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .map(normalize_epoch)
                .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp()))
        }
        _ => None,
    };

    parsed.unwrap_or_else(|| now.timestamp())
}

fn normalize_epoch(value: i64) -> i64 {
    if value > MILLIS_THRESHOLD {
        value / 1000
    } else {
        value
    }
}

fn broadcast_name(spec: &Map<String, Value>) -> String {
    let headlines: Vec<&str> = spec
        .get("headline")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if headlines.is_empty() {
        UNTITLED_BROADCAST.to_string()
    } else {
        headlines.join(", ")
    }
}

fn str_field<'a>(spec: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    spec.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn owned(spec: &Map<String, Value>, key: &str) -> Option<String> {
    str_field(spec, key).map(str::to_string)
}

fn string_or(spec: &Map<String, Value>, key: &str, default: &str) -> String {
    str_field(spec, key).unwrap_or(default).to_string()
}
