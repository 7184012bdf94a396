//! Embedded media extraction and reference rewriting.
//!
//! After [`extract_and_rewrite`] runs, a record carries no embedded payloads
//! and no `local`/`generated` references: every media reference it keeps is
//! `remote`, pointing at the published location under the base URL.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::digest::{resolve_image, BGM_CATEGORIES, EXTENSIONS_FIELD, IMAGE_SOURCE_FIELD};
use super::error::{CatalogError, Result};
use super::files::{join_relative, sanitize_file_name, write_bytes};
use super::BuildContext;
use crate::domain::{EntityKind, EntityRecord, MediaRef};

/// Inline image payload on a record's spec
pub const EMBEDDED_IMAGE_FIELD: &str = "embeddedImageBase64";

/// Inline audio payload on a sound element
pub const EMBEDDED_AUDIO_FIELD: &str = "embeddedAudioBase64";

/// Declared original file name of an inline audio payload
pub const EMBEDDED_AUDIO_NAME_FIELD: &str = "embeddedAudioFileName";

/// Sound element reference field
pub const SOUND_SOURCE_FIELD: &str = "soundSource";

/// Folder extracted audio is written under, relative to the entity folder
pub const SOUNDS_DIR: &str = "sounds";

const DEFAULT_AUDIO_EXTENSION: &str = "m4a";

/// Where a record's media lands on disk and under the base URL
#[derive(Debug, Clone)]
pub struct MediaTarget<'a> {
    /// Folder the record's extracted media is written into
    pub output_folder: &'a Path,

    /// File name an extracted image is written under
    pub image_file_name: &'a str,

    /// Source-relative location of the record (`Persons/Alice.json`, `Persons/Alice`)
    pub source_relative_path: &'a str,

    /// Record belongs to an aggregated `entity+deps.json` document
    pub is_bundle: bool,
}

impl MediaTarget<'_> {
    /// Published folder of the record, relative to the base URL
    pub fn published_dir(&self) -> String {
        published_dir(self.source_relative_path, self.is_bundle)
    }
}

/// Counts from one rewrite pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaReport {
    pub files_written: usize,
    pub failures: usize,
}

impl MediaReport {
    pub fn merge(&mut self, other: MediaReport) {
        self.files_written += other.files_written;
        self.failures += other.failures;
    }
}

/// Published folder for a record at `source_relative_path`.
///
/// A standalone `.json` file is promoted into a folder named after its base
/// name, so that segment is appended. Folder entities and records inside an
/// aggregated bundle already name their folder and get no extra segment.
pub fn published_dir(source_relative_path: &str, is_bundle: bool) -> String {
    let trimmed = source_relative_path.trim_matches('/');
    match trimmed.strip_suffix(".json") {
        Some(without_extension) if !is_bundle => without_extension.to_string(),
        _ => trimmed.to_string(),
    }
}

/// Decode an inline base64 payload, tolerating a `data:` URI prefix and whitespace
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let data = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

/// Extract inline media from `record` and rewrite its references to `remote`.
///
/// Mutates `record` in place. Media-level failures are logged and counted;
/// the record is left with its embedded fields already stripped.
pub fn extract_and_rewrite(
    ctx: &BuildContext,
    record: &mut EntityRecord,
    kind: EntityKind,
    target: &MediaTarget<'_>,
) -> MediaReport {
    let mut report = MediaReport::default();
    let published = target.published_dir();

    let has_embedded = record
        .spec()
        .is_some_and(|spec| spec.contains_key(EMBEDDED_IMAGE_FIELD));
    let embedded = if has_embedded {
        record.spec_mut().remove(EMBEDDED_IMAGE_FIELD)
    } else {
        None
    };
    match embedded {
        Some(Value::String(payload)) => {
            let relative = join_relative(&published, target.image_file_name);
            let destination = target.output_folder.join(target.image_file_name);

            match decode_base64(&payload).and_then(|bytes| write_bytes(&destination, &bytes)) {
                Ok(()) => {
                    report.files_written += 1;
                    set_image_ref(record, kind, MediaRef::remote(ctx.url_for(&relative)));
                }
                Err(e) => {
                    tracing::warn!("Failed to extract image for {}: {}", published, e);
                    report.failures += 1;
                    if resolve_image(record, kind) == MediaRef::Embedded {
                        set_image_ref(record, kind, MediaRef::None);
                    }
                }
            }
        }
        _ => match resolve_image(record, kind) {
            media if media.is_on_disk() => {
                let file = media.declared_path().unwrap_or(target.image_file_name);
                let relative = join_relative(&published, file);
                set_image_ref(record, kind, MediaRef::remote(ctx.url_for(&relative)));
            }
            MediaRef::Embedded => {
                tracing::warn!("Embedded image reference without payload in {}", published);
                set_image_ref(record, kind, MediaRef::None);
            }
            _ => {}
        },
    }

    if kind == EntityKind::SoundSet && record.spec().is_some() {
        let spec = record.spec_mut();
        for category in BGM_CATEGORIES {
            let Some(Value::Array(elements)) = spec.get_mut(category) else {
                continue;
            };
            for element in elements.iter_mut().filter_map(Value::as_object_mut) {
                report.merge(rewrite_sound_element(ctx, element, target.output_folder, &published));
            }
        }
    }

    report
}

/// Rewrite a standalone sound-element record (as found in dependency bundles)
pub fn extract_and_rewrite_sound_element(
    ctx: &BuildContext,
    record: &mut EntityRecord,
    target: &MediaTarget<'_>,
) -> MediaReport {
    let published = target.published_dir();
    rewrite_sound_element(ctx, record.spec_mut(), target.output_folder, &published)
}

fn rewrite_sound_element(
    ctx: &BuildContext,
    element: &mut Map<String, Value>,
    output_folder: &Path,
    published: &str,
) -> MediaReport {
    let mut report = MediaReport::default();

    let Some(payload) = element.remove(EMBEDDED_AUDIO_FIELD) else {
        relativize_sound_source(ctx, element, published);
        return report;
    };
    let declared_name = element
        .remove(EMBEDDED_AUDIO_NAME_FIELD)
        .and_then(|v| v.as_str().map(str::to_string));

    let existing_id = element
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    let element_id = match existing_id {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            element.insert("id".to_string(), Value::String(id.clone()));
            id
        }
    };
    let file_name = audio_file_name(declared_name.as_deref(), &element_id);
    let segment_id = sanitize_file_name(&element_id, "sound");
    let relative = join_relative(published, &format!("{}/{}/{}", SOUNDS_DIR, segment_id, file_name));
    let destination: PathBuf = output_folder.join(SOUNDS_DIR).join(&segment_id).join(&file_name);

    let result = payload
        .as_str()
        .ok_or_else(|| CatalogError::InvalidPayload(format!("non-string audio payload for {}", element_id)))
        .and_then(decode_base64)
        .and_then(|bytes| write_bytes(&destination, &bytes));

    match result {
        Ok(()) => {
            report.files_written += 1;
            element.insert(
                SOUND_SOURCE_FIELD.to_string(),
                MediaRef::remote(ctx.url_for(&relative)).to_value(),
            );
        }
        Err(e) => {
            tracing::warn!("Failed to extract sound {} in {}: {}", element_id, published, e);
            report.failures += 1;
            if sound_source(element) == Some(MediaRef::Embedded) {
                element.insert(SOUND_SOURCE_FIELD.to_string(), MediaRef::None.to_value());
            }
        }
    }

    report
}

/// Rewrite an on-disk `soundSource` without an inline payload
fn relativize_sound_source(ctx: &BuildContext, element: &mut Map<String, Value>, published: &str) {
    match sound_source(element) {
        Some(media) if media.is_on_disk() => {
            let file = match media.declared_path() {
                Some(path) => path.to_string(),
                None => {
                    let id = element.get("id").and_then(Value::as_str).unwrap_or("sound");
                    let id = sanitize_file_name(id, "sound");
                    format!("{}/{}/{}.{}", SOUNDS_DIR, id, id, DEFAULT_AUDIO_EXTENSION)
                }
            };
            let relative = join_relative(published, &file);
            element.insert(
                SOUND_SOURCE_FIELD.to_string(),
                MediaRef::remote(ctx.url_for(&relative)).to_value(),
            );
        }
        Some(MediaRef::Embedded) => {
            element.insert(SOUND_SOURCE_FIELD.to_string(), MediaRef::None.to_value());
        }
        _ => {}
    }
}

fn sound_source(element: &Map<String, Value>) -> Option<MediaRef> {
    element.get(SOUND_SOURCE_FIELD).and_then(MediaRef::from_value)
}

/// Target file name for an extracted sound.
///
/// Uses the declared original name (with `.m4a` appended when it has no
/// extension), or the element id when no name was declared.
pub fn audio_file_name(declared: Option<&str>, element_id: &str) -> String {
    let base = declared
        .map(|name| name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name))
        .map(str::trim)
        .filter(|name| !name.is_empty());

    match base {
        Some(name) if Path::new(name).extension().is_some() => sanitize_file_name(name, element_id),
        Some(name) => format!("{}.{}", sanitize_file_name(name, element_id), DEFAULT_AUDIO_EXTENSION),
        None => format!("{}.{}", sanitize_file_name(element_id, "sound"), DEFAULT_AUDIO_EXTENSION),
    }
}

/// Store an image reference using the kind's placement rule.
///
/// Nested kinds get the serialized reference in `spec.extensions.imageSource`
/// and lose any direct field; other kinds get `spec.imageSource`.
fn set_image_ref(record: &mut EntityRecord, kind: EntityKind, media: MediaRef) {
    let spec = record.spec_mut();

    if kind.uses_nested_image() {
        spec.remove(IMAGE_SOURCE_FIELD);
        let serialized = serde_json::to_string(&media).unwrap_or_default();
        let extensions = spec
            .entry(EXTENSIONS_FIELD)
            .or_insert_with(|| Value::Object(Map::new()));
        if !extensions.is_object() {
            *extensions = Value::Object(Map::new());
        }
        if let Some(map) = extensions.as_object_mut() {
            map.insert(IMAGE_SOURCE_FIELD.to_string(), Value::String(serialized));
        }
    } else {
        spec.insert(IMAGE_SOURCE_FIELD.to_string(), media.to_value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn ctx() -> BuildContext {
        BuildContext::new("/src", "/out", "http://x")
    }

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_published_dir() {
        assert_eq!(published_dir("Persons/Alice.json", false), "Persons/Alice");
        assert_eq!(published_dir("Persons/Alice", false), "Persons/Alice");
        assert_eq!(published_dir("Programs/Show/feed/f1", true), "Programs/Show/feed/f1");
        assert_eq!(published_dir("Programs/Show/entity.json", true), "Programs/Show/entity.json");
    }

    #[test]
    fn test_decode_base64_data_uri() {
        assert_eq!(decode_base64("aGk=").unwrap(), b"hi");
        assert_eq!(decode_base64("data:image/png;base64,aG\nk=").unwrap(), b"hi");
        assert!(decode_base64("!!!").is_err());
    }

    #[test]
    fn test_audio_file_name() {
        assert_eq!(audio_file_name(Some("intro.mp3"), "e1"), "intro.mp3");
        assert_eq!(audio_file_name(Some("intro"), "e1"), "intro.m4a");
        assert_eq!(audio_file_name(Some("clips/intro.wav"), "e1"), "intro.wav");
        assert_eq!(audio_file_name(None, "e1"), "e1.m4a");
    }

    #[test]
    fn test_embedded_image_extracted() {
        let temp = TempDir::new().unwrap();
        let mut record = EntityRecord::from_value(json!({
            "spec": {"name": "Alice", "embeddedImageBase64": b64(b"png-bytes")}
        }))
        .unwrap();

        let target = MediaTarget {
            output_folder: temp.path(),
            image_file_name: "person.png",
            source_relative_path: "Persons/Alice.json",
            is_bundle: false,
        };
        let report = extract_and_rewrite(&ctx(), &mut record, EntityKind::Person, &target);

        assert_eq!(report.files_written, 1);
        assert_eq!(std::fs::read(temp.path().join("person.png")).unwrap(), b"png-bytes");
        let spec = record.spec().unwrap();
        assert!(spec.get(EMBEDDED_IMAGE_FIELD).is_none());
        assert_eq!(
            spec["imageSource"],
            json!({"kind": "remote", "url": "http://x/Persons/Alice/person.png"})
        );
    }

    #[test]
    fn test_local_reference_nested_placement() {
        let temp = TempDir::new().unwrap();
        let mut record = EntityRecord::from_value(json!({
            "spec": {"imageSource": {"kind": "local", "path": "cover.jpg"}, "extensions": {"keep": 1}}
        }))
        .unwrap();

        let target = MediaTarget {
            output_folder: temp.path(),
            image_file_name: "apicontent.png",
            source_relative_path: "ApiContents/weather",
            is_bundle: false,
        };
        let report = extract_and_rewrite(&ctx(), &mut record, EntityKind::ApiContent, &target);

        assert_eq!(report, MediaReport::default());
        let spec = record.spec().unwrap();
        assert!(spec.get("imageSource").is_none());
        assert_eq!(spec["extensions"]["keep"], 1);
        let nested: MediaRef =
            serde_json::from_str(spec["extensions"]["imageSource"].as_str().unwrap()).unwrap();
        assert_eq!(nested, MediaRef::remote("http://x/ApiContents/weather/cover.jpg"));
    }

    #[test]
    fn test_generated_reference_uses_default_name() {
        let temp = TempDir::new().unwrap();
        let mut record =
            EntityRecord::from_value(json!({"spec": {"imageSource": {"kind": "generated"}}})).unwrap();

        let target = MediaTarget {
            output_folder: temp.path(),
            image_file_name: "feed.png",
            source_relative_path: "Feeds/daily.json",
            is_bundle: false,
        };
        extract_and_rewrite(&ctx(), &mut record, EntityKind::Feed, &target);

        assert_eq!(
            record.spec().unwrap()["imageSource"],
            json!({"kind": "remote", "url": "http://x/Feeds/daily/feed.png"})
        );
    }

    #[test]
    fn test_remote_record_is_untouched() {
        let temp = TempDir::new().unwrap();
        let original = json!({
            "spec": {
                "imageSource": {"kind": "remote", "url": "http://x/a.png"},
                "openingBGM": [{"id": "s1", "soundSource": {"kind": "remote", "url": "http://x/s.m4a"}}]
            }
        });
        let mut record = EntityRecord::from_value(original.clone()).unwrap();

        let target = MediaTarget {
            output_folder: temp.path(),
            image_file_name: "soundset.png",
            source_relative_path: "SoundSets/Jazz",
            is_bundle: false,
        };
        let report = extract_and_rewrite(&ctx(), &mut record, EntityKind::SoundSet, &target);

        assert_eq!(report.files_written, 0);
        assert_eq!(record.to_value(), original);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_sound_elements_extracted() {
        let temp = TempDir::new().unwrap();
        let mut record = EntityRecord::from_value(json!({
            "spec": {
                "openingBGM": [
                    {"id": "e1", "embeddedAudioBase64": b64(b"one"), "embeddedAudioFileName": "intro"},
                    {"embeddedAudioBase64": b64(b"two"), "soundSource": {"kind": "embedded-base64"}}
                ],
                "jingleBGM": [{"id": "bad", "embeddedAudioBase64": "%%%"}]
            }
        }))
        .unwrap();

        let target = MediaTarget {
            output_folder: temp.path(),
            image_file_name: "soundset.png",
            source_relative_path: "SoundSets/Jazz",
            is_bundle: false,
        };
        let report = extract_and_rewrite(&ctx(), &mut record, EntityKind::SoundSet, &target);

        assert_eq!(report.files_written, 2);
        assert_eq!(report.failures, 1);
        assert_eq!(
            std::fs::read(temp.path().join("sounds/e1/intro.m4a")).unwrap(),
            b"one"
        );

        let spec = record.spec().unwrap();
        let first = &spec["openingBGM"][0];
        assert_eq!(
            first["soundSource"],
            json!({"kind": "remote", "url": "http://x/SoundSets/Jazz/sounds/e1/intro.m4a"})
        );
        assert!(first.get(EMBEDDED_AUDIO_FIELD).is_none());
        assert!(first.get(EMBEDDED_AUDIO_NAME_FIELD).is_none());

        let second = &spec["openingBGM"][1];
        let id = second["id"].as_str().unwrap();
        assert_eq!(
            second["soundSource"]["url"],
            format!("http://x/SoundSets/Jazz/sounds/{}/{}.m4a", id, id)
        );

        let broken = &spec["jingleBGM"][0];
        assert!(broken.get(EMBEDDED_AUDIO_FIELD).is_none());
        assert!(broken.get("soundSource").is_none());
    }
}
