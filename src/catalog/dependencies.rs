//! Dependency aggregation for unpacked Program packages.
//!
//! A Program references other entities by id. Inside a package those
//! entities live at `<kind-folder>/<id>/entity.json` relative to the
//! program's own folder. Every reference that resolves to a user-authored
//! record is collected, deduplicated, and grouped by kind.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use super::error::{CatalogError, Result};
use super::files::{is_hidden, read_record};
use super::ENTITY_DOCUMENT;
use crate::domain::{DependencyBundle, EntityKind, EntityRecord};

/// List fields on a Program holding referenced ids
const LIST_FIELDS: [(&str, DependencyGroup); 4] = [
    ("feedIds", DependencyGroup::Feed),
    ("apiContentIds", DependencyGroup::ApiContent),
    ("pageContentIds", DependencyGroup::PageContent),
    ("personalityIds", DependencyGroup::Person),
];

/// Singular model-id fields, all resolved as GenerativeAi
const MODEL_FIELDS: [&str; 4] = ["chatModelId", "ttsModelId", "imageModelId", "summaryModelId"];

/// Id fields on a segment's `source` object
const SEGMENT_SOURCE_FIELDS: [(&str, DependencyGroup); 3] = [
    ("feedId", DependencyGroup::Feed),
    ("apiContentId", DependencyGroup::ApiContent),
    ("pageContentId", DependencyGroup::PageContent),
];

/// Folder under a SoundSet holding its sound elements
pub const SOUND_ELEMENT_FOLDER: &str = "soundElement";

/// Output group a resolved record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyGroup {
    Person,
    SoundSet,
    SoundElement,
    Feed,
    ApiContent,
    PageContent,
    GenerativeAi,
}

impl DependencyGroup {
    /// Entity kind of records in this group, `None` for sound elements
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self {
            DependencyGroup::Person => Some(EntityKind::Person),
            DependencyGroup::SoundSet => Some(EntityKind::SoundSet),
            DependencyGroup::SoundElement => None,
            DependencyGroup::Feed => Some(EntityKind::Feed),
            DependencyGroup::ApiContent => Some(EntityKind::ApiContent),
            DependencyGroup::PageContent => Some(EntityKind::PageContent),
            DependencyGroup::GenerativeAi => Some(EntityKind::GenerativeAi),
        }
    }

    /// Package-relative folder holding records of this group
    pub fn folder(&self) -> &'static str {
        match self.entity_kind() {
            Some(kind) => kind.key(),
            None => SOUND_ELEMENT_FOLDER,
        }
    }
}

/// A referenced record and the group it is bundled under
#[derive(Debug, Clone)]
struct ResolvedDependency {
    group: DependencyGroup,
    record: EntityRecord,
}

/// Build the dependency bundle of a Program.
pub fn build_dependency_bundle(
    program_spec: &Map<String, Value>,
    package_root: &Path,
) -> DependencyBundle {
    into_bundle(resolve_dependencies(program_spec, package_root))
}

/// Group resolved records into a bundle, keeping resolution order
fn into_bundle(resolved: Vec<ResolvedDependency>) -> DependencyBundle {
    let mut bundle = DependencyBundle::default();
    for dependency in resolved {
        let value = dependency.record.into_value();
        match dependency.group.entity_kind() {
            Some(kind) => {
                if let Some(group) = bundle.group_mut(kind) {
                    group.push(value);
                }
            }
            None => bundle.sound_elements.push(value),
        }
    }
    bundle
}

/// Collect candidate ids from `program_spec` and resolve each against the package.
///
/// Missing, unparsable and predefined records are left out. Sound elements of
/// every referenced SoundSet are included without the predefined filter.
fn resolve_dependencies(
    program_spec: &Map<String, Value>,
    package_root: &Path,
) -> Vec<ResolvedDependency> {
    let candidates = collect_candidate_ids(program_spec);
    let mut resolved = Vec::new();

    for (group, ids) in &candidates {
        for id in ids {
            match resolve_one(package_root, *group, id) {
                Ok(Some(dependency)) => resolved.push(dependency),
                Ok(None) => {}
                Err(e) => tracing::debug!("Skipping dependency {:?} {}: {}", group, id, e),
            }
        }
    }

    if let Some(sound_set_ids) = candidates.get(&DependencyGroup::SoundSet) {
        for id in sound_set_ids.iter().filter(|id| is_safe_id(id)) {
            resolved.extend(collect_sound_elements(package_root, id));
        }
    }

    resolved
}

/// Candidate ids per group, deduplicated and sorted
pub fn collect_candidate_ids(
    program_spec: &Map<String, Value>,
) -> BTreeMap<DependencyGroup, BTreeSet<String>> {
    let mut candidates: BTreeMap<DependencyGroup, BTreeSet<String>> = BTreeMap::new();
    let mut add = |group: DependencyGroup, value: Option<&Value>| {
        if let Some(id) = value.and_then(Value::as_str).filter(|id| !id.is_empty()) {
            candidates.entry(group).or_default().insert(id.to_string());
        }
    };

    for (field, group) in LIST_FIELDS {
        if let Some(ids) = program_spec.get(field).and_then(Value::as_array) {
            for id in ids {
                add(group, Some(id));
            }
        }
    }

    add(DependencyGroup::SoundSet, program_spec.get("soundSetId"));
    for field in MODEL_FIELDS {
        add(DependencyGroup::GenerativeAi, program_spec.get(field));
    }

    // Segment trees nest without bound; walk them with an explicit stack
    let mut stack: Vec<&Value> = program_spec
        .get("programSegments")
        .and_then(Value::as_array)
        .map(|segments| segments.iter().rev().collect())
        .unwrap_or_default();

    while let Some(segment) = stack.pop() {
        add(DependencyGroup::GenerativeAi, segment.get("generativeAiId"));

        if let Some(source) = segment.get("source") {
            for (field, group) in SEGMENT_SOURCE_FIELDS {
                add(group, source.get(field));
            }
        }

        if let Some(children) = segment.get("subSegments").and_then(Value::as_array) {
            stack.extend(children.iter().rev());
        }
    }

    candidates
}

fn resolve_one(
    package_root: &Path,
    group: DependencyGroup,
    id: &str,
) -> Result<Option<ResolvedDependency>> {
    if !is_safe_id(id) {
        return Err(CatalogError::InvalidId(id.to_string()));
    }

    let path = package_root.join(group.folder()).join(id).join(ENTITY_DOCUMENT);
    if !path.is_file() {
        tracing::debug!("Dependency {:?} {} not present in package", group, id);
        return Ok(None);
    }

    let record = read_record(&path)?;
    if record.is_predefined() {
        tracing::debug!("Dependency {:?} {} is predefined, excluded", group, id);
        return Ok(None);
    }

    Ok(Some(ResolvedDependency { group, record }))
}

/// Sound elements under `soundset/<id>/soundElement/`
fn collect_sound_elements(package_root: &Path, sound_set_id: &str) -> Vec<ResolvedDependency> {
    let base = package_root
        .join(EntityKind::SoundSet.key())
        .join(sound_set_id)
        .join(SOUND_ELEMENT_FOLDER);

    let Ok(entries) = fs::read_dir(&base) else {
        return Vec::new();
    };
    let mut paths: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();

    let mut elements = Vec::new();
    for path in paths {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        if is_hidden(&name) {
            continue;
        }

        let document = if path.is_dir() {
            path.join(ENTITY_DOCUMENT)
        } else if name.ends_with(".json") {
            path.clone()
        } else {
            continue;
        };
        if !document.is_file() {
            continue;
        }

        match read_record(&document) {
            Ok(record) => elements.push(ResolvedDependency {
                group: DependencyGroup::SoundElement,
                record,
            }),
            Err(e) => tracing::warn!("Skipping sound element {}: {}", document.display(), e),
        }
    }
    elements
}

/// Ids become path segments; refuse anything that could escape the package
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(|c| c == '/' || c == '\\' || c == '\0')
}
