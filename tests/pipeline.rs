//! Pipeline Integration Tests
//!
//! Builds small source repositories end to end and checks the generated tree.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use repo_catalog::{build, BuildContext};
use serde_json::{json, Value};
use tempfile::TempDir;
use walkdir::WalkDir;

const BASE_URL: &str = "http://x/";

/// Source and output roots inside one temp dir
struct Fixture {
    _temp: TempDir,
    source: PathBuf,
    output: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("repo");
        let output = temp.path().join("public");
        fs::create_dir_all(&source).unwrap();

        Self {
            _temp: temp,
            source,
            output,
        }
    }

    fn write(&self, relative: &str, content: impl AsRef<[u8]>) {
        let path = self.source.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn write_json(&self, relative: &str, value: &Value) {
        self.write(relative, serde_json::to_string_pretty(value).unwrap());
    }

    fn ctx(&self) -> BuildContext {
        BuildContext::new(&self.source, &self.output, BASE_URL)
    }

    fn read_json(&self, relative: &str) -> Value {
        let text = fs::read_to_string(self.output.join(relative)).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(root).unwrap().to_string_lossy().to_string();
            (relative, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn test_embedded_image_extracted_for_person() {
    let fixture = Fixture::new();
    let png = b"\x89PNG fake image bytes";
    fixture.write_json(
        "Persons/Alice.json",
        &json!({"spec": {"name": "Alice", "embeddedImageBase64": STANDARD.encode(png)}}),
    );

    let report = build(&fixture.ctx()).unwrap();
    assert_eq!(report.entities, 1);
    assert_eq!(report.media_files, 1);
    assert_eq!(report.warnings, 0);

    let entity = fixture.read_json("Persons/Alice/entity.json");
    assert_eq!(
        entity["spec"]["imageSource"],
        json!({"kind": "remote", "url": "http://x/Persons/Alice/person.png"})
    );
    assert!(entity["spec"].get("embeddedImageBase64").is_none());
    assert!(entity["spec"]["id"].as_str().is_some_and(|id| !id.is_empty()));

    assert_eq!(fs::read(fixture.output.join("Persons/Alice/person.png")).unwrap(), png);

    let manifest = fixture.read_json("Persons/index.json");
    let items = manifest["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["path"], "Alice");
    assert_eq!(items[0]["isDirectory"], false);
    assert_eq!(items[0]["digest"]["name"], "Alice");
    assert_eq!(items[0]["digest"]["entityType"], "Person");
    assert_eq!(items[0]["digest"]["id"], entity["spec"]["id"]);
    assert_eq!(
        items[0]["digest"]["imageSource"]["url"],
        "http://x/Persons/Alice/person.png"
    );
}

#[test]
fn test_unparsable_entity_copied_as_file() {
    let fixture = Fixture::new();
    fixture.write("Feeds/Broken.json", "{ not json");
    fixture.write_json("Feeds/Good.json", &json!({"spec": {"id": "g1", "url": "https://a"}}));

    let report = build(&fixture.ctx()).unwrap();
    assert_eq!(report.entities, 1);
    assert_eq!(report.opaque_files, 1);
    assert!(report.warnings >= 1);

    assert_eq!(
        fs::read_to_string(fixture.output.join("Feeds/Broken.json")).unwrap(),
        "{ not json"
    );

    let manifest = fixture.read_json("Feeds/index.json");
    let items = manifest["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(
        items[0],
        json!({
            "name": "Broken.json",
            "path": "Broken.json",
            "isDirectory": false,
            "downloadURL": "http://x/Feeds/Broken.json"
        })
    );
    assert_eq!(items[1]["path"], "Good");
    assert_eq!(items[1]["digest"]["url"], "https://a");
}

#[test]
fn test_round_trip_preserves_fields() {
    let fixture = Fixture::new();
    let source = json!({
        "apiVersion": "v2",
        "spec": {
            "id": "fixed-id",
            "name": "News",
            "custom": {"nested": [1, 2, {"deep": true}]},
            "imageSource": {"kind": "remote", "url": "https://elsewhere/img.png"}
        }
    });
    fixture.write_json("Feeds/News.json", &source);

    build(&fixture.ctx()).unwrap();

    assert_eq!(fixture.read_json("Feeds/News/entity.json"), source);
}

#[test]
fn test_missing_id_is_assigned() {
    let fixture = Fixture::new();
    fixture.write_json("Feeds/News.json", &json!({"spec": {"name": "News"}}));

    build(&fixture.ctx()).unwrap();

    let entity = fixture.read_json("Feeds/News/entity.json");
    let id = entity["spec"]["id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());

    let manifest = fixture.read_json("Feeds/index.json");
    assert_eq!(manifest["items"][0]["digest"]["id"], id);
}

#[test]
fn test_rerun_is_byte_identical() {
    let fixture = Fixture::new();
    fixture.write_json(
        "Persons/Alice.json",
        &json!({"spec": {
            "id": "a1",
            "name": "Alice",
            "lastModified": 1700000000,
            "embeddedImageBase64": STANDARD.encode(b"img")
        }}),
    );
    fixture.write_json(
        "Feeds/news/entity.json",
        &json!({"spec": {"id": "f1", "lastModified": "2024-01-01T00:00:00Z", "imageSource": {"kind": "local"}}}),
    );
    fixture.write("Feeds/news/feed.png", b"feed");
    fixture.write("docs/readme.txt", "hello");

    build(&fixture.ctx()).unwrap();
    let first = snapshot(&fixture.output);
    build(&fixture.ctx()).unwrap();
    let second = snapshot(&fixture.output);

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_folder_entity_local_image_relativized() {
    let fixture = Fixture::new();
    fixture.write_json(
        "Feeds/news/entity.json",
        &json!({"spec": {"id": "f1", "imageSource": {"kind": "local", "path": "./cover.jpg"}}}),
    );
    fixture.write("Feeds/news/cover.jpg", b"cover");

    build(&fixture.ctx()).unwrap();

    let entity = fixture.read_json("Feeds/news/entity.json");
    assert_eq!(
        entity["spec"]["imageSource"],
        json!({"kind": "remote", "url": "http://x/Feeds/news/cover.jpg"})
    );
    assert_eq!(fs::read(fixture.output.join("Feeds/news/cover.jpg")).unwrap(), b"cover");

    let manifest = fixture.read_json("Feeds/index.json");
    assert_eq!(manifest["items"][0]["name"], "news");
    assert_eq!(manifest["items"][0]["digest"]["id"], "f1");
}

#[test]
fn test_nested_image_kinds_store_serialized_reference() {
    let fixture = Fixture::new();
    fixture.write_json(
        "ApiContents/weather.json",
        &json!({"spec": {
            "id": "w1",
            "embeddedImageBase64": STANDARD.encode(b"icon"),
            "extensions": {"other": 1}
        }}),
    );

    build(&fixture.ctx()).unwrap();

    let entity = fixture.read_json("ApiContents/weather/entity.json");
    let nested = entity["spec"]["extensions"]["imageSource"].as_str().unwrap();
    let media: Value = serde_json::from_str(nested).unwrap();
    assert_eq!(
        media,
        json!({"kind": "remote", "url": "http://x/ApiContents/weather/apicontent.png"})
    );
    assert_eq!(entity["spec"]["extensions"]["other"], 1);
    assert!(entity["spec"].get("imageSource").is_none());

    let manifest = fixture.read_json("ApiContents/index.json");
    assert_eq!(manifest["items"][0]["digest"]["imageSource"], media);
    assert_eq!(manifest["items"][0]["digest"]["method"], "GET");
}

#[test]
fn test_sound_set_elements_extracted() {
    let fixture = Fixture::new();
    fixture.write_json(
        "SoundSets/Morning.json",
        &json!({"spec": {
            "id": "s1",
            "openingBGM": [
                {"id": "e1", "embeddedAudioBase64": STANDARD.encode(b"intro"), "embeddedAudioFileName": "intro"}
            ],
            "jingleBGM": [
                {"embeddedAudioBase64": "%%% not base64 %%%", "soundSource": {"kind": "embedded-base64"}},
                {"id": "e3", "soundSource": {"kind": "remote", "url": "https://cdn/x.m4a"}}
            ]
        }}),
    );

    let report = build(&fixture.ctx()).unwrap();
    assert_eq!(report.entities, 1);
    assert_eq!(report.media_files, 1);
    assert_eq!(report.warnings, 1);

    let entity = fixture.read_json("SoundSets/Morning/entity.json");
    let opening = &entity["spec"]["openingBGM"][0];
    assert_eq!(
        opening["soundSource"],
        json!({"kind": "remote", "url": "http://x/SoundSets/Morning/sounds/e1/intro.m4a"})
    );
    assert!(opening.get("embeddedAudioBase64").is_none());
    assert!(opening.get("embeddedAudioFileName").is_none());
    assert_eq!(
        fs::read(fixture.output.join("SoundSets/Morning/sounds/e1/intro.m4a")).unwrap(),
        b"intro"
    );

    let broken = &entity["spec"]["jingleBGM"][0];
    assert!(broken.get("embeddedAudioBase64").is_none());
    assert_eq!(broken["soundSource"], json!({"kind": "none"}));

    let untouched = &entity["spec"]["jingleBGM"][1];
    assert_eq!(untouched["soundSource"]["url"], "https://cdn/x.m4a");

    let manifest = fixture.read_json("SoundSets/index.json");
    assert_eq!(manifest["items"][0]["digest"]["soundCount"], 3);
}

#[test]
fn test_metadata_becomes_info_and_is_not_listed() {
    let fixture = Fixture::new();
    fixture.write_json("meta.json", &json!({"title": "Catalog"}));
    fixture.write_json("Persons/meta.json", &json!({"description": "People"}));
    fixture.write_json("Persons/index.json", &json!({"stale": true}));
    fixture.write("Persons/.DS_Store", "junk");
    fixture.write_json("Persons/Bob.json", &json!({"spec": {"id": "b1"}}));

    build(&fixture.ctx()).unwrap();

    let root = fixture.read_json("index.json");
    assert_eq!(root["info"], json!({"title": "Catalog"}));
    assert_eq!(
        root["items"],
        json!([{"name": "Persons", "path": "Persons", "isDirectory": true}])
    );

    let persons = fixture.read_json("Persons/index.json");
    assert_eq!(persons["info"], json!({"description": "People"}));
    let items = persons["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Bob");
    assert!(!fixture.output.join("Persons/.DS_Store").exists());
    assert!(!fixture.output.join("Persons/meta.json").exists());
}

#[test]
fn test_empty_directory_gets_manifest() {
    let fixture = Fixture::new();
    fs::create_dir_all(fixture.source.join("Broadcasts/empty")).unwrap();

    let report = build(&fixture.ctx()).unwrap();
    assert_eq!(report.directories, 3);

    let manifest = fixture.read_json("Broadcasts/empty/index.json");
    assert_eq!(manifest, json!({"info": {}, "items": []}));
}

#[test]
fn test_root_and_release_notes_files_are_opaque() {
    let fixture = Fixture::new();
    fixture.write_json("release-notes.json", &json!({"notes": []}));
    fixture.write_json("settings.json", &json!({"spec": {"id": "x"}}));
    fixture.write_json("Programs/release-notes.json", &json!({"v": 1}));

    let report = build(&fixture.ctx()).unwrap();
    assert_eq!(report.entities, 0);
    assert_eq!(report.opaque_files, 3);

    let root = fixture.read_json("index.json");
    let names: Vec<&str> = root["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Programs", "release-notes.json", "settings.json"]);
    assert_eq!(root["items"][1]["downloadURL"], "http://x/release-notes.json");

    let programs = fixture.read_json("Programs/index.json");
    assert_eq!(
        programs["items"][0]["downloadURL"],
        "http://x/Programs/release-notes.json"
    );
}

#[test]
fn test_standalone_program_json_is_entity() {
    let fixture = Fixture::new();
    fixture.write_json("Programs/Daily.json", &json!({"spec": {"id": "p1", "name": "Daily"}}));

    let report = build(&fixture.ctx()).unwrap();
    assert_eq!(report.entities, 1);
    assert_eq!(report.packages, 0);

    let manifest = fixture.read_json("Programs/index.json");
    let digest = &manifest["items"][0]["digest"];
    assert_eq!(digest["entityType"], "Program");
    assert_eq!(digest["programMode"], "Basic");
    assert_eq!(digest["lang"], json!({"code": "en", "language": "english"}));
}

#[test]
fn test_output_is_fully_regenerated() {
    let fixture = Fixture::new();
    fixture.write_json("Persons/Alice.json", &json!({"spec": {"id": "a1"}}));
    build(&fixture.ctx()).unwrap();

    fs::remove_file(fixture.source.join("Persons/Alice.json")).unwrap();
    fs::write(fixture.output.join("stray.txt"), "left over").unwrap();
    build(&fixture.ctx()).unwrap();

    assert!(!fixture.output.join("Persons/Alice").exists());
    assert!(!fixture.output.join("stray.txt").exists());
    assert_eq!(fixture.read_json("Persons/index.json")["items"], json!([]));
}

#[test]
fn test_colliding_entity_names_keep_first() {
    let fixture = Fixture::new();
    fixture.write_json("Persons/Alice/entity.json", &json!({"spec": {"id": "folder"}}));
    fixture.write_json("Persons/Alice.json", &json!({"spec": {"id": "file"}}));

    let report = build(&fixture.ctx()).unwrap();
    assert_eq!(report.entities, 1);
    assert_eq!(report.warnings, 1);

    assert_eq!(fixture.read_json("Persons/Alice/entity.json")["spec"]["id"], "folder");

    let manifest = fixture.read_json("Persons/index.json");
    let items = manifest["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["path"], "Alice");
    assert_eq!(items[0]["digest"]["id"], "folder");
}
