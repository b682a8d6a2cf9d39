//! Dataset fixtures shared by the integration tests
#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use zip::write::SimpleFileOptions;

pub const OSW_SCHEMA_URL: &str = "https://sidewalks.washington.edu/opensidewalks/0.2/schema.json";

/// Builder for a dataset archive written into a test directory
pub struct ArchiveBuilder {
    entries: Vec<(String, String)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn file(mut self, name: &str, contents: &Value) -> Self {
        self.entries.push((name.to_string(), contents.to_string()));
        self
    }

    pub fn raw(mut self, name: &str, contents: &str) -> Self {
        self.entries.push((name.to_string(), contents.to_string()));
        self
    }

    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push((format!("{}/", name.trim_end_matches('/')), String::new()));
        self
    }

    pub fn write(self, path: &Path) -> PathBuf {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();

        for (name, contents) in &self.entries {
            if name.ends_with('/') {
                writer.add_directory(name.as_str(), options).unwrap();
            } else {
                writer.start_file(name.as_str(), options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
        }

        writer.finish().unwrap();
        path.to_path_buf()
    }
}

pub fn collection(features: Vec<Value>) -> Value {
    json!({
        "$schema": OSW_SCHEMA_URL,
        "type": "FeatureCollection",
        "features": features,
    })
}

pub fn node(id: impl Into<Value>, x: f64, y: f64) -> Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [x, y] },
        "properties": { "_id": id.into() },
    })
}

pub fn edge(id: impl Into<Value>, u: impl Into<Value>, v: impl Into<Value>) -> Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] },
        "properties": {
            "_id": id.into(),
            "_u_id": u.into(),
            "_v_id": v.into(),
            "highway": "footway",
        },
    })
}

pub fn zone(id: impl Into<Value>, w_ids: Vec<Value>) -> Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
        },
        "properties": {
            "_id": id.into(),
            "_w_id": w_ids,
            "highway": "pedestrian",
        },
    })
}

pub fn street_lamp(id: impl Into<Value>) -> Value {
    let mut feature = node(id, 0.5, 0.5);
    feature["properties"]["highway"] = json!("street_lamp");
    feature
}

/// A small dataset that passes every check
pub fn valid_dataset() -> ArchiveBuilder {
    ArchiveBuilder::new()
        .file(
            "city.nodes.geojson",
            &collection(vec![node(1, 0.0, 0.0), node(2, 1.0, 1.0), node(3, 1.0, 0.0)]),
        )
        .file(
            "city.edges.geojson",
            &collection(vec![edge("e1", 1, 2), edge("e2", 2, 3)]),
        )
        .file("city.points.geojson", &collection(vec![street_lamp("p1")]))
        .file("city.zones.geojson", &collection(vec![zone("z1", vec![json!(1), json!(2)])]))
}

/// Names of the staging directories currently under `dir`
pub fn staging_dirs(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect()
}
