//! Fixture builders shared by the unit tests

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde_json::{Value, json};
use zip::write::SimpleFileOptions;

/// Write a zip archive with the given `(entry name, contents)` pairs.
/// Names ending in `/` become directory entries.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
    }

    writer.finish().unwrap();
}

pub fn collection(features: Vec<Value>) -> Value {
    json!({
        "$schema": "https://sidewalks.washington.edu/opensidewalks/0.2/schema.json",
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

pub fn square() -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
    })
}

pub fn zone(id: impl Into<Value>, w_ids: Vec<Value>) -> Value {
    json!({
        "type": "Feature",
        "geometry": square(),
        "properties": {
            "_id": id.into(),
            "_w_id": w_ids,
            "highway": "pedestrian",
        },
    })
}

pub fn write_json(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}
