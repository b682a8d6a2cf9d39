//! In-memory feature tables
//!
//! A [`FeatureTable`] is one GeoJSON file loaded as rows of attribute maps plus an
//! optional geometry. Tables are meant to be short-lived: the integrity checker
//! loads one, inspects it and drops it before moving to the next file.

use std::path::Path;

use geo::Validation;
use geojson::{Feature, GeoJson, JsonObject};
use serde_json::Value;

use crate::error::{Result, ValidationError};
use crate::layout::GeometryKind;

/// Geometry of one feature, kept in both its GeoJSON name and engine form
#[derive(Debug, Clone)]
pub struct FeatureGeometry {
    /// GeoJSON `type` name (`Point`, `MultiPolygon`, ...)
    pub type_name: &'static str,
    /// `None` when the geometry could not be converted (e.g. empty coordinates)
    pub shape: Option<geo::Geometry<f64>>,
}

impl FeatureGeometry {
    fn from_geojson(geometry: geojson::Geometry) -> Self {
        let type_name = geojson_type_name(&geometry.value);
        let shape = geo::Geometry::<f64>::try_from(geometry.value).ok();
        Self { type_name, shape }
    }

    pub fn kind(&self) -> Option<GeometryKind> {
        GeometryKind::from_geojson_type(self.type_name)
    }

    /// Validity as decided by the geometry engine
    pub fn is_valid(&self) -> bool {
        self.shape.as_ref().is_some_and(|shape| shape.is_valid())
    }
}

fn geojson_type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub properties: JsonObject,
    pub geometry: Option<FeatureGeometry>,
}

impl FeatureRow {
    fn from_feature(feature: Feature) -> Self {
        Self {
            properties: feature.properties.unwrap_or_default(),
            geometry: feature.geometry.map(FeatureGeometry::from_geojson),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.properties.get(column)
    }
}

/// Rows of one GeoJSON file
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Load a GeoJSON file. A bare Feature is treated as a one-row table.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::parse(&contents).map_err(|details| ValidationError::FeatureLoad {
            file: path.to_path_buf(),
            details,
        })
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, String> {
        let geojson: GeoJson = contents.parse().map_err(|e: geojson::Error| e.to_string())?;
        let features = match geojson {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => {
                return Err("expected a FeatureCollection, found a bare Geometry".to_string());
            }
        };

        Ok(Self {
            rows: features.into_iter().map(FeatureRow::from_feature).collect(),
        })
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A column exists when at least one feature carries the property
    pub fn has_column(&self, column: &str) -> bool {
        self.rows.iter().any(|row| row.properties.contains_key(column))
    }

    /// Non-null values of `column` in row order, with the row index
    pub fn values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = (usize, &'a Value)> + 'a {
        self.rows
            .iter()
            .enumerate()
            .filter_map(move |(index, row)| match row.get(column) {
                Some(Value::Null) | None => None,
                Some(value) => Some((index, value)),
            })
    }

    /// Label used to name a row in messages: its `_id`, or its position
    pub fn row_label(&self, index: usize) -> String {
        self.rows
            .get(index)
            .and_then(|row| row.get("_id"))
            .and_then(id_key)
            .unwrap_or_else(|| index.to_string())
    }
}

/// Identifier values compare by their textual form so `"1"` and `1` meet.
pub fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
