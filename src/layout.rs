//! Dataset layout resolution
//!
//! Classifies the GeoJSON files of a staged archive into the six OSW dataset
//! categories by filename token. Unrecognized GeoJSON files are kept aside as
//! external extensions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LayoutError, LayoutResult};
use crate::file_discovery::FileDiscovery;

/// Geometry type a dataset category is expected to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

impl GeometryKind {
    /// GeoJSON `type` name
    pub fn as_str(self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
        }
    }

    /// Parse a GeoJSON geometry `type` name. Multi-geometries are not OSW layer types.
    pub fn from_geojson_type(name: &str) -> Option<Self> {
        match name {
            "Point" => Some(GeometryKind::Point),
            "LineString" => Some(GeometryKind::LineString),
            "Polygon" => Some(GeometryKind::Polygon),
            _ => None,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the known OSW dataset file roles.
///
/// Declaration order is the processing order: nodes come first so that the node
/// identifier index exists before edges and zones are checked against it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFileCategory {
    Nodes,
    Edges,
    Points,
    Lines,
    Zones,
    Polygons,
}

/// Filename tokens in match precedence order; the first token found in a basename wins.
pub const CATEGORY_TOKENS: [(&str, DatasetFileCategory); 6] = [
    ("edges", DatasetFileCategory::Edges),
    ("nodes", DatasetFileCategory::Nodes),
    ("points", DatasetFileCategory::Points),
    ("lines", DatasetFileCategory::Lines),
    ("zones", DatasetFileCategory::Zones),
    ("polygons", DatasetFileCategory::Polygons),
];

impl DatasetFileCategory {
    pub const ALL: [DatasetFileCategory; 6] = [
        DatasetFileCategory::Nodes,
        DatasetFileCategory::Edges,
        DatasetFileCategory::Points,
        DatasetFileCategory::Lines,
        DatasetFileCategory::Zones,
        DatasetFileCategory::Polygons,
    ];

    pub fn token(self) -> &'static str {
        match self {
            DatasetFileCategory::Nodes => "nodes",
            DatasetFileCategory::Edges => "edges",
            DatasetFileCategory::Points => "points",
            DatasetFileCategory::Lines => "lines",
            DatasetFileCategory::Zones => "zones",
            DatasetFileCategory::Polygons => "polygons",
        }
    }

    pub fn expected_geometry(self) -> GeometryKind {
        match self {
            DatasetFileCategory::Nodes | DatasetFileCategory::Points => GeometryKind::Point,
            DatasetFileCategory::Edges | DatasetFileCategory::Lines => GeometryKind::LineString,
            DatasetFileCategory::Zones | DatasetFileCategory::Polygons => GeometryKind::Polygon,
        }
    }

    /// Columns holding node identifiers that must resolve against the nodes file
    pub fn node_references(self) -> &'static [&'static str] {
        match self {
            DatasetFileCategory::Edges => &["_u_id", "_v_id"],
            DatasetFileCategory::Zones => &["_w_id"],
            _ => &[],
        }
    }

    /// Classify a file by its basename
    pub fn classify(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        CATEGORY_TOKENS
            .iter()
            .find(|(token, _)| name.contains(token))
            .map(|(_, category)| *category)
    }
}

impl fmt::Display for DatasetFileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for DatasetFileCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        DatasetFileCategory::ALL
            .into_iter()
            .find(|c| c.token() == wanted)
            .ok_or_else(|| format!("unknown dataset category '{}'", s.trim()))
    }
}

/// Recognized dataset files plus tolerated extension files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetLayout {
    files: BTreeMap<DatasetFileCategory, PathBuf>,
    external_extensions: Vec<PathBuf>,
}

impl DatasetLayout {
    /// Recognized files in processing order
    pub fn recognized(&self) -> impl Iterator<Item = (DatasetFileCategory, &Path)> {
        self.files.iter().map(|(c, p)| (*c, p.as_path()))
    }

    pub fn get(&self, category: DatasetFileCategory) -> Option<&Path> {
        self.files.get(&category).map(PathBuf::as_path)
    }

    pub fn recognized_count(&self) -> usize {
        self.files.len()
    }

    pub fn external_extensions(&self) -> &[PathBuf] {
        &self.external_extensions
    }
}

/// Scans a staged root and enforces one file per category
#[derive(Debug, Clone)]
pub struct LayoutResolver {
    discovery: FileDiscovery,
    required: BTreeSet<DatasetFileCategory>,
}

impl LayoutResolver {
    pub fn new(discovery: FileDiscovery) -> Self {
        Self {
            discovery,
            required: BTreeSet::new(),
        }
    }

    /// Mark categories that must be present in every archive
    pub fn with_required(
        mut self,
        required: impl IntoIterator<Item = DatasetFileCategory>,
    ) -> Self {
        self.required = required.into_iter().collect();
        self
    }

    pub async fn resolve(&self, root: &Path) -> LayoutResult<DatasetLayout> {
        if !matches!(tokio::fs::try_exists(root).await, Ok(true)) {
            return Err(LayoutError::RootMissing {
                path: root.to_path_buf(),
            });
        }

        let (files, stats) = self
            .discovery
            .discover(root)
            .await
            .map_err(|e| LayoutError::Scan {
                path: root.to_path_buf(),
                details: e.to_string(),
            })?;

        if files.is_empty() {
            return Err(LayoutError::NoGeoJsonFiles);
        }

        let mut found: BTreeMap<DatasetFileCategory, Vec<PathBuf>> = BTreeMap::new();
        let mut external_extensions = Vec::new();

        for file in files {
            match DatasetFileCategory::classify(&file) {
                Some(category) => found.entry(category).or_default().push(file),
                None => external_extensions.push(file),
            }
        }

        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|c| !found.contains_key(c))
            .map(|c| c.token().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(LayoutError::MissingRequired(missing));
        }

        let duplicates: Vec<String> = found
            .iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(c, _)| c.token().to_string())
            .collect();
        if !duplicates.is_empty() {
            return Err(LayoutError::DuplicateFiles(duplicates));
        }

        let files: BTreeMap<DatasetFileCategory, PathBuf> = found
            .into_iter()
            .filter_map(|(c, mut paths)| paths.pop().map(|p| (c, p)))
            .collect();

        debug!(
            recognized = files.len(),
            extensions = external_extensions.len(),
            skipped = stats.skipped,
            "dataset layout resolved"
        );

        Ok(DatasetLayout {
            files,
            external_extensions,
        })
    }
}

impl Default for LayoutResolver {
    fn default() -> Self {
        Self::new(FileDiscovery::new())
    }
}
