//! JSON Schema loading
//!
//! A run validates against either one forced schema file or the embedded default
//! for the geometry a file carries. Each source is read and compiled at most once
//! per [`SchemaLoader`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonschema::{Draft, Validator};
use serde_json::Value;
use tracing::debug;

use crate::error::{SchemaLoadError, SchemaResult};
use crate::layout::GeometryKind;

const POINT_SCHEMA: &str = include_str!("../schemas/osw.point.schema.json");
const LINE_SCHEMA: &str = include_str!("../schemas/osw.line.schema.json");
const POLYGON_SCHEMA: &str = include_str!("../schemas/osw.polygon.schema.json");
const COLLECTION_SCHEMA: &str = include_str!("../schemas/osw.collection.schema.json");

/// Schemas shipped with the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultSchema {
    Point,
    Line,
    Polygon,
    /// Envelope-only schema used when nothing hints at a geometry
    Collection,
}

impl DefaultSchema {
    pub const ALL: [DefaultSchema; 4] = [
        DefaultSchema::Point,
        DefaultSchema::Line,
        DefaultSchema::Polygon,
        DefaultSchema::Collection,
    ];

    pub fn for_geometry(geometry: Option<GeometryKind>) -> Self {
        match geometry {
            Some(GeometryKind::Point) => DefaultSchema::Point,
            Some(GeometryKind::LineString) => DefaultSchema::Line,
            Some(GeometryKind::Polygon) => DefaultSchema::Polygon,
            None => DefaultSchema::Collection,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            DefaultSchema::Point => "osw.point.schema.json",
            DefaultSchema::Line => "osw.line.schema.json",
            DefaultSchema::Polygon => "osw.polygon.schema.json",
            DefaultSchema::Collection => "osw.collection.schema.json",
        }
    }

    fn contents(self) -> &'static str {
        match self {
            DefaultSchema::Point => POINT_SCHEMA,
            DefaultSchema::Line => LINE_SCHEMA,
            DefaultSchema::Polygon => POLYGON_SCHEMA,
            DefaultSchema::Collection => COLLECTION_SCHEMA,
        }
    }
}

/// Where a schema document comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaSource {
    Embedded(DefaultSchema),
    File(PathBuf),
}

impl fmt::Display for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::Embedded(schema) => write!(f, "embedded:{}", schema.file_name()),
            SchemaSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A parsed and compiled schema.
///
/// The raw document is kept next to the validator because message synthesis walks
/// it to find the alternatives of an `anyOf`.
pub struct LoadedSchema {
    source: SchemaSource,
    document: Value,
    validator: Validator,
}

impl LoadedSchema {
    /// Parse and compile a schema document (Draft 7)
    pub fn compile(source: SchemaSource, document: Value) -> SchemaResult<Self> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(&document)
            .map_err(|e| SchemaLoadError::Compile {
                name: source.to_string(),
                details: e.to_string(),
            })?;

        Ok(Self {
            source,
            document,
            validator,
        })
    }

    pub fn source(&self) -> &SchemaSource {
        &self.source
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }
}

impl fmt::Debug for LoadedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedSchema")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Per-run schema loader and cache
#[derive(Debug, Default)]
pub struct SchemaLoader {
    forced: Option<PathBuf>,
    cache: HashMap<SchemaSource, Arc<LoadedSchema>>,
}

impl SchemaLoader {
    pub fn new(forced: Option<PathBuf>) -> Self {
        Self {
            forced,
            cache: HashMap::new(),
        }
    }

    /// The source to validate a file with. A forced schema always wins.
    pub fn source_for(&self, geometry: Option<GeometryKind>) -> SchemaSource {
        match &self.forced {
            Some(path) => SchemaSource::File(path.clone()),
            None => SchemaSource::Embedded(DefaultSchema::for_geometry(geometry)),
        }
    }

    /// Load every schema this run could need so that a broken schema fails the run
    /// before any archive work happens.
    pub async fn preload(&mut self) -> SchemaResult<()> {
        let sources: Vec<SchemaSource> = match &self.forced {
            Some(path) => vec![SchemaSource::File(path.clone())],
            None => DefaultSchema::ALL
                .into_iter()
                .map(SchemaSource::Embedded)
                .collect(),
        };

        for source in sources {
            self.load(&source).await?;
        }
        Ok(())
    }

    /// Fetch a compiled schema, reading and compiling it on first use
    pub async fn load(&mut self, source: &SchemaSource) -> SchemaResult<Arc<LoadedSchema>> {
        if let Some(schema) = self.cache.get(source) {
            return Ok(Arc::clone(schema));
        }

        let document = match source {
            SchemaSource::Embedded(schema) => serde_json::from_str(schema.contents())
                .map_err(|e| SchemaLoadError::Parse {
                    path: PathBuf::from(schema.file_name()),
                    source: e,
                })?,
            SchemaSource::File(path) => read_schema_file(path).await?,
        };

        let schema = Arc::new(LoadedSchema::compile(source.clone(), document)?);
        debug!(schema = %source, "schema compiled");
        self.cache.insert(source.clone(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Number of distinct schemas compiled so far
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

async fn read_schema_file(path: &Path) -> SchemaResult<Value> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SchemaLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&contents).map_err(|source| SchemaLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
