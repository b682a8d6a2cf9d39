//! Schema validation of individual dataset files

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::diagnostics::{DefectSelector, SchemaErrorCandidate, synthesize_message};
use crate::error::SchemaResult;
use crate::layout::{DatasetFileCategory, GeometryKind};
use crate::report::{Findings, ValidationIssue, display_name};
use crate::schema_loader::{SchemaLoader, SchemaSource};

/// Outcome of validating one file against its schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVerdict {
    Passed,
    Failed,
    /// More defects exist than the budget allowed to report
    BudgetExhausted,
}

impl SchemaVerdict {
    pub fn passed(self) -> bool {
        matches!(self, SchemaVerdict::Passed)
    }
}

/// Geometry type of the first feature in a FeatureCollection
pub fn geometry_hint(document: &Value) -> Option<GeometryKind> {
    document
        .get("features")?
        .as_array()?
        .first()?
        .get("geometry")?
        .get("type")?
        .as_str()
        .and_then(GeometryKind::from_geojson_type)
}

/// Validates GeoJSON files against the schema chosen for each of them
#[derive(Debug)]
pub struct SchemaValidator {
    loader: SchemaLoader,
}

impl SchemaValidator {
    pub fn new(loader: SchemaLoader) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &SchemaLoader {
        &self.loader
    }

    /// Pick the schema for a parsed file: forced schema, else the first feature's
    /// geometry, else the geometry implied by the file's category.
    pub fn pick_schema_for_file(
        &self,
        path: &Path,
        category: Option<DatasetFileCategory>,
        document: &Value,
    ) -> SchemaSource {
        let geometry = geometry_hint(document).or_else(|| {
            category
                .or_else(|| DatasetFileCategory::classify(path))
                .map(DatasetFileCategory::expected_geometry)
        });
        self.loader.source_for(geometry)
    }

    /// Validate one file, recording at most `max_errors` messages into `findings`.
    ///
    /// Read and parse failures are recorded as file-level findings. Only a schema
    /// that cannot be loaded is returned as an error.
    pub async fn validate_file(
        &mut self,
        path: &Path,
        category: Option<DatasetFileCategory>,
        max_errors: usize,
        findings: &mut Findings,
    ) -> SchemaResult<SchemaVerdict> {
        let filename = display_name(path);

        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                findings.record_file_error(&filename, format!("Unable to read file {filename}: {e}"));
                return Ok(SchemaVerdict::Failed);
            }
        };

        let document: Value = match serde_json::from_str(&contents) {
            Ok(document) => document,
            Err(e) => {
                findings.record_file_error(&filename, format!("Failed to parse {filename}: {e}"));
                return Ok(SchemaVerdict::Failed);
            }
        };
        drop(contents);

        let source = self.pick_schema_for_file(path, category, &document);
        let schema = self.loader.load(&source).await?;
        debug!(file = %filename, schema = %source, "validating against schema");

        let mut selector = DefectSelector::new(max_errors);
        let mut exhausted = false;
        for error in schema.validator().iter_errors(&document) {
            if !selector.offer(SchemaErrorCandidate::from(&error)) {
                exhausted = true;
                break;
            }
        }

        if selector.is_empty() && !exhausted {
            return Ok(SchemaVerdict::Passed);
        }

        for defect in selector.into_defects() {
            let message = synthesize_message(&defect.candidate, schema.document());
            findings.record(
                format!("Validation error: {message}"),
                ValidationIssue::new(&filename, defect.feature_index(), message),
            );
        }

        Ok(if exhausted {
            SchemaVerdict::BudgetExhausted
        } else {
            SchemaVerdict::Failed
        })
    }
}
