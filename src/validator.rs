//! Validation orchestrator
//!
//! Runs the stages of one validation in order:
//!
//! `EXTRACT -> LAYOUT -> SCHEMA -> INTEGRITY -> EXTENSIONS -> DONE`
//!
//! Extraction and layout failures end the run immediately. Schema, integrity and
//! extension findings accumulate so a caller sees every defect in one pass. The
//! staging directory is removed whatever happens, and every run produces exactly
//! one [`ValidationResult`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::archive::StagingArea;
use crate::config::Config;
use crate::error::{SchemaLoadError, SchemaResult, ValidationError};
use crate::file_discovery::FileDiscovery;
use crate::integrity::{DEFAULT_DISPLAY_LIMIT, IntegrityChecker};
use crate::layout::{DatasetFileCategory, LayoutResolver};
use crate::report::{Findings, display_name};
use crate::schema_loader::SchemaLoader;
use crate::schema_validator::{SchemaValidator, SchemaVerdict};

pub use crate::report::ValidationIssue;

/// Default schema error budget
pub const DEFAULT_MAX_ERRORS: usize = 20;

/// Stage of a validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStage {
    Extract,
    Layout,
    Schema,
    Integrity,
    Extensions,
    Done,
    Failed,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationStage::Extract => "EXTRACT",
            ValidationStage::Layout => "LAYOUT",
            ValidationStage::Schema => "SCHEMA",
            ValidationStage::Integrity => "INTEGRITY",
            ValidationStage::Extensions => "EXTENSIONS",
            ValidationStage::Done => "DONE",
            ValidationStage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Outcome of one validation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Human-readable errors, in the order they were found
    pub errors: Vec<String>,
    /// Structured counterpart of `errors`
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    fn from_findings(findings: Findings) -> Self {
        let (errors, issues) = findings.into_parts();
        Self {
            is_valid: errors.is_empty(),
            errors,
            issues,
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Validates one OSW dataset archive
#[derive(Debug, Clone)]
pub struct OswValidator {
    archive: PathBuf,
    schema: Option<PathBuf>,
    max_errors: usize,
    display_limit: usize,
    required: Vec<DatasetFileCategory>,
    discovery: FileDiscovery,
    staging_parent: Option<PathBuf>,
}

impl OswValidator {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            schema: None,
            max_errors: DEFAULT_MAX_ERRORS,
            display_limit: DEFAULT_DISPLAY_LIMIT,
            required: Vec::new(),
            discovery: FileDiscovery::new(),
            staging_parent: None,
        }
    }

    /// Build a validator from a loaded configuration
    pub fn from_config(archive: impl Into<PathBuf>, config: &Config) -> Self {
        let discovery = FileDiscovery::new()
            .with_extensions(config.files.extensions.clone())
            .with_exclude_dirs(config.files.exclude_dirs.clone())
            .with_max_depth(config.files.max_depth);

        Self::new(archive)
            .with_schema(config.validation.schema.clone())
            .with_max_errors(config.validation.max_errors)
            .with_display_limit(config.validation.display_limit)
            .with_required_categories(config.validation.required_categories.clone())
            .with_file_discovery(discovery)
    }

    /// Validate every file against this schema instead of the built-in ones
    pub fn with_schema(mut self, schema: Option<PathBuf>) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors.max(1);
        self
    }

    pub fn with_display_limit(mut self, display_limit: usize) -> Self {
        self.display_limit = display_limit.max(1);
        self
    }

    pub fn with_required_categories(
        mut self,
        required: impl IntoIterator<Item = DatasetFileCategory>,
    ) -> Self {
        self.required = required.into_iter().collect();
        self
    }

    pub fn with_file_discovery(mut self, discovery: FileDiscovery) -> Self {
        self.discovery = discovery;
        self
    }

    /// Directory the archive is extracted under (system temp dir by default)
    pub fn with_staging_parent(mut self, parent: Option<PathBuf>) -> Self {
        self.staging_parent = parent;
        self
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn max_errors(&self) -> usize {
        self.max_errors
    }

    /// Run the validation.
    ///
    /// Fails only when a schema cannot be loaded; this is checked before the
    /// archive is touched. Every other problem is reported in the result.
    pub async fn validate(&self) -> SchemaResult<ValidationResult> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "osw_validation",
            %run_id,
            archive = %self.archive.display()
        );

        async {
            let mut loader = SchemaLoader::new(self.schema.clone());
            loader.preload().await?;
            let mut schemas = SchemaValidator::new(loader);

            let mut staging =
                StagingArea::new(&self.archive).with_parent(self.staging_parent.clone());
            let mut findings = Findings::new();

            let outcome = self.run_stages(&mut staging, &mut schemas, &mut findings).await;

            if let Err(e) = staging.cleanup() {
                warn!(error = %e, "failed to remove staging directory");
            }

            let stage = match outcome {
                Ok(stage) => stage,
                Err(e) => {
                    error!(error = %e, "validation aborted");
                    findings.record_file_error(
                        display_name(&self.archive),
                        format!("Unable to validate: {e}"),
                    );
                    ValidationStage::Failed
                }
            };

            let result = ValidationResult::from_findings(findings);
            debug!(%stage, errors = result.error_count(), "validation finished");
            Ok::<_, SchemaLoadError>(result)
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        staging: &mut StagingArea,
        schemas: &mut SchemaValidator,
        findings: &mut Findings,
    ) -> Result<ValidationStage, ValidationError> {
        let archive_name = display_name(&self.archive);

        debug!(stage = %ValidationStage::Extract, "entering stage");
        let root = match staging.extract() {
            Ok(root) => root,
            Err(e) => {
                warn!(error = %e, "extraction failed");
                findings.record_file_error(&archive_name, e.to_string());
                return Ok(ValidationStage::Failed);
            }
        };

        debug!(stage = %ValidationStage::Layout, "entering stage");
        let resolver = LayoutResolver::new(self.discovery.clone())
            .with_required(self.required.iter().copied());
        let layout = match resolver.resolve(&root).await {
            Ok(layout) => layout,
            Err(e) => {
                warn!(error = %e, "dataset layout rejected");
                findings.record_file_error(&archive_name, e.to_string());
                return Ok(ValidationStage::Failed);
            }
        };

        debug!(stage = %ValidationStage::Schema, "entering stage");
        for (category, path) in layout.recognized() {
            let budget = self.max_errors.saturating_sub(findings.error_count());
            let verdict = schemas
                .validate_file(path, Some(category), budget, findings)
                .await?;

            if verdict == SchemaVerdict::BudgetExhausted || findings.error_count() >= self.max_errors
            {
                debug!("schema error budget exhausted");
                break;
            }
        }
        if !findings.is_empty() {
            return Ok(ValidationStage::Failed);
        }

        debug!(stage = %ValidationStage::Integrity, "entering stage");
        let mut checker = IntegrityChecker::new(self.display_limit);
        checker.check_dataset(&layout, findings).await;

        debug!(stage = %ValidationStage::Extensions, "entering stage");
        for extension in layout.external_extensions() {
            checker.check_extension(extension, findings).await;
        }

        Ok(if findings.is_empty() {
            ValidationStage::Done
        } else {
            ValidationStage::Failed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{collection, edge, node, write_zip};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn dataset(dir: &Path, name: &str, entries: &[(&str, Value)]) -> PathBuf {
        let path = dir.join(name);
        let contents: Vec<(String, String)> = entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        let borrowed: Vec<(&str, &str)> = contents
            .iter()
            .map(|(n, c)| (n.as_str(), c.as_str()))
            .collect();
        write_zip(&path, &borrowed);
        path
    }

    fn minimal(dir: &Path) -> PathBuf {
        dataset(
            dir,
            "minimal.zip",
            &[
                ("minimal/city.nodes.geojson", collection(vec![node(1, 0.0, 0.0), node(2, 1.0, 1.0)])),
                ("minimal/city.edges.geojson", collection(vec![edge("e1", 1, 2)])),
            ],
        )
    }

    #[tokio::test]
    async fn test_valid_dataset() {
        let temp = TempDir::new().unwrap();
        let archive = minimal(temp.path());

        let result = OswValidator::new(&archive).validate().await.unwrap();

        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.errors.is_empty());
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn test_empty_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("empty.zip");
        write_zip(&archive, &[]);

        let result = OswValidator::new(&archive).validate().await.unwrap();

        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Error extracting ZIP file"));
        assert_eq!(result.issues[0].filename, "empty.zip");
    }

    #[tokio::test]
    async fn test_layout_failure_ends_run() {
        let temp = TempDir::new().unwrap();
        let archive = dataset(
            temp.path(),
            "dup.zip",
            &[
                ("a.nodes.geojson", collection(vec![node(1, 0.0, 0.0)])),
                ("b.nodes.geojson", collection(vec![node(2, 0.0, 0.0)])),
            ],
        );

        let result = OswValidator::new(&archive).validate().await.unwrap();

        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec!["Multiple .geojson files of the same type found: nodes.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_integrity_skipped_after_schema_errors() {
        let temp = TempDir::new().unwrap();
        let mut nodes = collection(vec![node(1, 0.0, 0.0), node(1, 1.0, 1.0)]);
        nodes.as_object_mut().unwrap().remove("$schema");
        let archive = dataset(temp.path(), "d.zip", &[("city.nodes.geojson", nodes)]);

        let result = OswValidator::new(&archive).validate().await.unwrap();

        assert!(!result.is_valid);
        assert!(result.errors.iter().all(|e| e.starts_with("Validation error")));
        assert!(!result.errors.iter().any(|e| e.contains("Duplicate")));
    }

    #[tokio::test]
    async fn test_integrity_errors_reported() {
        let temp = TempDir::new().unwrap();
        let archive = dataset(
            temp.path(),
            "fk.zip",
            &[
                ("city.nodes.geojson", collection(vec![node(1, 0.0, 0.0)])),
                ("city.edges.geojson", collection(vec![edge("e1", 1, 2)])),
            ],
        );

        let result = OswValidator::new(&archive).validate().await.unwrap();

        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("unmatched _v_id's: 2"));
        assert_eq!(result.issues[0].filename, "city.edges.geojson");
    }

    #[tokio::test]
    async fn test_schema_budget_is_shared_across_files() {
        let temp = TempDir::new().unwrap();
        let bare = |count: i64| {
            let features = (0..count)
                .map(|i| {
                    let mut f = node(i, 0.0, 0.0);
                    f["properties"] = json!({});
                    f
                })
                .collect();
            collection(features)
        };
        let archive = dataset(
            temp.path(),
            "bad.zip",
            &[("city.nodes.geojson", bare(4)), ("city.points.geojson", bare(4))],
        );

        let result = OswValidator::new(&archive)
            .with_max_errors(3)
            .validate()
            .await
            .unwrap();

        assert_eq!(result.errors.len(), 3);
        assert!(result.issues.iter().all(|i| i.filename == "city.nodes.geojson"));
    }

    #[tokio::test]
    async fn test_staging_removed_after_run() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        std::fs::create_dir(&staging).unwrap();

        for archive in [minimal(temp.path()), temp.path().join("missing.zip")] {
            OswValidator::new(&archive)
                .with_staging_parent(Some(staging.clone()))
                .validate()
                .await
                .unwrap();
            assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
        }
    }

    #[tokio::test]
    async fn test_bad_forced_schema_fails_fast() {
        let temp = TempDir::new().unwrap();
        let archive = minimal(temp.path());

        let err = OswValidator::new(&archive)
            .with_schema(Some(temp.path().join("missing.schema.json")))
            .validate()
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Invalid or missing schema file"));
    }

    #[tokio::test]
    async fn test_result_serializes() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("empty.zip");
        write_zip(&archive, &[]);

        let result = OswValidator::new(&archive).validate().await.unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["is_valid"], false);
        assert!(json["issues"][0]["feature_index"].is_null());
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.validation.max_errors = 7;
        config.validation.required_categories = vec![DatasetFileCategory::Nodes];

        let validator = OswValidator::from_config("a.zip", &config);
        assert_eq!(validator.max_errors(), 7);
        assert_eq!(validator.archive(), Path::new("a.zip"));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(ValidationStage::Integrity.to_string(), "INTEGRITY");
    }
}
