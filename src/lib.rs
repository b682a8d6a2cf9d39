//! # validate-osw Library
//!
//! Validates OpenSidewalks (OSW) datasets shipped as zip archives of GeoJSON
//! files. A run extracts the archive, checks its file layout, validates every
//! layer against a JSON Schema and finally checks identifiers, node references
//! and geometries across the dataset.

pub mod accumulator;
pub mod archive;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod features;
pub mod file_discovery;
pub mod integrity;
pub mod layout;
pub mod output;
pub mod report;
pub mod schema_loader;
pub mod schema_validator;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use accumulator::BoundedAccumulator;
pub use archive::StagingArea;
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager, EnvProvider, SystemEnvProvider};
pub use diagnostics::{DefectSelector, ErrorKind, SchemaErrorCandidate, SelectedDefect};
pub use error::{ArchiveError, LayoutError, SchemaLoadError, ValidationError};
pub use features::{FeatureGeometry, FeatureRow, FeatureTable};
pub use file_discovery::{DiscoveryStats, FileDiscovery};
pub use integrity::IntegrityChecker;
pub use layout::{DatasetFileCategory, DatasetLayout, GeometryKind, LayoutResolver};
pub use output::Output;
pub use report::{Findings, ValidationIssue};
pub use schema_loader::{DefaultSchema, LoadedSchema, SchemaLoader, SchemaSource};
pub use schema_validator::{SchemaValidator, SchemaVerdict};
pub use validator::{OswValidator, ValidationResult, ValidationStage};
