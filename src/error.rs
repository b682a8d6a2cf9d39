use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Main application error type that encompasses all possible failure modes
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Schema(#[from] SchemaLoadError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unable to load {file}: {details}")]
    FeatureLoad { file: PathBuf, details: String },
}

/// Failures while staging an archive on disk
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Error extracting ZIP file: unable to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error extracting ZIP file: {details}")]
    Corrupt { details: String },

    #[error("Error extracting ZIP file: archive {path} contains no entries")]
    Empty { path: PathBuf },

    #[error("Error extracting ZIP file: unable to create staging directory: {0}")]
    Staging(#[source] std::io::Error),
}

/// Failures of the dataset layout (which files are present in the staged tree)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Directory does not exist.")]
    RootMissing { path: PathBuf },

    #[error("No .geojson files found in the archive.")]
    NoGeoJsonFiles,

    #[error("Missing required .geojson files: {}.", .0.join(", "))]
    MissingRequired(Vec<String>),

    #[error("Multiple .geojson files of the same type found: {}.", .0.join(", "))]
    DuplicateFiles(Vec<String>),

    #[error("Unable to scan {path}: {details}")]
    Scan { path: PathBuf, details: String },
}

/// Failures loading a JSON Schema document. These are caller errors and abort the run.
#[derive(Error, Debug)]
pub enum SchemaLoadError {
    #[error("Invalid or missing schema file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid or missing schema file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Schema {name} could not be compiled: {details}")]
    Compile { name: String, details: String },
}

impl From<ConfigError> for ValidationError {
    fn from(err: ConfigError) -> Self {
        ValidationError::Config(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Archive result type alias
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Layout result type alias
pub type LayoutResult<T> = std::result::Result<T, LayoutError>;

/// Schema loading result type alias
pub type SchemaResult<T> = std::result::Result<T, SchemaLoadError>;
