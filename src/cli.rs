use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the validation result is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Colored, one line per error
    #[default]
    Human,
    /// The full result as JSON
    Json,
    /// Verdict and error count only
    Summary,
}

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
}

impl VerbosityLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            VerbosityLevel::Quiet
        } else if verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Default `tracing` filter directive for this level
    pub fn log_directive(self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

/// OpenSidewalks dataset validator
#[derive(Parser, Debug, Clone)]
#[command(name = "validate-osw")]
#[command(about = "Validate an OpenSidewalks (OSW) dataset archive against its schemas")]
#[command(version)]
pub struct Cli {
    /// Zip archive holding the dataset's GeoJSON files
    #[arg(help = "OSW dataset archive (.zip)")]
    pub archive: PathBuf,

    /// Validate every file against this schema instead of the built-in ones
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,

    /// Maximum number of schema errors to collect
    #[arg(short = 'm', long = "max-errors")]
    pub max_errors: Option<usize>,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        VerbosityLevel::from_flags(self.verbose, self.quiet)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.archive.is_file() {
            return Err(format!("Archive does not exist: {}", self.archive.display()));
        }
        if self.max_errors == Some(0) {
            return Err("--max-errors must be greater than 0".to_string());
        }
        Ok(())
    }
}
