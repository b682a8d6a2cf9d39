//! Output and reporting
//!
//! Renders a [`ValidationResult`] for the terminal or for machines.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::validator::{ValidationIssue, ValidationResult};

/// JSON document written by `--format json`
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub archive: String,
    pub checked_at: DateTime<Utc>,
    pub error_count: usize,
    #[serde(flatten)]
    pub result: &'a ValidationResult,
}

/// Formatter for validation results
pub struct Output {
    format: OutputFormat,
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbosity: VerbosityLevel) -> Self {
        Self {
            format,
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Override color detection, e.g. for text bound for stderr
    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Render a result in the configured format
    pub fn format_result(
        &self,
        archive: &Path,
        result: &ValidationResult,
    ) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_human(archive, result)),
            OutputFormat::Json => self.format_json(archive, result),
            OutputFormat::Summary => Ok(self.format_summary(archive, result)),
        }
    }

    fn format_human(&self, archive: &Path, result: &ValidationResult) -> String {
        let mut output = String::new();

        if self.verbosity == VerbosityLevel::Quiet {
            for error in &result.errors {
                output.push_str(error);
                output.push('\n');
            }
            return output;
        }

        output.push_str(&self.format_verdict(archive, result));
        output.push('\n');

        if self.verbosity >= VerbosityLevel::Verbose {
            for issue in &result.issues {
                output.push_str(&format!("    {}\n", format_issue(issue)));
            }
        } else {
            for error in &result.errors {
                output.push_str(&format!("    {}\n", error));
            }
        }

        output
    }

    fn format_verdict(&self, archive: &Path, result: &ValidationResult) -> String {
        if result.is_valid {
            format!("{}  {}", self.colorize("✓ VALID", "32"), archive.display())
        } else {
            let count = result.error_count();
            format!(
                "{}  {} - {} error{}",
                self.colorize("✗ INVALID", "31"),
                archive.display(),
                count,
                if count == 1 { "" } else { "s" }
            )
        }
    }

    fn format_json(&self, archive: &Path, result: &ValidationResult) -> serde_json::Result<String> {
        let report = JsonReport {
            archive: archive.display().to_string(),
            checked_at: Utc::now(),
            error_count: result.error_count(),
            result,
        };
        serde_json::to_string_pretty(&report)
    }

    fn format_summary(&self, archive: &Path, result: &ValidationResult) -> String {
        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        output.push_str(&format!("  Archive: {}\n", archive.display()));
        if result.is_valid {
            output.push_str(&format!("  Status: {}\n", self.colorize("valid", "32")));
        } else {
            output.push_str(&format!("  Status: {}\n", self.colorize("invalid", "31")));
        }
        output.push_str(&format!("  Errors: {}\n", result.error_count()));

        if self.verbosity >= VerbosityLevel::Verbose {
            let mut files: Vec<&str> = result.issues.iter().map(|i| i.filename.as_str()).collect();
            files.sort_unstable();
            files.dedup();
            for file in files {
                let count = result.issues.iter().filter(|i| i.filename == file).count();
                output.push_str(&format!("    {}: {}\n", file, count));
            }
        }

        output
    }

    /// Line printed to stderr when validation could not run at all
    pub fn format_fatal(&self, error: &dyn fmt::Display) -> String {
        format!("{}  {}", self.colorize("⚠ ERROR", "33"), error)
    }
}

fn format_issue(issue: &ValidationIssue) -> String {
    match issue.feature_index {
        Some(index) => format!("{} [feature {}]: {}", issue.filename, index, issue.error_message),
        None => format!("{}: {}", issue.filename, issue.error_message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_result() -> ValidationResult {
        ValidationResult {
            is_valid: false,
            errors: vec![
                "Validation error: 'highway' is a required property".to_string(),
                "Duplicate _id's found in nodes: 1".to_string(),
            ],
            issues: vec![
                ValidationIssue::new(
                    "dataset.nodes.geojson",
                    Some(3),
                    "'highway' is a required property",
                ),
                ValidationIssue::new(
                    "dataset.nodes.geojson",
                    None,
                    "Duplicate _id's found in nodes: 1",
                ),
            ],
        }
    }

    fn valid_result() -> ValidationResult {
        ValidationResult {
            is_valid: true,
            errors: vec![],
            issues: vec![],
        }
    }

    fn output(format: OutputFormat, verbosity: VerbosityLevel) -> Output {
        Output::new(format, verbosity).with_colors(false)
    }

    #[test]
    fn test_human_valid() {
        let text = output(OutputFormat::Human, VerbosityLevel::Normal)
            .format_result(Path::new("d.zip"), &valid_result())
            .unwrap();
        assert_eq!(text, "✓ VALID  d.zip\n");
    }

    #[test]
    fn test_human_invalid_lists_errors() {
        let text = output(OutputFormat::Human, VerbosityLevel::Normal)
            .format_result(Path::new("d.zip"), &invalid_result())
            .unwrap();
        assert!(text.starts_with("✗ INVALID  d.zip - 2 errors\n"));
        assert!(text.contains("    Duplicate _id's found in nodes: 1\n"));
    }

    #[test]
    fn test_verbose_shows_feature_index() {
        let text = output(OutputFormat::Human, VerbosityLevel::Verbose)
            .format_result(Path::new("d.zip"), &invalid_result())
            .unwrap();
        assert!(text.contains("dataset.nodes.geojson [feature 3]: 'highway' is a required property"));
    }

    #[test]
    fn test_quiet_prints_errors_only() {
        let out = output(OutputFormat::Human, VerbosityLevel::Quiet);
        assert_eq!(out.format_result(Path::new("d.zip"), &valid_result()).unwrap(), "");

        let text = out.format_result(Path::new("d.zip"), &invalid_result()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(!text.contains("INVALID"));
    }

    #[test]
    fn test_json_report() {
        let text = output(OutputFormat::Json, VerbosityLevel::Normal)
            .format_result(Path::new("d.zip"), &invalid_result())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["archive"], "d.zip");
        assert_eq!(value["is_valid"], false);
        assert_eq!(value["error_count"], 2);
        assert_eq!(value["issues"][0]["feature_index"], 3);
        assert!(value["issues"][1]["feature_index"].is_null());
        assert!(value["checked_at"].is_string());
    }

    #[test]
    fn test_summary() {
        let text = output(OutputFormat::Summary, VerbosityLevel::Verbose)
            .format_result(Path::new("d.zip"), &invalid_result())
            .unwrap();
        assert!(text.contains("Status: invalid"));
        assert!(text.contains("Errors: 2"));
        assert!(text.contains("dataset.nodes.geojson: 2"));
    }

    #[test]
    fn test_colors_can_be_forced() {
        let colored = Output::new(OutputFormat::Human, VerbosityLevel::Normal).with_colors(true);
        assert_eq!(colored.format_fatal(&"boom"), "\x1b[33m⚠ ERROR\x1b[0m  boom");

        let text = colored
            .format_result(Path::new("d.zip"), &valid_result())
            .unwrap();
        assert!(text.starts_with("\x1b[32m✓ VALID\x1b[0m"));
    }

    #[test]
    fn test_fatal() {
        let out = output(OutputFormat::Human, VerbosityLevel::Normal);
        assert_eq!(out.format_fatal(&"boom"), "⚠ ERROR  boom");
    }
}
