//! Findings collected during a validation run

use serde::{Deserialize, Serialize};

/// Structured counterpart of one error message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Basename of the file the issue was found in
    pub filename: String,
    /// Index of the offending feature, when the error could be attributed to one
    pub feature_index: Option<usize>,
    pub error_message: String,
}

impl ValidationIssue {
    pub fn new(
        filename: impl Into<String>,
        feature_index: Option<usize>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            feature_index,
            error_message: error_message.into(),
        }
    }
}

/// Ordered error messages and issues shared by all stages of one run
#[derive(Debug, Default, Clone)]
pub struct Findings {
    errors: Vec<String>,
    issues: Vec<ValidationIssue>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error message together with its structured issue
    pub fn record(&mut self, error: impl Into<String>, issue: ValidationIssue) {
        let error = error.into();
        tracing::debug!(file = %issue.filename, feature = ?issue.feature_index, "{}", error);
        self.errors.push(error);
        self.issues.push(issue);
    }

    /// Record a message that concerns a whole file
    pub fn record_file_error(&mut self, filename: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        let issue = ValidationIssue::new(filename, None, message.clone());
        self.record(message, issue);
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<ValidationIssue>) {
        (self.errors, self.issues)
    }
}

/// Basename of `path` as shown in messages
pub fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
