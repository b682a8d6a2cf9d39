//! Cross-file integrity checks
//!
//! Runs after every file passed its schema. Files are visited in category order so
//! the node identifier index is complete before edges and zones are resolved
//! against it. Each file's table is dropped before the next one is loaded.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::ValidationError;
use crate::features::{FeatureTable, id_key};
use crate::layout::{DatasetFileCategory, DatasetLayout};
use crate::report::{Findings, display_name};

pub const ID_COLUMN: &str = "_id";

/// Default number of offending values listed in one message
pub const DEFAULT_DISPLAY_LIMIT: usize = 20;

/// Lists at most `limit` offending values and names the total when truncated
#[derive(Debug, Clone, Copy)]
struct DisplayCap {
    limit: usize,
}

impl DisplayCap {
    /// `"20"` when the list is truncated, `"all"` otherwise
    fn showing(self, total: usize) -> String {
        if total > self.limit {
            self.limit.to_string()
        } else {
            "all".to_string()
        }
    }

    fn list(self, values: &[String]) -> String {
        let shown: Vec<&str> = values.iter().take(self.limit).map(String::as_str).collect();
        shown.join(", ")
    }
}

/// Values occurring more than once, each listed once, in order of first appearance
fn duplicates(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order = Vec::new();
    for value in values {
        let count = counts.entry(value.clone()).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(value);
        }
    }
    order
}

/// Node references of one cell; `_w_id` style columns hold arrays
fn reference_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(id_key).collect(),
        other => id_key(other).into_iter().collect(),
    }
}

/// Identifier, foreign-key and geometry checks over a resolved dataset
#[derive(Debug)]
pub struct IntegrityChecker {
    cap: DisplayCap,
    node_ids: HashSet<String>,
}

impl IntegrityChecker {
    pub fn new(display_limit: usize) -> Self {
        Self {
            cap: DisplayCap {
                limit: display_limit,
            },
            node_ids: HashSet::new(),
        }
    }

    /// Identifiers collected from the nodes file so far
    pub fn node_ids(&self) -> &HashSet<String> {
        &self.node_ids
    }

    /// Check every recognized file, in processing order
    pub async fn check_dataset(&mut self, layout: &DatasetLayout, findings: &mut Findings) {
        for (category, path) in layout.recognized() {
            self.check_file(category, path, findings).await;
        }
    }

    /// Load one recognized file, check it and release it
    pub async fn check_file(
        &mut self,
        category: DatasetFileCategory,
        path: &Path,
        findings: &mut Findings,
    ) {
        let filename = display_name(path);
        let Some(table) = load_table(path, &filename, findings).await else {
            return;
        };

        debug!(file = %filename, %category, features = table.len(), "checking integrity");
        self.check_table(category, &filename, &table, findings);
        drop(table);
    }

    /// All checks for one loaded table. Checks accumulate; none short-circuits.
    pub fn check_table(
        &mut self,
        category: DatasetFileCategory,
        filename: &str,
        table: &FeatureTable,
        findings: &mut Findings,
    ) {
        self.check_unique_ids(category, filename, table, findings);

        if category == DatasetFileCategory::Nodes {
            self.node_ids
                .extend(table.values(ID_COLUMN).filter_map(|(_, value)| id_key(value)));
        }

        for column in category.node_references() {
            self.check_node_references(category, column, filename, table, findings);
        }

        self.check_geometries(category, filename, table, findings);
    }

    fn check_unique_ids(
        &self,
        category: DatasetFileCategory,
        filename: &str,
        table: &FeatureTable,
        findings: &mut Findings,
    ) {
        if !table.has_column(ID_COLUMN) {
            findings.record_file_error(
                filename,
                format!("Missing required column '{ID_COLUMN}' in {category}."),
            );
            return;
        }

        let duplicates = duplicates(table.values(ID_COLUMN).filter_map(|(_, v)| id_key(v)));
        if duplicates.is_empty() {
            return;
        }

        let message = if duplicates.len() > self.cap.limit {
            format!(
                "Duplicate _id's found in {category} (showing first {} of {} duplicates): {}",
                self.cap.limit,
                duplicates.len(),
                self.cap.list(&duplicates)
            )
        } else {
            format!(
                "Duplicate _id's found in {category}: {}",
                self.cap.list(&duplicates)
            )
        };
        findings.record_file_error(filename, message);
    }

    fn check_node_references(
        &self,
        category: DatasetFileCategory,
        column: &str,
        filename: &str,
        table: &FeatureTable,
        findings: &mut Findings,
    ) {
        if !table.has_column(column) {
            findings.record_file_error(
                filename,
                format!("Missing required column '{column}' in {category}."),
            );
            return;
        }

        let mut seen = HashSet::new();
        let unmatched: Vec<String> = table
            .values(column)
            .flat_map(|(_, value)| reference_keys(value))
            .filter(|key| !self.node_ids.contains(key))
            .filter(|key| seen.insert(key.clone()))
            .collect();

        if unmatched.is_empty() {
            return;
        }

        findings.record_file_error(
            filename,
            format!(
                "All {column}'s in {category} should be part of _id's mentioned in nodes. \
                 Showing {} out of {} unmatched {column}'s: {}",
                self.cap.showing(unmatched.len()),
                unmatched.len(),
                self.cap.list(&unmatched)
            ),
        );
    }

    fn check_geometries(
        &self,
        category: DatasetFileCategory,
        filename: &str,
        table: &FeatureTable,
        findings: &mut Findings,
    ) {
        let expected = category.expected_geometry();
        let invalid: Vec<String> = table
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                !row.geometry
                    .as_ref()
                    .is_some_and(|g| g.kind() == Some(expected) && g.is_valid())
            })
            .map(|(index, _)| table.row_label(index))
            .collect();

        if invalid.is_empty() {
            return;
        }

        findings.record_file_error(
            filename,
            format!(
                "Showing {} out of {} invalid {category} geometries, id's of invalid geometries: {}",
                self.cap.showing(invalid.len()),
                invalid.len(),
                self.cap.list(&invalid)
            ),
        );
    }

    /// Geometry validity of files that match no category. Type is not checked.
    pub async fn check_extension(&self, path: &Path, findings: &mut Findings) {
        let filename = display_name(path);
        let Some(table) = load_table(path, &filename, findings).await else {
            return;
        };

        let invalid: Vec<String> = table
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| row.geometry.as_ref().is_some_and(|g| !g.is_valid()))
            .map(|(index, _)| table.row_label(index))
            .collect();
        drop(table);

        if invalid.is_empty() {
            return;
        }

        findings.record_file_error(
            &filename,
            format!(
                "Invalid geometries found in extension file {filename}. \
                 Showing {} out of {}, id's of invalid geometries: {}",
                self.cap.showing(invalid.len()),
                invalid.len(),
                self.cap.list(&invalid)
            ),
        );
    }
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_LIMIT)
    }
}

async fn load_table(path: &Path, filename: &str, findings: &mut Findings) -> Option<FeatureTable> {
    match FeatureTable::load(path).await {
        Ok(table) => Some(table),
        Err(ValidationError::FeatureLoad { details, .. }) => {
            findings.record_file_error(filename, format!("Failed to parse {filename}: {details}"));
            None
        }
        Err(e) => {
            findings.record_file_error(filename, format!("Unable to read file {filename}: {e}"));
            None
        }
    }
}
