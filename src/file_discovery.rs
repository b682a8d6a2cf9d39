use crate::error::{Result, ValidationError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Async discovery of GeoJSON-like files inside a staged archive
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// File extensions to include (e.g., ["geojson"])
    extensions: Vec<String>,
    /// Directory names that are never descended into (e.g., "__MACOSX")
    exclude_dirs: Vec<String>,
    /// Maximum depth for directory traversal (None = unlimited)
    max_depth: Option<usize>,
}

impl FileDiscovery {
    /// Create a new FileDiscovery instance
    pub fn new() -> Self {
        Self {
            extensions: vec!["geojson".to_string()],
            exclude_dirs: vec!["__MACOSX".to_string()],
            max_depth: None,
        }
    }

    /// Set file extensions to discover
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Set directory names to skip
    pub fn with_exclude_dirs(mut self, dirs: Vec<String>) -> Self {
        self.exclude_dirs = dirs;
        self
    }

    /// Set maximum traversal depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Discover files under `path`, sorted so repeated runs see the same order
    pub async fn discover_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.discover(path).await.map(|(files, _)| files)
    }

    /// Discover files under `path` and count the entries that were skipped.
    ///
    /// Symbolic links are never followed: an archive must not point discovery
    /// outside its staging directory. Links and unreadable entries are counted
    /// in [`DiscoveryStats::skipped`].
    pub async fn discover(&self, path: &Path) -> Result<(Vec<PathBuf>, DiscoveryStats)> {
        let metadata = fs::metadata(path).await.map_err(ValidationError::from)?;
        let mut stats = DiscoveryStats::default();

        if metadata.is_file() {
            let files = if self.should_process(path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            };
            stats.files_found = files.len();
            return Ok((files, stats));
        }

        let mut files = Vec::new();
        let mut read_dir = fs::read_dir(path).await.map_err(ValidationError::from)?;

        while let Some(entry) = read_dir.next_entry().await.map_err(ValidationError::from)? {
            self.visit_entry(&entry.path(), 0, &mut files, &mut stats)
                .await;
        }

        files.sort();
        stats.files_found = files.len();
        Ok((files, stats))
    }

    async fn visit_entry(
        &self,
        path: &Path,
        depth: usize,
        files: &mut Vec<PathBuf>,
        stats: &mut DiscoveryStats,
    ) {
        if path.is_symlink() {
            debug!(path = %path.display(), "skipping symbolic link");
            stats.skipped += 1;
            return;
        }

        if let Err(e) = self
            .discover_files_recursive(path, depth, files, stats)
            .await
        {
            warn!(path = %path.display(), error = %e, "skipping unreadable entry");
            stats.skipped += 1;
        }
    }

    /// Recursive helper for discovering files
    fn discover_files_recursive<'a>(
        &'a self,
        path: &'a Path,
        depth: usize,
        files: &'a mut Vec<PathBuf>,
        stats: &'a mut DiscoveryStats,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + 'a>> {
        Box::pin(async move {
            if let Some(max_depth) = self.max_depth
                && depth > max_depth
            {
                return Ok(());
            }

            let metadata = fs::metadata(path).await.map_err(ValidationError::from)?;

            if metadata.is_file() {
                if self.should_process(path) {
                    files.push(path.to_path_buf());
                }
            } else if metadata.is_dir() {
                if self.is_excluded_dir(path) {
                    return Ok(());
                }

                if let Some(max_depth) = self.max_depth
                    && depth >= max_depth
                {
                    return Ok(());
                }

                let mut read_dir = fs::read_dir(path).await.map_err(ValidationError::from)?;

                while let Some(entry) =
                    read_dir.next_entry().await.map_err(ValidationError::from)?
                {
                    self.visit_entry(&entry.path(), depth + 1, files, stats)
                        .await;
                }
            }

            Ok(())
        })
    }

    /// Check if a file should be processed based on its name and extension
    pub fn should_process(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        // resource forks and other hidden files ("._nodes.geojson")
        if name.starts_with('.') {
            return false;
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some(extension) => self.extensions.contains(&extension.to_lowercase()),
            None => false,
        }
    }

    fn is_excluded_dir(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.exclude_dirs.iter().any(|d| d == name))
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts from one discovery pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub files_found: usize,
    /// Symbolic links and unreadable entries that were not examined
    pub skipped: usize,
}
