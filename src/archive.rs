//! Archive staging
//!
//! Extracts an OSW archive into a run-owned temporary directory. The directory is
//! removed by [`StagingArea::cleanup`], which is idempotent and also runs on drop,
//! so the extracted tree never outlives the run that created it.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{ArchiveError, ArchiveResult};

const STAGING_PREFIX: &str = "osw-staging-";

/// Scoped temporary directory holding the extracted contents of one archive
#[derive(Debug)]
pub struct StagingArea {
    archive: PathBuf,
    parent: Option<PathBuf>,
    dir: Option<TempDir>,
    root: Option<PathBuf>,
}

impl StagingArea {
    /// Create a staging area for `archive`. Nothing touches the disk until [`extract`](Self::extract).
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            parent: None,
            dir: None,
            root: None,
        }
    }

    /// Create the staging directory under `parent` instead of the system temp dir
    pub fn with_parent(mut self, parent: Option<PathBuf>) -> Self {
        self.parent = parent;
        self
    }

    /// Path of the archive being staged
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Extract every entry of the archive and return the staged root.
    ///
    /// The staged root is the single top-level folder of the archive when all entries
    /// share one, otherwise the staging directory itself.
    pub fn extract(&mut self) -> ArchiveResult<PathBuf> {
        let file = File::open(&self.archive).map_err(|source| ArchiveError::Open {
            path: self.archive.clone(),
            source,
        })?;

        let mut zip = ZipArchive::new(file).map_err(|e| ArchiveError::Corrupt {
            details: format!("{}: {}", self.archive.display(), e),
        })?;

        if zip.len() == 0 {
            return Err(ArchiveError::Empty {
                path: self.archive.clone(),
            });
        }

        let entry_names: Vec<String> = zip.file_names().map(str::to_owned).collect();

        let dir_path = self.ensure_dir()?;
        zip.extract(&dir_path).map_err(|e| ArchiveError::Corrupt {
            details: format!("{}: {}", self.archive.display(), e),
        })?;

        let root = staged_root(&dir_path, &entry_names);
        debug!(
            archive = %self.archive.display(),
            entries = entry_names.len(),
            root = %root.display(),
            "archive extracted"
        );

        self.root = Some(root.clone());
        Ok(root)
    }

    /// Staged root returned by the last successful extraction
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Temporary directory owned by this staging area, if one was created
    pub fn staging_dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Remove the staging directory. Safe to call any number of times.
    pub fn cleanup(&mut self) -> std::io::Result<()> {
        self.root = None;
        match self.dir.take() {
            Some(dir) => {
                let path = dir.path().to_path_buf();
                dir.close()?;
                debug!(dir = %path.display(), "staging directory removed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn ensure_dir(&mut self) -> ArchiveResult<PathBuf> {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => {
                let mut builder = tempfile::Builder::new();
                builder.prefix(STAGING_PREFIX);
                match &self.parent {
                    Some(parent) => builder.tempdir_in(parent),
                    None => builder.tempdir(),
                }
                .map_err(ArchiveError::Staging)?
            }
        };
        let path = dir.path().to_path_buf();
        self.dir = Some(dir);
        Ok(path)
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            tracing::warn!(error = %e, "failed to remove staging directory");
        }
    }
}

/// Pick the directory the layout resolver should scan.
fn staged_root(dir: &Path, entry_names: &[String]) -> PathBuf {
    let mut top_levels = BTreeSet::new();

    for name in entry_names {
        let mut components = name.split('/').filter(|c| !c.is_empty());
        let Some(first) = components.next() else {
            continue;
        };
        let is_dir_entry = name.ends_with('/');
        if components.next().is_none() && !is_dir_entry {
            // a file at the archive root: no wrapper folder
            return dir.to_path_buf();
        }
        top_levels.insert(first);
    }

    match top_levels.len() {
        1 => top_levels
            .into_iter()
            .next()
            .map(|top| dir.join(top))
            .unwrap_or_else(|| dir.to_path_buf()),
        _ => dir.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_zip;

    #[test]
    fn test_extract_wrapped_archive() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("dataset.zip");
        write_zip(
            &zip_path,
            &[
                ("minimal/", ""),
                ("minimal/city.nodes.geojson", "{}"),
                ("minimal/city.edges.geojson", "{}"),
            ],
        );

        let mut staging = StagingArea::new(&zip_path);
        let root = staging.extract().unwrap();

        assert!(root.ends_with("minimal"));
        assert!(root.join("city.nodes.geojson").exists());
        assert!(root.join("city.edges.geojson").exists());
        assert_eq!(staging.root(), Some(root.as_path()));
    }

    #[test]
    fn test_extract_flat_archive_uses_staging_dir() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("flat.zip");
        write_zip(&zip_path, &[("nodes.geojson", "{}"), ("edges.geojson", "{}")]);

        let mut staging = StagingArea::new(&zip_path);
        let root = staging.extract().unwrap();

        assert_eq!(Some(root.as_path()), staging.staging_dir());
        assert!(root.join("nodes.geojson").exists());
    }

    #[test]
    fn test_cleanup_removes_directory_and_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("dataset.zip");
        write_zip(&zip_path, &[("nodes.geojson", "{}")]);

        let mut staging = StagingArea::new(&zip_path);
        staging.extract().unwrap();
        let dir = staging.staging_dir().unwrap().to_path_buf();
        assert!(dir.exists());

        staging.cleanup().unwrap();
        assert!(!dir.exists());
        assert!(staging.staging_dir().is_none());
        assert!(staging.root().is_none());

        staging.cleanup().unwrap();
    }

    #[test]
    fn test_drop_removes_directory() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("dataset.zip");
        write_zip(&zip_path, &[("nodes.geojson", "{}")]);

        let dir = {
            let mut staging = StagingArea::new(&zip_path);
            staging.extract().unwrap();
            staging.staging_dir().unwrap().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_staging_under_parent() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("dataset.zip");
        write_zip(&zip_path, &[("nodes.geojson", "{}")]);
        let parent = temp.path().join("staging");
        std::fs::create_dir(&parent).unwrap();

        let mut staging = StagingArea::new(&zip_path).with_parent(Some(parent.clone()));
        staging.extract().unwrap();
        assert!(staging.staging_dir().unwrap().starts_with(&parent));

        staging.cleanup().unwrap();
        assert_eq!(std::fs::read_dir(&parent).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_archive_fails() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("empty.zip");
        write_zip(&zip_path, &[]);

        let mut staging = StagingArea::new(&zip_path);
        let err = staging.extract().unwrap_err();

        assert!(matches!(err, ArchiveError::Empty { .. }));
        assert!(staging.staging_dir().is_none());
    }

    #[test]
    fn test_corrupt_archive_fails() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("corrupt.zip");
        std::fs::write(&zip_path, b"this is not a zip archive").unwrap();

        let mut staging = StagingArea::new(&zip_path);
        let err = staging.extract().unwrap_err();

        assert!(matches!(err, ArchiveError::Corrupt { .. }));
        assert!(err.to_string().contains("Error extracting ZIP file"));
    }

    #[test]
    fn test_missing_archive_fails() {
        let mut staging = StagingArea::new("/nonexistent/archive.zip");
        let err = staging.extract().unwrap_err();
        assert!(matches!(err, ArchiveError::Open { .. }));
    }

    #[test]
    fn test_staged_root_selection() {
        let dir = Path::new("/stage");
        let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(
            staged_root(dir, &names(&["a/", "a/nodes.geojson"])),
            PathBuf::from("/stage/a")
        );
        assert_eq!(
            staged_root(dir, &names(&["a/nodes.geojson", "a/sub/edges.geojson"])),
            PathBuf::from("/stage/a")
        );
        assert_eq!(
            staged_root(dir, &names(&["a/nodes.geojson", "b/edges.geojson"])),
            PathBuf::from("/stage")
        );
        assert_eq!(
            staged_root(dir, &names(&["a/", "nodes.geojson"])),
            PathBuf::from("/stage")
        );
    }
}
