//! Test discovery - find corpus inputs in a directory

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Discovery errors; all of them abort the run before any invocation
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Corpus directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Corpus path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to read corpus directory {path}: {source}")]
    Unreadable { path: PathBuf, source: io::Error },

    #[error("Failed to list corpus directory {path}: {source}")]
    Listing {
        path: PathBuf,
        source: walkdir::Error,
    },
}

/// A discovered corpus input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Path of the input file, as found under the corpus directory
    pub file: PathBuf,
}

impl TestCase {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    /// File name used for filtering and display
    pub fn name(&self) -> String {
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.display().to_string())
    }
}

/// The ordered set of corpus inputs for one run
#[derive(Debug, Default)]
pub struct TestSuite {
    /// Discovered inputs, sorted by path
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    /// Discover all files directly inside `dir` whose name ends with `suffix`
    ///
    /// Subdirectories are not entered. The result is sorted by path so runs
    /// are reproducible regardless of the platform's listing order.
    pub fn discover(dir: &Path, suffix: &str) -> Result<Self, DiscoveryError> {
        let metadata = fs::metadata(dir).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DiscoveryError::NotFound(dir.to_path_buf())
            } else {
                DiscoveryError::Unreadable {
                    path: dir.to_path_buf(),
                    source: e,
                }
            }
        })?;

        if !metadata.is_dir() {
            return Err(DiscoveryError::NotADirectory(dir.to_path_buf()));
        }

        let mut cases = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
        {
            let entry = entry.map_err(|e| DiscoveryError::Listing {
                path: dir.to_path_buf(),
                source: e,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(suffix));

            if matches {
                cases.push(TestCase::new(entry.path()));
            } else {
                debug!(path = %entry.path().display(), "skipping non-matching file");
            }
        }

        cases.sort_by(|a, b| a.file.cmp(&b.file));
        info!(dir = %dir.display(), suffix, count = cases.len(), "discovered corpus inputs");

        Ok(TestSuite { cases })
    }

    /// Keep only cases whose file name contains `pattern`
    pub fn filter(&self, pattern: &str) -> Self {
        let cases = self
            .cases
            .iter()
            .filter(|c| c.name().contains(pattern))
            .cloned()
            .collect();

        TestSuite { cases }
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }
}
