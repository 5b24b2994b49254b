//! File enumeration and content hashing.
//!
//! - [`walker`]: directory traversal producing [`FileRecord`]s
//! - [`hasher`]: full and partial content digests
//! - [`path_utils`]: Unicode-normalized comparison keys
//!
//! # Example
//!
//! ```no_run
//! use hashdupe::scanner::{ExtensionFilter, Walker};
//! use std::path::Path;
//!
//! let filter = ExtensionFilter::new(&["mp4", ".mkv"]).unwrap();
//! let walker = Walker::new(Path::new("/media")).with_extension_filter(Some(filter));
//! let outcome = walker.scan(None).unwrap();
//! for file in &outcome.files {
//!     println!("{}: {} bytes", file.path.display(), file.size);
//! }
//! ```

pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use hasher::{Acceleration, HashAlgorithm, Hasher};
pub use walker::{ScanOutcome, Walker};

/// Snapshot of one eligible file, taken at scan time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path as returned by the directory walk
    pub path: PathBuf,
    /// Size in bytes, always at least 1
    pub size: u64,
    /// Modification time in seconds since the UNIX epoch
    pub mtime: f64,
}

impl FileRecord {
    #[must_use]
    pub fn new(path: PathBuf, size: u64, mtime: f64) -> Self {
        Self { path, size, mtime }
    }

    /// Snapshot a path from its current metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if the metadata cannot be read.
    pub fn from_path(path: &Path) -> Result<Self, ScanError> {
        let metadata = std::fs::metadata(path).map_err(|e| ScanError::from_io(path, e))?;
        Ok(Self::new(
            path.to_path_buf(),
            metadata.len(),
            mtime_seconds(metadata.modified().ok()),
        ))
    }
}

/// Seconds since the epoch as `f64`; times before the epoch are negative and
/// an unavailable time is `0.0`.
#[must_use]
pub fn mtime_seconds(modified: Option<SystemTime>) -> f64 {
    match modified.map(|t| t.duration_since(UNIX_EPOCH)) {
        Some(Ok(d)) => d.as_secs_f64(),
        Some(Err(e)) => -e.duration().as_secs_f64(),
        None => 0.0,
    }
}

/// Case-insensitive extension allow-list.
///
/// Accepts both `"mp4"` and `".mp4"` spellings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    accepted: BTreeSet<String>,
}

impl ExtensionFilter {
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyExtension`] for blank entries.
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Result<Self, ValidationError> {
        let mut accepted = BTreeSet::new();
        for ext in extensions {
            let trimmed = ext.as_ref().trim().trim_start_matches('.');
            if trimmed.is_empty() {
                return Err(ValidationError::EmptyExtension);
            }
            accepted.insert(format!(".{}", path_utils::normalize_str(trimmed).to_lowercase()));
        }
        Ok(Self { accepted })
    }

    /// Whether `path`'s extension is accepted.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path_utils::extension_key(path).is_some_and(|ext| self.accepted.contains(&ext))
    }

    /// Normalized `.ext` entries in sorted order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.accepted.iter().map(String::as_str)
    }
}

/// A path that could not be read during the walk. The walk continues past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessIssue {
    pub path: PathBuf,
    pub reason: String,
    /// `true` when a whole directory was skipped
    pub is_directory: bool,
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error by kind.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HashError {
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
