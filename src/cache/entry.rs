//! Cache entry definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::FileRecord;

/// One cached full hash, valid while `size` and `mtime` still match the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub size: u64,
    pub mtime: f64,
    /// Lowercase hex digest of the full content
    pub hash: String,
}

impl CacheEntry {
    #[must_use]
    pub fn new(path: PathBuf, size: u64, mtime: f64, hash: String) -> Self {
        Self {
            path,
            size,
            mtime,
            hash,
        }
    }

    /// Entry for a freshly hashed file.
    #[must_use]
    pub fn from_record(record: &FileRecord, hash: String) -> Self {
        Self::new(record.path.clone(), record.size, record.mtime, hash)
    }

    /// Whether this entry is still valid for a file with the given metadata.
    ///
    /// Both fields must match exactly.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn matches(&self, size: u64, mtime: f64) -> bool {
        self.size == size && self.mtime == mtime
    }
}

/// Aggregate numbers about the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: u64,
    /// Sum of the sizes of all cached files
    pub total_size: u64,
    /// Bytes used on disk by the store, write-ahead log included
    pub db_size: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_requires_exact_metadata() {
        let entry = CacheEntry::new(PathBuf::from("/a"), 10, 1_700_000_000.25, "ab".into());

        assert!(entry.matches(10, 1_700_000_000.25));
        assert!(!entry.matches(11, 1_700_000_000.25));
        assert!(!entry.matches(10, 1_700_000_000.5));
    }

    #[test]
    fn test_from_record() {
        let record = FileRecord::new(PathBuf::from("/x/y.bin"), 42, 3.5);
        let entry = CacheEntry::from_record(&record, "ff".into());
        assert_eq!(entry.path, record.path);
        assert_eq!(entry.size, 42);
        assert_eq!(entry.hash, "ff");
    }
}
