//! JSON output for scan results.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "duplicates": [
//!     {
//!       "hash": "abc123...",
//!       "size": 1024,
//!       "total_size": 2048,
//!       "files": ["/path/to/file1.txt", "/path/to/file2.txt"]
//!     }
//!   ],
//!   "summary": {
//!     "total_files": 100,
//!     "total_size": 1048576,
//!     "candidates": 12,
//!     "strategy": "parallel",
//!     "duplicate_groups": 5,
//!     "duplicate_files": 10,
//!     "reclaimable_space": 51200,
//!     "scan_duration_ms": 1234,
//!     "cancelled": false,
//!     "exit_code": 0,
//!     "exit_code_name": "HD000"
//!   },
//!   "cache": { "enabled": true, "hits": 10, "misses": 2, "hit_rate": 83.3 }
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::duplicates::{CacheReport, DuplicateGroup, ScanSummary, Strategy};
use crate::error::ExitCode;
use crate::scanner::AccessIssue;

/// One duplicate group.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// Hex digest shared by every file
    pub hash: String,
    /// Size of each file in bytes
    pub size: u64,
    pub total_size: u64,
    pub files: Vec<String>,
}

impl JsonDuplicateGroup {
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup) -> Self {
        Self {
            hash: group.hash.clone(),
            size: group.size(),
            total_size: group.total_size,
            files: group
                .files
                .iter()
                .map(|f| f.path.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Summary statistics.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    pub total_files: usize,
    pub total_size: u64,
    /// Files left after size grouping
    pub candidates: usize,
    pub strategy: Option<Strategy>,
    pub partial_hashes: usize,
    pub full_hashes: usize,
    pub hash_failures: usize,
    pub duplicate_groups: usize,
    pub duplicate_files: usize,
    /// Bytes freed by keeping one copy per group
    pub reclaimable_space: u64,
    pub scan_duration_ms: u64,
    pub cancelled: bool,
    pub access_issues: Vec<AccessIssue>,
    pub exit_code: i32,
    /// Machine-readable exit code name (e.g. "HD000")
    pub exit_code_name: String,
}

impl JsonSummary {
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            total_files: summary.total_files,
            total_size: summary.total_size,
            candidates: summary.candidates,
            strategy: summary.strategy,
            partial_hashes: summary.partial_hashes,
            full_hashes: summary.full_hashes,
            hash_failures: summary.hash_failures,
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            reclaimable_space: summary.reclaimable_space,
            scan_duration_ms: summary.duration.as_millis() as u64,
            cancelled: summary.cancelled,
            access_issues: summary.access_issues.clone(),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    pub duplicates: Vec<JsonDuplicateGroup>,
    pub summary: JsonSummary,
    pub cache: CacheReport,
}

impl JsonOutput {
    /// # Example
    ///
    /// ```
    /// use hashdupe::duplicates::{CacheReport, DuplicateGroup, ScanSummary};
    /// use hashdupe::output::json::JsonOutput;
    /// use hashdupe::error::ExitCode;
    /// use hashdupe::scanner::FileRecord;
    /// use std::path::PathBuf;
    ///
    /// let groups = vec![DuplicateGroup::new(
    ///     "ab".repeat(32),
    ///     vec![
    ///         FileRecord::new(PathBuf::from("/file1.txt"), 1024, 0.0),
    ///         FileRecord::new(PathBuf::from("/file2.txt"), 1024, 0.0),
    ///     ],
    /// )];
    ///
    /// let summary = ScanSummary::default();
    /// let output = JsonOutput::new(&groups, &summary, &CacheReport::default(), ExitCode::Success);
    /// assert_eq!(output.duplicates.len(), 1);
    /// assert_eq!(output.duplicates[0].total_size, 2048);
    /// ```
    #[must_use]
    pub fn new(
        groups: &[DuplicateGroup],
        summary: &ScanSummary,
        cache: &CacheReport,
        exit_code: ExitCode,
    ) -> Self {
        Self {
            duplicates: groups
                .iter()
                .map(JsonDuplicateGroup::from_duplicate_group)
                .collect(),
            summary: JsonSummary::from_scan_summary(summary, exit_code),
            cache: cache.clone(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the document followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
