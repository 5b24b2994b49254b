//! Directory walker built on jwalk.
//!
//! [`Walker::scan`] makes two passes over the tree: a counting pass so that
//! progress can be reported against a known total, then the collecting pass.
//! Both passes apply the same eligibility rules:
//!
//! - regular files only (symlinks are not followed)
//! - zero-byte files are skipped
//! - bundle/image containers (`.app .bundle .pkg .dmg .iso`) are skipped,
//!   and directories carrying those extensions are not descended
//! - OS metadata entries (`._*`, `.DS_Store`, `Thumbs.db`,
//!   `.Spotlight-V100`, `.Trashes`) are skipped, directories included
//! - with an [`ExtensionFilter`], only accepted extensions are kept
//!
//! Unreadable entries below the root are recorded as [`AccessIssue`]s and the
//! walk carries on.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jwalk::WalkDir;

use super::path_utils::{extension_key, name_key};
use super::{mtime_seconds, AccessIssue, ExtensionFilter, FileRecord, ScanError};
use crate::logging::Logger;
use crate::progress::{CancelCheck, ProgressSink, ProgressTracker};

/// Container extensions that are never read.
pub const SKIP_EXTENSIONS: [&str; 5] = [".app", ".bundle", ".pkg", ".dmg", ".iso"];

/// Name prefixes of OS metadata entries.
pub const SKIP_NAME_PREFIXES: [&str; 5] =
    ["._", ".DS_Store", "Thumbs.db", ".Spotlight-V100", ".Trashes"];

/// Number of progress updates per scan.
const SCAN_PROGRESS_DIVISIONS: usize = 20;

/// Whether an entry name is on the deny-lists.
#[must_use]
pub fn is_skipped_name(name: &OsStr) -> bool {
    let key = name_key(name);
    if SKIP_NAME_PREFIXES.iter().any(|p| key.starts_with(p)) {
        return true;
    }
    extension_key(Path::new(&key)).is_some_and(|ext| SKIP_EXTENSIONS.contains(&ext.as_str()))
}

/// Result of a completed (or cancelled) scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Eligible files in walk order
    pub files: Vec<FileRecord>,
    /// Paths that could not be read
    pub issues: Vec<AccessIssue>,
    /// Set when the cancellation predicate tripped mid-walk
    pub cancelled: bool,
}

impl ScanOutcome {
    /// Directories that were skipped because they could not be listed.
    pub fn skipped_directories(&self) -> impl Iterator<Item = &Path> {
        self.issues
            .iter()
            .filter(|i| i.is_directory)
            .map(|i| i.path.as_path())
    }

    /// Issue count and a one-line description.
    #[must_use]
    pub fn permission_summary(&self) -> (usize, String) {
        permission_summary(&self.issues)
    }
}

/// Issue count and a one-line description for a list of access issues.
#[must_use]
pub fn permission_summary(issues: &[AccessIssue]) -> (usize, String) {
    if issues.is_empty() {
        return (0, "No permission issues".to_string());
    }
    let skipped = issues.iter().filter(|i| i.is_directory).count();
    (
        issues.len(),
        format!(
            "Found {} permission issue(s), skipped {} director{}",
            issues.len(),
            skipped,
            if skipped == 1 { "y" } else { "ies" }
        ),
    )
}

enum WalkItem {
    File(FileRecord),
    Issue(AccessIssue),
}

/// Directory walker for one root.
pub struct Walker {
    root: PathBuf,
    filter: Option<ExtensionFilter>,
    cancel: Option<Arc<dyn CancelCheck>>,
    logger: Logger,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("filter", &self.filter)
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

impl Walker {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            filter: None,
            cancel: None,
            logger: Logger::discard(),
        }
    }

    #[must_use]
    pub fn with_extension_filter(mut self, filter: Option<ExtensionFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Stop walking once `cancel` reports true.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Option<Arc<dyn CancelCheck>>) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger.with_target("hashdupe::walker");
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    /// Verify the root exists, is a directory and can be listed.
    ///
    /// # Errors
    ///
    /// Returns the matching [`ScanError`] variant.
    pub fn check_root(&self) -> Result<(), ScanError> {
        let metadata = fs::metadata(&self.root).map_err(|e| ScanError::from_io(&self.root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }
        fs::read_dir(&self.root).map_err(|e| ScanError::from_io(&self.root, e))?;
        Ok(())
    }

    /// Enumerate eligible files with progress reporting.
    ///
    /// Progress is `(0, total)` first, then roughly every twentieth file,
    /// then `(total, total)`.
    ///
    /// # Errors
    ///
    /// Only root failures are errors; everything below the root is reported
    /// through [`ScanOutcome::issues`].
    pub fn scan(&self, progress: Option<Arc<dyn ProgressSink>>) -> Result<ScanOutcome, ScanError> {
        self.check_root()?;

        let mut outcome = ScanOutcome::default();
        let total = self
            .entries()
            .filter(|item| matches!(item, WalkItem::File(_)))
            .count();
        if self.is_cancelled() {
            outcome.cancelled = true;
            return Ok(outcome);
        }
        self.logger.debug(format_args!(
            "Counted {} eligible files under {}",
            total,
            self.root.display()
        ));

        let tracker = ProgressTracker::new(progress, total, SCAN_PROGRESS_DIVISIONS);
        tracker.start(0);

        let mut seen_issues = HashSet::new();
        for item in self.entries() {
            match item {
                WalkItem::File(record) => {
                    outcome.files.push(record);
                    tracker.advance(1);
                }
                WalkItem::Issue(issue) => {
                    if seen_issues.insert(issue.path.clone()) {
                        self.logger.warn(format_args!(
                            "Skipping {}: {}",
                            issue.path.display(),
                            issue.reason
                        ));
                        outcome.issues.push(issue);
                    }
                }
            }
        }
        outcome.cancelled = self.is_cancelled();
        if !outcome.cancelled {
            tracker.finish();
        }

        self.logger.info(format_args!(
            "Found {} files under {} ({} inaccessible)",
            outcome.files.len(),
            self.root.display(),
            outcome.issues.len()
        ));
        Ok(outcome)
    }

    /// List paths under the root that cannot be read, without collecting files.
    ///
    /// # Errors
    ///
    /// Returns a [`ScanError`] for root failures.
    pub fn check_permissions(&self) -> Result<Vec<AccessIssue>, ScanError> {
        self.check_root()?;
        Ok(self
            .entries()
            .filter_map(|item| match item {
                WalkItem::Issue(issue) => Some(issue),
                WalkItem::File(_) => None,
            })
            .collect())
    }

    fn entries(&self) -> impl Iterator<Item = WalkItem> + '_ {
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(false)
            .process_read_dir(|_depth, _path, _state, children| {
                children.retain(|child| match child {
                    Ok(entry) => !is_skipped_name(entry.file_name()),
                    Err(_) => true,
                });
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .take_while(move |_| !self.is_cancelled())
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        return None;
                    }
                    self.classify_file(entry.path())
                }
                Err(e) => {
                    let path = e.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
                    let is_directory = path.is_dir();
                    Some(WalkItem::Issue(AccessIssue {
                        path,
                        reason: e.to_string(),
                        is_directory,
                    }))
                }
            })
    }

    fn classify_file(&self, path: PathBuf) -> Option<WalkItem> {
        let metadata = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                let reason = ScanError::from_io(&path, e).to_string();
                return Some(WalkItem::Issue(AccessIssue {
                    path,
                    reason,
                    is_directory: false,
                }));
            }
        };

        if !metadata.is_file() {
            return None;
        }
        let size = metadata.len();
        if size == 0 {
            self.logger
                .trace(format_args!("Skipping empty file: {}", path.display()));
            return None;
        }
        if let Some(filter) = &self.filter {
            if !filter.matches(&path) {
                return None;
            }
        }

        Some(WalkItem::File(FileRecord {
            size,
            mtime: mtime_seconds(metadata.modified().ok()),
            path,
        }))
    }
}
