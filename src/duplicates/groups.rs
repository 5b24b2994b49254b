//! Size grouping and duplicate group collation.
//!
//! Size grouping is the first pruning step: files of different sizes cannot
//! be identical, so only sizes shared by two or more files go on to hashing.
//! [`collate`] is the last step, turning `(file, full hash)` pairs into
//! [`DuplicateGroup`]s.
//!
//! ```
//! use hashdupe::duplicates::group_by_size;
//! use hashdupe::scanner::FileRecord;
//! use std::path::PathBuf;
//!
//! let files = vec![
//!     FileRecord::new(PathBuf::from("/file1.txt"), 1024, 0.0),
//!     FileRecord::new(PathBuf::from("/file2.txt"), 1024, 0.0),
//!     FileRecord::new(PathBuf::from("/file3.txt"), 2048, 0.0),
//! ];
//!
//! let (groups, stats) = group_by_size(files);
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(stats.potential_duplicates, 2);
//! assert_eq!(groups.len(), 1);
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scanner::FileRecord;

/// Files sharing one exact size.
#[derive(Debug, Clone)]
pub struct SizeGroup {
    pub size: u64,
    pub files: Vec<FileRecord>,
}

impl SizeGroup {
    #[must_use]
    pub fn new(size: u64) -> Self {
        Self {
            size,
            files: Vec::new(),
        }
    }

    /// # Panics
    ///
    /// Debug assertion fails if the file size doesn't match the group size.
    pub fn add(&mut self, file: FileRecord) {
        debug_assert_eq!(
            file.size, self.size,
            "File size {} doesn't match group size {}",
            file.size, self.size
        );
        self.files.push(file);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Two or more files, so possibly duplicates.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.files.len() > 1
    }
}

/// Files with identical size and identical full hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Full-content hash shared by every member
    pub hash: String,
    /// Members in scan order; always at least two
    pub files: Vec<FileRecord>,
    /// `size × files.len()`
    pub total_size: u64,
}

impl DuplicateGroup {
    /// Build a group; `total_size` is derived from the first member's size.
    #[must_use]
    pub fn new(hash: String, files: Vec<FileRecord>) -> Self {
        let total_size = files.first().map_or(0, |f| f.size) * files.len() as u64;
        Self {
            hash,
            files,
            total_size,
        }
    }

    /// Size of each member.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.files.first().map_or(0, |f| f.size)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Bytes that deleting all but one copy would free.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.total_size.saturating_sub(self.size())
    }

    /// Copies beyond the first.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Reclaimable bytes across groups: `Σ (total_size − size of first member)`.
#[must_use]
pub fn wasted_space(groups: &[DuplicateGroup]) -> u64 {
    groups.iter().map(DuplicateGroup::wasted_space).sum()
}

/// Statistics from the size grouping step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    pub total_files: usize,
    pub total_size: u64,
    pub unique_sizes: usize,
    /// Files in size groups of two or more
    pub potential_duplicates: usize,
    /// Files dropped because their size was unique
    pub eliminated_unique: usize,
    /// Size groups with two or more files
    pub duplicate_groups: usize,
}

impl GroupingStats {
    /// Percentage of files eliminated by size grouping.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Bucket files by exact size and drop singleton buckets.
///
/// Groups come back in the order their size was first seen, and files keep
/// their input order within a group.
#[must_use]
pub fn group_by_size(
    files: impl IntoIterator<Item = FileRecord>,
) -> (Vec<SizeGroup>, GroupingStats) {
    let mut index: HashMap<u64, usize> = HashMap::new();
    let mut all_groups: Vec<SizeGroup> = Vec::new();
    let mut stats = GroupingStats::default();

    for file in files {
        stats.total_files += 1;
        stats.total_size += file.size;
        let slot = *index.entry(file.size).or_insert_with(|| {
            all_groups.push(SizeGroup::new(file.size));
            all_groups.len() - 1
        });
        all_groups[slot].add(file);
    }

    stats.unique_sizes = all_groups.len();
    let groups: Vec<SizeGroup> = all_groups
        .into_iter()
        .filter(|group| {
            if group.has_duplicates() {
                stats.potential_duplicates += group.len();
                stats.duplicate_groups += 1;
                true
            } else {
                stats.eliminated_unique += group.len();
                false
            }
        })
        .collect();

    (groups, stats)
}

/// Collate hashed files into duplicate groups.
///
/// Files are bucketed by `(size, hash)` in input order; buckets with fewer
/// than two members are dropped, and the rest are stable-sorted by
/// descending `total_size`.
#[must_use]
pub fn collate(hashed: impl IntoIterator<Item = (FileRecord, String)>) -> Vec<DuplicateGroup> {
    let mut index: HashMap<(u64, String), usize> = HashMap::new();
    let mut buckets: Vec<(String, Vec<FileRecord>)> = Vec::new();

    for (file, hash) in hashed {
        let key = (file.size, hash);
        match index.get(&key) {
            Some(&slot) => buckets[slot].1.push(file),
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push((key.1, vec![file]));
            }
        }
    }

    let mut groups: Vec<DuplicateGroup> = buckets
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(hash, files)| DuplicateGroup::new(hash, files))
        .collect();
    groups.sort_by(|a, b| b.total_size.cmp(&a.total_size));
    groups
}
