//! Duplicate detection.
//!
//! - [`groups`]: size grouping, duplicate groups and the wasted-space sum
//! - [`finder`]: the pipeline that enumerates, hashes and collates

pub mod finder;
pub mod groups;

pub use finder::{
    CacheReport, DuplicateFinder, FinderConfig, FinderError, ScanHooks, ScanSummary, Strategy,
};
pub use groups::{collate, group_by_size, wasted_space, DuplicateGroup, GroupingStats, SizeGroup};
