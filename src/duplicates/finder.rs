//! Duplicate detection pipeline.
//!
//! [`DuplicateFinder`] drives one scan from enumeration to collated groups:
//!
//! 1. **Enumerate** - walk the root and keep every eligible file
//! 2. **Size grouping** - drop files whose size is unique
//! 3. **Hash** - with one of three [`Strategy`] variants
//! 4. **Collate** - bucket by full hash, keep buckets of two or more
//!
//! Workers only hash. Cache reads, cache writes and all bucket bookkeeping
//! happen on the calling thread, and writes are committed in one batch per
//! pass.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use super::groups::{collate, group_by_size, wasted_space, DuplicateGroup, SizeGroup};
use crate::cache::{CacheEntry, CacheError, HashCache};
use crate::config::Config;
use crate::error::ValidationError;
use crate::logging::Logger;
use crate::progress::{CancelCheck, ProgressSink, ProgressTracker};
use crate::scanner::walker::permission_summary;
use crate::scanner::{
    Acceleration, AccessIssue, ExtensionFilter, FileRecord, HashError, Hasher, ScanError, Walker,
};

/// Files strictly larger than this count towards the multi-stage threshold.
pub const LARGE_FILE_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Minimum number of large candidates before multi-stage hashing is used.
pub const MULTI_STAGE_MIN_FILES: usize = 10;

/// Default number of workers in the I/O pool.
pub const DEFAULT_IO_THREADS: usize = 4;

const HASH_PROGRESS_DIVISIONS: usize = 20;
const MULTI_STAGE_PROGRESS_DIVISIONS: usize = 40;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Only files with these extensions are scanned
    pub extension_filter: Option<ExtensionFilter>,
    /// Hash in a worker pool instead of on the calling thread
    pub parallel: bool,
    /// Allow the partial-hash prefilter for large files
    pub multi_stage: bool,
    /// Use a pool sized to every core instead of the small I/O pool
    pub cpu_pool: bool,
    /// Workers in the I/O pool
    pub io_threads: usize,
    /// Persistent hash cache, if enabled
    pub cache: Option<Arc<HashCache>>,
    pub hasher: Hasher,
    pub logger: Logger,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            extension_filter: None,
            parallel: true,
            multi_stage: true,
            cpu_pool: false,
            io_threads: DEFAULT_IO_THREADS,
            cache: None,
            hasher: Hasher::new(),
            logger: Logger::discard(),
        }
    }
}

impl fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinderConfig")
            .field("extension_filter", &self.extension_filter)
            .field("parallel", &self.parallel)
            .field("multi_stage", &self.multi_stage)
            .field("cpu_pool", &self.cpu_pool)
            .field("io_threads", &self.io_threads)
            .field("cache", &self.cache.as_ref().map(|_| "<cache>"))
            .field("hasher", &self.hasher)
            .finish()
    }
}

impl FinderConfig {
    /// Build a finder configuration from loaded settings.
    ///
    /// Validation runs first, so nothing is opened for an invalid config.
    /// When caching is enabled the store is opened (and created) here.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Validation`] for invalid settings and
    /// [`FinderError::Cache`] if the store cannot be opened.
    pub fn from_config(config: &Config, logger: &Logger) -> Result<Self, FinderError> {
        config.validate()?;
        let algorithm = config.hash_algorithm()?;
        let acceleration = Acceleration::resolve(config.accelerated_io);
        let hasher = Hasher::new()
            .with_algorithm(algorithm)
            .with_acceleration(acceleration)
            .with_mmap_threshold(config.mmap_threshold)
            .with_logger(logger.clone());

        let cache = if config.cache_enabled {
            match config.resolved_cache_path() {
                Some(path) => Some(Arc::new(HashCache::new(&path)?.with_logger(logger.clone()))),
                None => {
                    logger.warn(format_args!(
                        "No cache directory available on this platform, caching disabled"
                    ));
                    None
                }
            }
        } else {
            None
        };

        Ok(Self::default()
            .with_extension_filter(config.extension_filter()?)
            .with_parallel(config.parallel)
            .with_multi_stage(config.multi_stage)
            .with_cpu_pool(config.cpu_pool)
            .with_io_threads(config.io_threads)
            .with_cache_opt(cache)
            .with_hasher(hasher)
            .with_logger(logger.clone()))
    }

    #[must_use]
    pub fn with_extension_filter(mut self, filter: Option<ExtensionFilter>) -> Self {
        self.extension_filter = filter;
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    #[must_use]
    pub fn with_multi_stage(mut self, enabled: bool) -> Self {
        self.multi_stage = enabled;
        self
    }

    #[must_use]
    pub fn with_cpu_pool(mut self, enabled: bool) -> Self {
        self.cpu_pool = enabled;
        self
    }

    /// Set the I/O pool size (minimum 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<HashCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_cache_opt(mut self, cache: Option<Arc<HashCache>>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }
}

/// Progress sinks and the cancellation predicate for one scan.
#[derive(Clone, Default)]
pub struct ScanHooks {
    /// Receives `(files_found, total_files)` during enumeration
    pub scan_progress: Option<Arc<dyn ProgressSink>>,
    /// Receives `(files_decided, total_candidates)` during hashing
    pub hash_progress: Option<Arc<dyn ProgressSink>>,
    /// Polled before each unit of work
    pub cancel: Option<Arc<dyn CancelCheck>>,
}

impl ScanHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_scan_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.scan_progress = Some(sink);
        self
    }

    #[must_use]
    pub fn with_hash_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.hash_progress = Some(sink);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<dyn CancelCheck>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

impl fmt::Debug for ScanHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanHooks")
            .field("scan_progress", &self.scan_progress.is_some())
            .field("hash_progress", &self.hash_progress.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

// ============================================================================
// Strategy and worker pools
// ============================================================================

/// How candidates are hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Partial hashes first, full hashes only for partial-hash collisions
    MultiStage,
    /// Full hashes in a worker pool
    Parallel,
    /// Full hashes on the calling thread
    Serial,
}

impl Strategy {
    /// Pick the strategy for a set of size groups.
    ///
    /// Multi-stage needs at least [`MULTI_STAGE_MIN_FILES`] candidates larger
    /// than [`LARGE_FILE_THRESHOLD`]; parallel needs more than one group.
    #[must_use]
    pub fn select(groups: &[SizeGroup], multi_stage: bool, parallel: bool) -> Self {
        let large = groups
            .iter()
            .flat_map(|g| g.files.iter())
            .filter(|f| f.size > LARGE_FILE_THRESHOLD)
            .count();
        if multi_stage && large >= MULTI_STAGE_MIN_FILES {
            Self::MultiStage
        } else if parallel && groups.len() > 1 {
            Self::Parallel
        } else {
            Self::Serial
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MultiStage => "multi-stage",
            Self::Parallel => "parallel",
            Self::Serial => "serial",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Workers {
    Serial,
    Io(usize),
    Cpu,
}

/// Minimum items per rayon split in the CPU pool.
fn cpu_chunk_len(items: usize, cores: usize) -> usize {
    (items / (4 * cores.max(1))).max(1)
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

impl Workers {
    /// Apply `work` to every item, returning results in input order.
    fn run<T, R, F>(self, items: Vec<T>, logger: &Logger, work: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        let (threads, min_len) = match self {
            Self::Serial => return items.into_iter().map(work).collect(),
            Self::Io(threads) => (threads.max(1), 1),
            Self::Cpu => {
                let cores = available_cores();
                (cores, cpu_chunk_len(items.len(), cores))
            }
        };

        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| {
                items
                    .into_par_iter()
                    .with_min_len(min_len)
                    .map(&work)
                    .collect()
            }),
            Err(e) => {
                logger.warn(format_args!(
                    "Failed to create a pool of {} threads ({}), hashing serially",
                    threads, e
                ));
                items.into_iter().map(work).collect()
            }
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Statistics about one scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Eligible files found by enumeration
    pub total_files: usize,
    /// Total size of all eligible files in bytes
    pub total_size: u64,
    /// Files left after size grouping
    pub candidates: usize,
    /// `None` if the scan was cancelled before hashing started
    pub strategy: Option<Strategy>,
    pub partial_hashes: usize,
    pub full_hashes: usize,
    /// Files dropped because they could not be hashed
    pub hash_failures: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub duplicate_groups: usize,
    /// Duplicate copies, originals excluded
    pub duplicate_files: usize,
    /// Bytes freed by keeping one copy per group
    pub reclaimable_space: u64,
    /// Paths that could not be read during enumeration
    pub access_issues: Vec<AccessIssue>,
    pub duration: Duration,
    pub cancelled: bool,
}

impl ScanSummary {
    /// Percentage of scanned bytes taken by redundant copies.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.reclaimable_space as f64 / self.total_size as f64) * 100.0
        }
    }

    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize(self.reclaimable_space).to_string()
    }

    #[must_use]
    pub fn total_size_display(&self) -> String {
        ByteSize(self.total_size).to_string()
    }

    /// `(count, text)` describing inaccessible paths.
    #[must_use]
    pub fn permission_summary(&self) -> (usize, String) {
        permission_summary(&self.access_issues)
    }
}

/// Cache figures for the most recent scan plus the store's totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheReport {
    pub enabled: bool,
    pub hits: usize,
    pub misses: usize,
    /// Hits as a percentage of lookups (0-100, not a 0-1 fraction), `0.0`
    /// when nothing was looked up
    pub hit_rate: f64,
    pub total_entries: u64,
    pub total_size: u64,
    pub db_size: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

impl CacheReport {
    #[must_use]
    pub fn db_size_display(&self) -> String {
        ByteSize(self.db_size).to_string()
    }
}

/// Errors that abort a scan before any result is produced.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The root could not be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The configuration was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The cache store could not be opened.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

// ============================================================================
// DuplicateFinder
// ============================================================================

type Indexed = (usize, FileRecord);
type Hashed = (usize, FileRecord, String);

/// Duplicate finder that runs the detection pipeline.
///
/// # Example
///
/// ```no_run
/// use hashdupe::duplicates::{DuplicateFinder, FinderConfig, ScanHooks};
/// use std::path::Path;
///
/// let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(4));
/// let (groups, summary) = finder
///     .find_duplicates(Path::new("/some/path"), &ScanHooks::default())
///     .unwrap();
///
/// println!("Found {} duplicate groups", groups.len());
/// println!("Reclaimable space: {}", summary.reclaimable_display());
/// ```
pub struct DuplicateFinder {
    config: FinderConfig,
    logger: Logger,
    hits: AtomicUsize,
    misses: AtomicUsize,
    scanned: Mutex<Vec<FileRecord>>,
}

impl fmt::Debug for DuplicateFinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicateFinder")
            .field("config", &self.config)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl DuplicateFinder {
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let logger = config.logger.with_target("hashdupe::finder");
        Self {
            config,
            logger,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            scanned: Mutex::new(Vec::new()),
        }
    }

    /// Finder with default settings and no cache.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Scan `root` and return the confirmed duplicate groups.
    ///
    /// Unreadable paths below the root do not fail the scan; they are listed
    /// in [`ScanSummary::access_issues`]. A cancelled scan returns no groups
    /// and sets [`ScanSummary::cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Scan`] if the root is missing, not a
    /// directory, or cannot be listed.
    pub fn find_duplicates(
        &self,
        root: &Path,
        hooks: &ScanHooks,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let started = Instant::now();
        self.reset_counters();

        let walker = Walker::new(root)
            .with_extension_filter(self.config.extension_filter.clone())
            .with_cancel(hooks.cancel.clone())
            .with_logger(self.config.logger.clone());
        let outcome = walker.scan(hooks.scan_progress.clone())?;

        let mut summary = ScanSummary {
            access_issues: outcome.issues,
            ..ScanSummary::default()
        };
        self.remember(&outcome.files);

        if outcome.cancelled {
            self.logger
                .info(format_args!("Scan cancelled during enumeration"));
            summary.total_files = outcome.files.len();
            summary.cancelled = true;
            return Ok(self.finish(Vec::new(), summary, started));
        }

        let groups = self.run_pipeline(outcome.files, hooks, &mut summary);
        Ok(self.finish(groups, summary, started))
    }

    /// Run the pipeline on an already enumerated file list.
    pub fn find_duplicates_in(
        &self,
        files: Vec<FileRecord>,
        hooks: &ScanHooks,
    ) -> (Vec<DuplicateGroup>, ScanSummary) {
        let started = Instant::now();
        self.reset_counters();
        self.remember(&files);

        let mut summary = ScanSummary::default();
        let groups = self.run_pipeline(files, hooks, &mut summary);
        self.finish(groups, summary, started)
    }

    /// Every eligible file found by the last scan, duplicates or not.
    #[must_use]
    pub fn all_scanned_files(&self) -> Vec<FileRecord> {
        self.scanned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Hit/miss counters of the last scan plus the store's totals.
    #[must_use]
    pub fn cache_stats(&self) -> CacheReport {
        let Some(cache) = &self.config.cache else {
            return CacheReport::default();
        };

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64 * 100.0
        };

        let stats = cache.stats().unwrap_or_else(|e| {
            self.logger
                .warn(format_args!("Failed to read cache statistics: {}", e));
            Default::default()
        });

        CacheReport {
            enabled: true,
            hits,
            misses,
            hit_rate,
            total_entries: stats.total_entries,
            total_size: stats.total_size,
            db_size: stats.db_size,
            oldest_entry: stats.oldest_entry,
            newest_entry: stats.newest_entry,
        }
    }

    /// Empty the store and reset the session counters.
    ///
    /// # Errors
    ///
    /// Returns the store's [`CacheError`] if the delete fails.
    pub fn clear_cache(&self) -> Result<(), CacheError> {
        self.reset_counters();
        if let Some(cache) = &self.config.cache {
            cache.clear()?;
        }
        Ok(())
    }

    /// Drop cache entries whose files no longer exist.
    ///
    /// # Errors
    ///
    /// Returns the store's [`CacheError`] if the cleanup fails.
    pub fn cleanup_cache(&self) -> Result<usize, CacheError> {
        match &self.config.cache {
            Some(cache) => cache.cleanup_invalid_paths(None),
            None => Ok(0),
        }
    }

    /// Give back the configuration, e.g. to close the cache.
    #[must_use]
    pub fn into_config(self) -> FinderConfig {
        self.config
    }

    fn reset_counters(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    fn remember(&self, files: &[FileRecord]) {
        let mut scanned = self.scanned.lock().unwrap_or_else(|e| e.into_inner());
        scanned.clear();
        scanned.extend_from_slice(files);
    }

    fn workers_for(&self, strategy: Strategy) -> Workers {
        let pooled = if self.config.cpu_pool {
            Workers::Cpu
        } else {
            Workers::Io(self.config.io_threads)
        };
        match strategy {
            Strategy::Serial => Workers::Serial,
            Strategy::Parallel => pooled,
            Strategy::MultiStage if self.config.parallel => pooled,
            Strategy::MultiStage => Workers::Serial,
        }
    }

    fn run_pipeline(
        &self,
        files: Vec<FileRecord>,
        hooks: &ScanHooks,
        summary: &mut ScanSummary,
    ) -> Vec<DuplicateGroup> {
        let (size_groups, stats) = group_by_size(files);
        summary.total_files = stats.total_files;
        summary.total_size = stats.total_size;
        summary.candidates = stats.potential_duplicates;

        if hooks.is_cancelled() {
            summary.cancelled = true;
            return Vec::new();
        }

        let strategy =
            Strategy::select(&size_groups, self.config.multi_stage, self.config.parallel);
        summary.strategy = Some(strategy);
        self.logger.info(format_args!(
            "{} of {} files share a size ({} groups, {:.1}% eliminated), hashing {}",
            stats.potential_duplicates,
            stats.total_files,
            stats.duplicate_groups,
            stats.elimination_rate(),
            strategy
        ));

        let candidates: Vec<Indexed> = size_groups
            .into_iter()
            .flat_map(|g| g.files)
            .enumerate()
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        // Multi-stage credits half a candidate for its partial hash and half
        // once it is eliminated or fully hashed.
        let sink = hooks.hash_progress.clone();
        let tracker = if strategy == Strategy::MultiStage {
            ProgressTracker::with_units(sink, candidates.len(), 2, MULTI_STAGE_PROGRESS_DIVISIONS)
        } else {
            ProgressTracker::new(sink, candidates.len(), HASH_PROGRESS_DIVISIONS)
        };
        let workers = self.workers_for(strategy);

        let (mut hashed, misses) = self.split_cached(candidates);
        tracker.start(hashed.len());

        let to_full_hash = if strategy == Strategy::MultiStage {
            let survivors = self.partial_stage(misses, workers, &tracker, hooks, summary);
            if hooks.is_cancelled() {
                summary.cancelled = true;
                return Vec::new();
            }
            survivors
        } else {
            misses
        };

        let mut writes = Vec::new();
        let computed =
            self.full_stage(to_full_hash, workers, &tracker, hooks, summary, &mut writes);
        self.commit(&writes);

        if hooks.is_cancelled() {
            self.logger.info(format_args!(
                "Hashing cancelled after {} full hashes",
                summary.full_hashes
            ));
            summary.cancelled = true;
            return Vec::new();
        }
        tracker.finish();

        hashed.extend(computed);
        hashed.sort_by_key(|(idx, _, _)| *idx);
        collate(hashed.into_iter().map(|(_, file, hash)| (file, hash)))
    }

    /// Split candidates into cache hits and files that still need hashing.
    fn split_cached(&self, candidates: Vec<Indexed>) -> (Vec<Hashed>, Vec<Indexed>) {
        let Some(cache) = &self.config.cache else {
            return (Vec::new(), candidates);
        };

        let found = cache
            .get_batch(candidates.iter().map(|(_, f)| f))
            .unwrap_or_else(|e| {
                self.logger
                    .warn(format_args!("Cache lookup failed, hashing everything: {}", e));
                HashMap::new()
            });

        let mut hits = Vec::with_capacity(found.len());
        let mut misses = Vec::with_capacity(candidates.len().saturating_sub(found.len()));
        for (idx, file) in candidates {
            match found.get(&file.path) {
                Some(hash) => {
                    self.logger
                        .trace(format_args!("Cache hit: {}", file.path.display()));
                    let hash = hash.clone();
                    hits.push((idx, file, hash));
                }
                None => misses.push((idx, file)),
            }
        }

        self.hits.fetch_add(hits.len(), Ordering::Relaxed);
        self.misses.fetch_add(misses.len(), Ordering::Relaxed);
        self.logger.debug(format_args!(
            "Cache: {} hits, {} misses",
            hits.len(),
            misses.len()
        ));
        (hits, misses)
    }

    /// Partial-hash `files` and keep those whose `(size, partial)` collides.
    ///
    /// Each file advances the tracker by one unit when its partial hash is
    /// done and by one more when it is dropped here.
    fn partial_stage(
        &self,
        files: Vec<Indexed>,
        workers: Workers,
        tracker: &ProgressTracker,
        hooks: &ScanHooks,
        summary: &mut ScanSummary,
    ) -> Vec<Indexed> {
        let hasher = &self.config.hasher;
        let results = workers.run(files, &self.logger, |(idx, file): Indexed| {
            if hooks.is_cancelled() {
                return (idx, file, None);
            }
            let partial = hasher.try_partial_hash(&file.path, file.size);
            tracker.advance(1);
            (idx, file, Some(partial))
        });

        let mut index: HashMap<(u64, String), usize> = HashMap::new();
        let mut buckets: Vec<Vec<Indexed>> = Vec::new();
        for (idx, file, result) in results {
            match result {
                None => {}
                Some(Ok(partial)) => {
                    summary.partial_hashes += 1;
                    let slot = *index.entry((file.size, partial)).or_insert_with(|| {
                        buckets.push(Vec::new());
                        buckets.len() - 1
                    });
                    buckets[slot].push((idx, file));
                }
                Some(Err(e)) => {
                    self.record_failure(&e, summary);
                    tracker.advance(1);
                }
            }
        }

        let mut survivors = Vec::new();
        let mut eliminated = 0;
        for bucket in buckets {
            if bucket.len() > 1 {
                survivors.extend(bucket);
            } else {
                eliminated += bucket.len();
            }
        }
        tracker.advance(eliminated);

        self.logger.info(format_args!(
            "Partial hashing: {} computed, {} eliminated, {} need a full hash",
            summary.partial_hashes,
            eliminated,
            survivors.len()
        ));
        survivors
    }

    /// Full-hash `files`, queueing a cache write for each success.
    fn full_stage(
        &self,
        files: Vec<Indexed>,
        workers: Workers,
        tracker: &ProgressTracker,
        hooks: &ScanHooks,
        summary: &mut ScanSummary,
        writes: &mut Vec<CacheEntry>,
    ) -> Vec<Hashed> {
        if files.is_empty() {
            return Vec::new();
        }

        let hasher = &self.config.hasher;
        let results = workers.run(files, &self.logger, |(idx, file): Indexed| {
            if hooks.is_cancelled() {
                return (idx, file, None);
            }
            let hash = hasher.try_full_hash(&file.path);
            tracker.advance(1);
            (idx, file, Some(hash))
        });

        let caching = self.config.cache.is_some();
        let mut hashed = Vec::with_capacity(results.len());
        for (idx, file, result) in results {
            match result {
                None => {}
                Some(Ok(hash)) => {
                    summary.full_hashes += 1;
                    if caching {
                        writes.push(CacheEntry::from_record(&file, hash.clone()));
                    }
                    hashed.push((idx, file, hash));
                }
                Some(Err(e)) => self.record_failure(&e, summary),
            }
        }

        self.logger.info(format_args!(
            "Full hashing: {} computed, {} failed",
            summary.full_hashes, summary.hash_failures
        ));
        hashed
    }

    fn record_failure(&self, error: &HashError, summary: &mut ScanSummary) {
        summary.hash_failures += 1;
        self.logger.warn(format_args!("Skipping file: {}", error));
    }

    fn commit(&self, writes: &[CacheEntry]) {
        let Some(cache) = &self.config.cache else {
            return;
        };
        match cache.set_batch(writes) {
            Ok(0) => {}
            Ok(written) => self
                .logger
                .debug(format_args!("Stored {} hashes in the cache", written)),
            Err(e) => self.logger.warn(format_args!(
                "Failed to store {} hashes in the cache: {}",
                writes.len(),
                e
            )),
        }
    }

    fn finish(
        &self,
        groups: Vec<DuplicateGroup>,
        mut summary: ScanSummary,
        started: Instant,
    ) -> (Vec<DuplicateGroup>, ScanSummary) {
        summary.cache_hits = self.hits.load(Ordering::Relaxed);
        summary.cache_misses = self.misses.load(Ordering::Relaxed);
        summary.duplicate_groups = groups.len();
        summary.duplicate_files = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        summary.reclaimable_space = wasted_space(&groups);
        summary.duration = started.elapsed();

        if !summary.cancelled {
            self.logger.info(format_args!(
                "Scan complete: {} groups, {} duplicates, {} reclaimable in {:.2?}",
                summary.duplicate_groups,
                summary.duplicate_files,
                summary.reclaimable_display(),
                summary.duration
            ));
        }
        (groups, summary)
    }
}
