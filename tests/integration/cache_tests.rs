use filetime::{set_file_mtime, FileTime};
use hashdupe::cache::HashCache;
use hashdupe::duplicates::{DuplicateFinder, FinderConfig, ScanHooks};
use std::fs::{self, File};
use std::io::Write;
use std::sync::Arc;
use tempfile::tempdir;

fn write_file(path: &std::path::Path, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

#[test]
fn test_cache_initial_scan_and_rescan() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("cache.db");

    write_file(&dir.path().join("file1.txt"), b"duplicate content");
    write_file(&dir.path().join("file2.txt"), b"duplicate content");

    let cache = Arc::new(HashCache::new(&cache_path).unwrap());
    let finder = DuplicateFinder::new(FinderConfig::default().with_cache(cache.clone()));

    let (groups, summary) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(summary.cache_hits, 0);
    assert_eq!(summary.cache_misses, 2);
    assert_eq!(summary.full_hashes, 2);

    let (groups2, summary2) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();
    assert_eq!(groups, groups2);
    assert_eq!(summary2.cache_hits, 2);
    assert_eq!(summary2.cache_misses, 0);
    assert_eq!(summary2.full_hashes, 0);
}

#[test]
fn test_cache_survives_reopen() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("cache.db");

    write_file(&dir.path().join("a.bin"), b"persisted");
    write_file(&dir.path().join("b.bin"), b"persisted");

    {
        let cache = Arc::new(HashCache::new(&cache_path).unwrap());
        let finder = DuplicateFinder::new(FinderConfig::default().with_cache(cache));
        finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();
        let cache = finder.into_config().cache.unwrap();
        Arc::try_unwrap(cache).unwrap().close().unwrap();
    }

    let cache = Arc::new(HashCache::new(&cache_path).unwrap());
    let finder = DuplicateFinder::new(FinderConfig::default().with_cache(cache));
    let (groups, summary) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(summary.cache_hits, 2);
    assert!((finder.cache_stats().hit_rate - 100.0).abs() < f64::EPSILON);
}

#[test]
fn test_cache_invalidation_on_change() {
    let dir = tempdir().unwrap();
    let file1 = dir.path().join("file1.txt");
    let file2 = dir.path().join("file2.txt");

    write_file(&file1, b"identical content 21b");
    write_file(&file2, b"identical content 21b");
    let fixed = FileTime::from_unix_time(1_600_000_000, 0);
    set_file_mtime(&file1, fixed).unwrap();
    set_file_mtime(&file2, fixed).unwrap();

    let cache = Arc::new(HashCache::open_in_memory().unwrap());
    let finder = DuplicateFinder::new(FinderConfig::default().with_cache(cache.clone()));
    let (groups, _) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();
    assert_eq!(groups.len(), 1);

    // Same size, new content and mtime.
    write_file(&file1, b"different content 21b");
    set_file_mtime(&file1, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let (groups, summary) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();
    assert!(groups.is_empty());
    assert_eq!(summary.cache_hits, 1);
    assert_eq!(summary.cache_misses, 1);
    assert_eq!(summary.full_hashes, 1);
}

#[test]
fn test_mtime_only_change_is_a_miss() {
    let dir = tempdir().unwrap();
    let file1 = dir.path().join("a");
    write_file(&file1, b"stable");
    write_file(&dir.path().join("b"), b"stable");

    let cache = Arc::new(HashCache::open_in_memory().unwrap());
    let finder = DuplicateFinder::new(FinderConfig::default().with_cache(cache));
    finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();

    set_file_mtime(&file1, FileTime::from_unix_time(1_234_567_890, 500_000_000)).unwrap();
    let (groups, summary) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(summary.cache_hits, 1);
    assert_eq!(summary.cache_misses, 1);
}

#[test]
fn test_cleanup_cache_drops_deleted_files() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("keep1"), b"data");
    write_file(&dir.path().join("keep2"), b"data");
    write_file(&dir.path().join("gone1"), b"other!");
    write_file(&dir.path().join("gone2"), b"other!");

    let cache = Arc::new(HashCache::open_in_memory().unwrap());
    let finder = DuplicateFinder::new(FinderConfig::default().with_cache(cache.clone()));
    finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();
    assert_eq!(cache.stats().unwrap().total_entries, 4);

    fs::remove_file(dir.path().join("gone1")).unwrap();
    fs::remove_file(dir.path().join("gone2")).unwrap();

    assert_eq!(finder.cleanup_cache().unwrap(), 2);
    assert_eq!(cache.stats().unwrap().total_entries, 2);
}

#[test]
fn test_disabled_cache_reports_nothing() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a"), b"x1");
    write_file(&dir.path().join("b"), b"x1");

    let finder = DuplicateFinder::with_defaults();
    let (_, summary) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();

    assert_eq!(summary.cache_hits, 0);
    assert_eq!(summary.cache_misses, 0);
    assert!(!finder.cache_stats().enabled);
    assert_eq!(finder.cleanup_cache().unwrap(), 0);
    assert!(finder.clear_cache().is_ok());
}
