use hashdupe::cache::{CacheEntry, CacheError, HashCache};
use hashdupe::duplicates::{DuplicateFinder, FinderConfig, ScanHooks};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::{tempdir, NamedTempFile};

#[test]
fn test_open_corrupted_database() {
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(temp_file.path(), b"not a sqlite database, just some bytes").unwrap();

    let result = HashCache::new(temp_file.path());
    assert!(matches!(result, Err(CacheError::Open { .. })));
}

#[test]
fn test_recovery_after_removing_corrupted_file() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();
    fs::write(path, b"corrupted garbage").unwrap();
    assert!(HashCache::new(path).is_err());

    fs::remove_file(path).unwrap();
    let cache = HashCache::new(path).expect("fresh store after removing the corrupted file");
    assert_eq!(cache.stats().unwrap().total_entries, 0);
}

#[test]
fn test_old_schema_is_rebuilt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE hash_cache (path TEXT PRIMARY KEY, digest BLOB);
             INSERT INTO hash_cache VALUES ('/old', x'00');",
        )
        .unwrap();
    }

    let cache = HashCache::new(&path).unwrap();
    assert_eq!(cache.stats().unwrap().total_entries, 0);

    cache
        .set(&CacheEntry::new(PathBuf::from("/new"), 3, 1.5, "abc".into()))
        .unwrap();
    assert_eq!(
        cache.get(&PathBuf::from("/new"), 3, 1.5).unwrap(),
        Some("abc".to_string())
    );
}

#[test]
fn test_missing_parent_directory_is_created() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a").join("b").join("cache.db");

    let cache = HashCache::new(&path).unwrap();
    assert_eq!(cache.path(), Some(path.as_path()));
    assert!(path.exists());
}

#[test]
fn test_scan_after_cache_cleared_recomputes() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"repeat").unwrap();
    fs::write(dir.path().join("b"), b"repeat").unwrap();

    let cache = Arc::new(HashCache::open_in_memory().unwrap());
    let finder = DuplicateFinder::new(FinderConfig::default().with_cache(cache.clone()));
    finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();

    finder.clear_cache().unwrap();
    assert_eq!(cache.stats().unwrap().total_entries, 0);

    let (groups, summary) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(summary.full_hashes, 2);
    assert_eq!(cache.stats().unwrap().total_entries, 2);
}
