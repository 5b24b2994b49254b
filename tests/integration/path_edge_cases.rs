use hashdupe::cache::HashCache;
use hashdupe::duplicates::{DuplicateFinder, FinderConfig, ScanHooks};
use std::fs::{self, File};
use std::io::Write;
use std::sync::Arc;
use tempfile::tempdir;
use unicode_normalization::UnicodeNormalization;

fn write_file(path: &std::path::Path, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

#[test]
fn test_paths_with_quotes_and_newlines() {
    if cfg!(windows) {
        return;
    }
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("file_with_\"quote\".txt"), b"content");
    write_file(&dir.path().join("file_with\nnewline.txt"), b"content");

    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &ScanHooks::default())
        .unwrap();

    assert_eq!(groups.len(), 1);
    let names: Vec<String> = groups[0]
        .files
        .iter()
        .map(|f| f.path.to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.contains('"')));
    assert!(names.iter().any(|n| n.contains('\n')));
}

#[test]
fn test_extremely_long_paths() {
    let dir = tempdir().unwrap();
    let mut current = dir.path().to_path_buf();
    for i in 0..6 {
        current = current.join(format!("{}_{}", i, "a".repeat(50)));
        if let Err(e) = fs::create_dir(&current) {
            eprintln!("Skipping long path test: {}", e);
            return;
        }
    }
    let created = File::create(current.join("file.txt")).and_then(|mut f| f.write_all(b"content"));
    if let Err(e) = created {
        eprintln!("Skipping long path test: {}", e);
        return;
    }
    write_file(&dir.path().join("duplicate.txt"), b"content");

    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &ScanHooks::default())
        .unwrap();
    assert_eq!(groups.len(), 1);
}

#[test]
fn test_nfd_named_file_is_hashed_and_cached() {
    let dir = tempdir().unwrap();
    let nfd = "cafe\u{0301}.txt";
    assert_ne!(nfd, nfd.nfc().collect::<String>());

    write_file(&dir.path().join(nfd), b"accented");
    write_file(&dir.path().join("plain.txt"), b"accented");

    let cache = Arc::new(HashCache::open_in_memory().unwrap());
    let finder = DuplicateFinder::new(FinderConfig::default().with_cache(cache));

    let (groups, summary) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(summary.hash_failures, 0);

    let (_, rerun) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();
    assert_eq!(rerun.cache_hits, 2);
}

#[test]
fn test_unicode_extension_filter() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("photo.JPG"), b"pixels");
    write_file(&dir.path().join("copy.jpg"), b"pixels");
    write_file(&dir.path().join("notes.txt"), b"pixels");

    let filter = hashdupe::scanner::ExtensionFilter::new(&["jpg"]).unwrap();
    let finder = DuplicateFinder::new(FinderConfig::default().with_extension_filter(Some(filter)));
    let (groups, summary) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}
