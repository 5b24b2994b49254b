use hashdupe::duplicates::{wasted_space, DuplicateFinder, FinderConfig, ScanHooks, Strategy};
use hashdupe::progress::CancelCheck;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap().write_all(content).unwrap();
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let finder = DuplicateFinder::with_defaults();

    let (groups, summary) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.total_files, 0);
    assert_eq!(summary.candidates, 0);
    assert_eq!(summary.duplicate_groups, 0);
    assert!(finder.all_scanned_files().is_empty());
}

#[test]
fn test_scan_unique_files() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a.txt"), b"content a");
    write_file(&dir.path().join("b.txt"), b"content bb");
    write_file(&dir.path().join("c.txt"), b"content ccc");

    let finder = DuplicateFinder::with_defaults();
    let (groups, summary) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.candidates, 0);
    assert_eq!(summary.full_hashes, 0);
    assert_eq!(finder.all_scanned_files().len(), 3);
}

#[test]
fn test_scan_nested_directories() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("top.txt"), b"nested dup");
    write_file(&dir.path().join("one/two/deep.txt"), b"nested dup");
    write_file(&dir.path().join("one/other.txt"), b"nested dup");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &ScanHooks::default())
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 3);
    assert_eq!(groups[0].total_size, 30);
    assert_eq!(summary.duplicate_files, 2);
    assert_eq!(summary.reclaimable_space, 20);
    assert_eq!(wasted_space(&groups), 20);
}

#[test]
fn test_scan_multiple_groups() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a1"), b"aaaa");
    write_file(&dir.path().join("a2"), b"aaaa");
    write_file(&dir.path().join("b1"), b"bbbbbbbb");
    write_file(&dir.path().join("b2"), b"bbbbbbbb");
    write_file(&dir.path().join("b3"), b"bbbbbbbb");
    write_file(&dir.path().join("c1"), b"cccc");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &ScanHooks::default())
        .unwrap();

    assert_eq!(summary.strategy, Some(Strategy::Parallel));
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].total_size, 24);
    assert_eq!(groups[1].total_size, 8);
    for group in &groups {
        let first = &group.files[0];
        assert!(group.files.iter().all(|f| f.size == first.size));
    }
}

#[test]
fn test_deny_listed_entries_are_ignored() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("real1"), b"meta");
    write_file(&dir.path().join("real2"), b"meta");
    write_file(&dir.path().join(".DS_Store"), b"meta");
    write_file(&dir.path().join("._real1"), b"meta");
    write_file(&dir.path().join("Thing.app/inner"), b"meta");
    write_file(&dir.path().join("disk.iso"), b"meta");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &ScanHooks::default())
        .unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(groups.len(), 1);
}

#[test]
fn test_every_algorithm_finds_the_same_groups() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("x1"), b"algorithm check");
    write_file(&dir.path().join("x2"), b"algorithm check");
    write_file(&dir.path().join("y"), b"algorithm CHECK");

    for algorithm in hashdupe::scanner::HashAlgorithm::ALL {
        let hasher = hashdupe::scanner::Hasher::new().with_algorithm(algorithm);
        let finder = DuplicateFinder::new(FinderConfig::default().with_hasher(hasher));
        let (groups, _) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();
        assert_eq!(groups.len(), 1, "{algorithm}");
        assert_eq!(groups[0].len(), 2, "{algorithm}");
    }
}

#[test]
fn test_scan_progress_reaches_total() {
    let dir = tempdir().unwrap();
    for i in 0..45 {
        write_file(&dir.path().join(format!("f{i}")), format!("{i:03}").as_bytes());
    }

    let scan_reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&scan_reports);
    let hooks = ScanHooks::new().with_scan_progress(Arc::new(move |p: usize, t: usize| {
        sink.lock().unwrap().push((p, t));
    }));
    DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &hooks)
        .unwrap();

    let reports = scan_reports.lock().unwrap();
    assert_eq!(reports.first(), Some(&(0, 45)));
    assert_eq!(reports.last(), Some(&(45, 45)));
    assert!(reports.len() <= 25);
    assert!(reports.windows(2).all(|w| w[0].0 < w[1].0));
}

struct CancelAfter {
    polls: AtomicUsize,
    limit: usize,
}

impl CancelCheck for CancelAfter {
    fn is_cancelled(&self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst) >= self.limit
    }
}

#[test]
fn test_cancellation_during_enumeration_returns_no_groups() {
    let dir = tempdir().unwrap();
    for i in 0..20 {
        write_file(&dir.path().join(format!("dup{i}")), b"same bytes");
    }

    let hooks = ScanHooks::new().with_cancel(Arc::new(CancelAfter {
        polls: AtomicUsize::new(0),
        limit: 3,
    }));
    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &hooks)
        .unwrap();

    assert!(groups.is_empty());
    assert!(summary.cancelled);
}

#[test]
fn test_finder_is_reusable_after_cancellation() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a"), b"again");
    write_file(&dir.path().join("b"), b"again");

    let finder = DuplicateFinder::with_defaults();
    let cancelled = ScanHooks::new().with_cancel(Arc::new(AtomicBool::new(true)));
    let (groups, summary) = finder.find_duplicates(dir.path(), &cancelled).unwrap();
    assert!(groups.is_empty());
    assert!(summary.cancelled);

    let (groups, summary) = finder.find_duplicates(dir.path(), &ScanHooks::default()).unwrap();
    assert_eq!(groups.len(), 1);
    assert!(!summary.cancelled);
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_reported_not_fatal() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a"), b"visible");
    write_file(&dir.path().join("b"), b"visible");
    let locked = dir.path().join("locked");
    write_file(&locked.join("hidden"), b"visible");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores permission bits.
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &ScanHooks::default())
        .unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(summary.access_issues.len(), 1);
    let (count, text) = summary.permission_summary();
    assert_eq!(count, 1);
    assert!(text.contains("skipped 1 directory"));
}
