//! Unicode-aware path helpers.
//!
//! macOS hands out file names in NFD while most other systems use NFC, so the
//! same visible name can have two byte representations. Files are always
//! opened by the path the OS returned; these helpers only produce comparison
//! keys (deny-list names, extensions, cache bookkeeping).
//!
//! ```
//! use hashdupe::scanner::path_utils::{name_key, paths_equal};
//! use std::ffi::OsStr;
//! use std::path::Path;
//!
//! assert_eq!(name_key(OsStr::new("cafe\u{0301}.txt")), "café.txt");
//! assert!(paths_equal(Path::new("café.txt"), Path::new("cafe\u{0301}.txt")));
//! ```

use std::ffi::OsStr;
use std::path::Path;

use unicode_normalization::{is_nfc, UnicodeNormalization};

/// NFC form of a string.
#[must_use]
pub fn normalize_str(s: &str) -> String {
    if is_nfc(s) {
        s.to_string()
    } else {
        s.nfc().collect()
    }
}

/// NFC comparison key for a single path component.
#[must_use]
pub fn name_key(name: &OsStr) -> String {
    normalize_str(&name.to_string_lossy())
}

/// NFC comparison key for a whole path.
#[must_use]
pub fn path_key(path: &Path) -> String {
    normalize_str(&path.to_string_lossy())
}

/// Whether two paths name the same file modulo Unicode normalization.
#[must_use]
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    path_key(a) == path_key(b)
}

/// Lowercased, dot-prefixed extension of `path` (`"photo.JPG"` gives `".jpg"`).
#[must_use]
pub fn extension_key(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", name_key(ext).to_lowercase()))
}
