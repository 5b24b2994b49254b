//! Content hashing.
//!
//! [`Hasher`] computes two kinds of digests:
//!
//! - a **full hash** over every byte of the file, streamed in
//!   [`CHUNK_SIZE`] chunks, and
//! - a **partial hash** over fixed sample windows (start, middle and end for
//!   larger files), used only as a cheap prefilter before full hashing.
//!
//! Digests are lowercase hex strings so they can be stored in the cache and
//! compared across algorithms without ambiguity.
//!
//! # Memory-mapped reads
//!
//! When acceleration is enabled, files at or above the mmap threshold are
//! memory-mapped instead of streamed (BLAKE3 additionally hashes the map on
//! the rayon pool). Whether acceleration is on is decided once, up front, via
//! [`Acceleration::resolve`]; both paths produce identical digests.
//!
//! ```no_run
//! use hashdupe::scanner::hasher::{HashAlgorithm, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new().with_algorithm(HashAlgorithm::Blake3);
//! if let Some(hex) = hasher.full_hash(Path::new("movie.mkv")) {
//!     println!("{hex}");
//! }
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use sha2::Digest as _;

use super::HashError;
use crate::error::ValidationError;
use crate::logging::Logger;

/// Read buffer size for streaming hashes (32 KiB).
pub const CHUNK_SIZE: usize = 8192 * 4;

/// Size of each partial-hash sample window (1 MiB).
pub const PARTIAL_WINDOW: u64 = 1024 * 1024;

/// Files larger than this get middle and end samples in their partial hash.
pub const MULTI_WINDOW_THRESHOLD: u64 = 3 * PARTIAL_WINDOW;

/// Default size at which the memory-mapped path kicks in (16 MiB).
pub const DEFAULT_MMAP_THRESHOLD: u64 = 16 * 1024 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
    Blake3,
}

impl HashAlgorithm {
    /// Every accepted algorithm, in display order.
    pub const ALL: [HashAlgorithm; 4] = [Self::Sha256, Self::Sha384, Self::Sha512, Self::Blake3];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Blake3 => "blake3",
        }
    }

    /// Comma-separated list of accepted names.
    #[must_use]
    pub fn supported_names() -> String {
        Self::ALL
            .iter()
            .map(|a| a.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn start(self) -> DigestState {
        match self {
            Self::Sha256 => DigestState::Sha256(sha2::Sha256::new()),
            Self::Sha384 => DigestState::Sha384(sha2::Sha384::new()),
            Self::Sha512 => DigestState::Sha512(sha2::Sha512::new()),
            Self::Blake3 => DigestState::Blake3(Box::new(blake3::Hasher::new())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.name() == wanted)
            .ok_or_else(|| ValidationError::UnsupportedAlgorithm {
                name: s.to_string(),
                supported: Self::supported_names(),
            })
    }
}

enum DigestState {
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl DigestState {
    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(bytes),
            Self::Sha384(h) => h.update(bytes),
            Self::Sha512(h) => h.update(bytes),
            Self::Blake3(h) => {
                h.update(bytes);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => format!("{:x}", h.finalize()),
            Self::Sha384(h) => format!("{:x}", h.finalize()),
            Self::Sha512(h) => format!("{:x}", h.finalize()),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Whether the memory-mapped read path is available for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acceleration {
    enabled: bool,
}

impl Acceleration {
    /// Resolve the capability once: an explicit request wins, otherwise it
    /// is enabled on 64-bit targets where large maps fit the address space.
    #[must_use]
    pub fn resolve(requested: Option<bool>) -> Self {
        Self {
            enabled: requested.unwrap_or(cfg!(target_pointer_width = "64")),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    #[must_use]
    pub fn is_enabled(self) -> bool {
        self.enabled
    }
}

/// File hasher. Cheap to clone and safe to share across worker threads.
#[derive(Debug, Clone)]
pub struct Hasher {
    algorithm: HashAlgorithm,
    use_mmap: bool,
    mmap_threshold: u64,
    logger: Logger,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// SHA-256, streaming reads only.
    #[must_use]
    pub fn new() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            use_mmap: false,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            logger: Logger::discard(),
        }
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Turn the memory-mapped path on or off directly.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Apply a resolved [`Acceleration`] decision.
    #[must_use]
    pub fn with_acceleration(self, acceleration: Acceleration) -> Self {
        self.with_mmap(acceleration.is_enabled())
    }

    #[must_use]
    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger.with_target("hashdupe::hasher");
        self
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn uses_mmap(&self) -> bool {
        self.use_mmap
    }

    /// Digest of an in-memory buffer.
    #[must_use]
    pub fn hash_bytes(&self, bytes: &[u8]) -> String {
        let mut state = self.algorithm.start();
        state.update(bytes);
        state.finalize_hex()
    }

    /// Full-content digest, or `None` if the file could not be read.
    #[must_use]
    pub fn full_hash(&self, path: &Path) -> Option<String> {
        match self.try_full_hash(path) {
            Ok(hex) => Some(hex),
            Err(e) => {
                self.logger.debug(format_args!("Full hash failed: {e}"));
                None
            }
        }
    }

    /// Full-content digest.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn try_full_hash(&self, path: &Path) -> Result<String, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();

        if self.use_mmap && len > 0 && len >= self.mmap_threshold {
            return self.mmap_hash(path, &file);
        }

        let mut state = self.algorithm.start();
        stream_into(&mut state, file).map_err(|e| HashError::from_io(path, e))?;
        Ok(state.finalize_hex())
    }

    /// Sampled digest, or `None` if the file could not be read.
    #[must_use]
    pub fn partial_hash(&self, path: &Path, size: u64) -> Option<String> {
        match self.try_partial_hash(path, size) {
            Ok(hex) => Some(hex),
            Err(e) => {
                self.logger.debug(format_args!("Partial hash failed: {e}"));
                None
            }
        }
    }

    /// Sampled digest over the first [`PARTIAL_WINDOW`] bytes, plus the
    /// windows at `size / 2` and at the last [`PARTIAL_WINDOW`] bytes when
    /// `size` exceeds [`MULTI_WINDOW_THRESHOLD`].
    ///
    /// Equal partial hashes do not imply equal content.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened, seeked or read.
    pub fn try_partial_hash(&self, path: &Path, size: u64) -> Result<String, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut state = self.algorithm.start();
        let mut buf = Vec::with_capacity(PARTIAL_WINDOW as usize);

        for offset in sample_offsets(size) {
            buf.clear();
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| HashError::from_io(path, e))?;
            (&mut file)
                .take(PARTIAL_WINDOW)
                .read_to_end(&mut buf)
                .map_err(|e| HashError::from_io(path, e))?;
            state.update(&buf);
        }

        Ok(state.finalize_hex())
    }

    fn mmap_hash(&self, path: &Path, file: &File) -> Result<String, HashError> {
        if self.algorithm == HashAlgorithm::Blake3 {
            let mut hasher = blake3::Hasher::new();
            hasher
                .update_mmap_rayon(path)
                .map_err(|e| HashError::from_io(path, e))?;
            return Ok(hasher.finalize().to_hex().to_string());
        }

        // SAFETY: the map is read-only and dropped before returning. A file
        // truncated underneath us by another process can still fault.
        let map = unsafe { Mmap::map(file) }.map_err(|e| HashError::from_io(path, e))?;
        let mut state = self.algorithm.start();
        for chunk in map.chunks(CHUNK_SIZE * 32) {
            state.update(chunk);
        }
        Ok(state.finalize_hex())
    }
}

fn stream_into(state: &mut DigestState, mut reader: impl Read) -> io::Result<()> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => state.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Start offsets of the partial-hash windows for a file of `size` bytes.
#[must_use]
pub fn sample_offsets(size: u64) -> Vec<u64> {
    if size > MULTI_WINDOW_THRESHOLD {
        vec![0, size / 2, size - PARTIAL_WINDOW]
    } else {
        vec![0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Digest;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_sha256_known_vector() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "abc.txt", b"abc");
        let hasher = Hasher::new();

        assert_eq!(
            hasher.full_hash(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_every_algorithm_matches_reference() {
        let dir = TempDir::new().unwrap();
        let content = b"duplicate detection";
        let path = write_file(&dir, "f.bin", content);

        let expected = [
            (HashAlgorithm::Sha256, format!("{:x}", sha2::Sha256::digest(content))),
            (HashAlgorithm::Sha384, format!("{:x}", sha2::Sha384::digest(content))),
            (HashAlgorithm::Sha512, format!("{:x}", sha2::Sha512::digest(content))),
            (HashAlgorithm::Blake3, blake3::hash(content).to_hex().to_string()),
        ];
        for (algorithm, hex) in expected {
            let hasher = Hasher::new().with_algorithm(algorithm);
            assert_eq!(hasher.full_hash(&path).unwrap(), hex, "{algorithm}");
            assert_eq!(hasher.hash_bytes(content), hex);
        }
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!(" BLAKE3 ".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Blake3);
        let err = "md5".parse::<HashAlgorithm>().unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedAlgorithm { .. }));
        assert!(err.to_string().contains("sha512"));
    }

    #[test]
    fn test_multi_chunk_file() {
        let dir = TempDir::new().unwrap();
        let content: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let path = write_file(&dir, "big.bin", &content);
        let hasher = Hasher::new();

        assert_eq!(hasher.full_hash(&path).unwrap(), hasher.hash_bytes(&content));
    }

    #[test]
    fn test_missing_file() {
        let hasher = Hasher::new();
        let missing = Path::new("/definitely/not/here.bin");

        assert!(hasher.full_hash(missing).is_none());
        assert!(matches!(
            hasher.try_full_hash(missing),
            Err(HashError::NotFound(_))
        ));
        assert!(hasher.partial_hash(missing, 10).is_none());
    }

    #[test]
    fn test_sample_offsets() {
        assert_eq!(sample_offsets(10), vec![0]);
        assert_eq!(sample_offsets(MULTI_WINDOW_THRESHOLD), vec![0]);
        let size = 4 * PARTIAL_WINDOW;
        assert_eq!(
            sample_offsets(size),
            vec![0, 2 * PARTIAL_WINDOW, 3 * PARTIAL_WINDOW]
        );
    }

    #[test]
    fn test_partial_hash_small_file_covers_everything() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "small.txt", b"hello world");
        let hasher = Hasher::new();

        assert_eq!(
            hasher.partial_hash(&path, 11).unwrap(),
            hasher.full_hash(&path).unwrap()
        );
    }

    #[test]
    fn test_partial_hash_sees_middle_window() {
        let dir = TempDir::new().unwrap();
        let size = 4 * PARTIAL_WINDOW as usize;
        let a = vec![0u8; size];
        let mut b = a.clone();
        b[2 * PARTIAL_WINDOW as usize + 10] = 1;
        let pa = write_file(&dir, "a.bin", &a);
        let pb = write_file(&dir, "b.bin", &b);
        let hasher = Hasher::new();

        assert_ne!(
            hasher.partial_hash(&pa, size as u64),
            hasher.partial_hash(&pb, size as u64)
        );
    }

    #[test]
    fn test_partial_hash_is_only_a_prefilter() {
        let dir = TempDir::new().unwrap();
        let size = 4 * PARTIAL_WINDOW as usize;
        let a = vec![0u8; size];
        let mut b = a.clone();
        // Between the first and middle windows.
        b[PARTIAL_WINDOW as usize + 500] = 1;
        let pa = write_file(&dir, "a.bin", &a);
        let pb = write_file(&dir, "b.bin", &b);
        let hasher = Hasher::new();

        assert_eq!(
            hasher.partial_hash(&pa, size as u64),
            hasher.partial_hash(&pb, size as u64)
        );
        assert_ne!(hasher.full_hash(&pa), hasher.full_hash(&pb));
    }

    #[test]
    fn test_acceleration_resolve() {
        assert!(Acceleration::resolve(Some(true)).is_enabled());
        assert!(!Acceleration::resolve(Some(false)).is_enabled());
        assert!(!Acceleration::disabled().is_enabled());
        let hasher = Hasher::new().with_acceleration(Acceleration::resolve(Some(true)));
        assert!(hasher.uses_mmap());
    }
}
