//! Persistent hash cache.
//!
//! Full-content hashes are stored in SQLite keyed by path, together with the
//! size and modification time the file had when it was hashed. A later scan
//! reuses the hash only when both still match exactly; anything else is a
//! miss, and the fresh hash replaces the stale row.
//!
//! * [`database`]: the SQLite store, schema and queries
//! * [`entry`]: row and statistics types

pub mod database;
pub mod entry;

pub use database::{CacheError, CacheResult, HashCache};
pub use entry::{CacheEntry, CacheStats};
