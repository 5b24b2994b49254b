//! SQLite-backed hash cache.
//!
//! One row per path in `hash_cache`. Rows are looked up by path and accepted
//! only when the stored size and mtime equal the file's current values, so a
//! modified file is simply a miss and gets re-hashed (and its row replaced).

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::entry::{CacheEntry, CacheStats};
use crate::logging::Logger;
use crate::scanner::path_utils::path_key;
use crate::scanner::FileRecord;

/// Bump when the table layout changes; older stores are rebuilt.
const SCHEMA_VERSION: i64 = 1;

/// Bound parameters per `IN (...)` lookup, under SQLite's 999 limit.
const MAX_BATCH_PARAMS: usize = 900;

/// Errors from the hash cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The store could not be opened or initialized.
    #[error("Failed to open hash cache at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The directory for the store could not be created.
    #[error("Failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A query or write failed.
    #[error("Hash cache operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Rejected prefix for [`HashCache::invalidate_by_prefix`].
    #[error("Invalid cache prefix {prefix:?}: {reason}")]
    InvalidPrefix {
        prefix: String,
        reason: &'static str,
    },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Persistent cache for full-content hashes.
///
/// The connection sits behind a mutex, so one `Arc<HashCache>` can be
/// shared; the duplicate finder only touches it from its coordinating thread.
pub struct HashCache {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    logger: Logger,
}

impl std::fmt::Debug for HashCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashCache")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl HashCache {
    /// Open or create the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Open`] (carrying `path`) if the file is not a
    /// usable SQLite database, or [`CacheError::CreateDir`] if its parent
    /// directory cannot be created.
    pub fn new(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let open_err = |source| CacheError::Open {
            path: path.to_path_buf(),
            source,
        };
        let conn = Connection::open(path).map_err(open_err)?;
        configure_pragmas(&conn).map_err(open_err)?;
        migrate_schema(&conn).map_err(open_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
            logger: Logger::discard(),
        })
    }

    /// A private, non-persistent store.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Open`] if SQLite cannot allocate the database.
    pub fn open_in_memory() -> CacheResult<Self> {
        let open_err = |source| CacheError::Open {
            path: PathBuf::from(":memory:"),
            source,
        };
        let conn = Connection::open_in_memory().map_err(open_err)?;
        configure_pragmas(&conn).map_err(open_err)?;
        migrate_schema(&conn).map_err(open_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
            logger: Logger::discard(),
        })
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger.with_target("hashdupe::cache");
        self.logger.debug(format_args!(
            "Hash cache ready at {}",
            self.path
                .as_deref()
                .map_or_else(|| ":memory:".into(), |p| p.display().to_string())
        ));
        self
    }

    /// Location of the store, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // The connection holds no invariants a panicking holder could break.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached hash for `path`, only if `size` and `mtime` both match.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Sqlite`] if the lookup fails.
    pub fn get(&self, path: &Path, size: u64, mtime: f64) -> CacheResult<Option<String>> {
        let conn = self.conn();
        let row = conn
            .prepare_cached("SELECT size, mtime, hash FROM hash_cache WHERE path = ?1")?
            .query_row(params![path_key(path)], |row| {
                Ok(CacheEntry::new(
                    path.to_path_buf(),
                    from_sql_size(row.get(0)?),
                    row.get(1)?,
                    row.get(2)?,
                ))
            })
            .optional()?;

        Ok(row.filter(|e| e.matches(size, mtime)).map(|e| e.hash))
    }

    /// Cached hashes for many files at once, keyed by the records' paths.
    ///
    /// Only valid hits appear in the result. Lookups are issued in chunks
    /// of `IN (...)` queries.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Sqlite`] if any chunk fails.
    pub fn get_batch<'a, I>(&self, files: I) -> CacheResult<HashMap<PathBuf, String>>
    where
        I: IntoIterator<Item = &'a FileRecord>,
    {
        let wanted: HashMap<String, &FileRecord> =
            files.into_iter().map(|f| (path_key(&f.path), f)).collect();
        let keys: Vec<&str> = wanted.keys().map(String::as_str).collect();
        let mut hits = HashMap::new();

        let conn = self.conn();
        for chunk in keys.chunks(MAX_BATCH_PARAMS) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT path, size, mtime, hash FROM hash_cache WHERE path IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    from_sql_size(row.get(1)?),
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            for row in rows {
                let (key, size, mtime, hash) = row?;
                if let Some(record) = wanted.get(&key) {
                    let entry = CacheEntry::new(record.path.clone(), size, mtime, hash);
                    if entry.matches(record.size, record.mtime) {
                        hits.insert(entry.path, entry.hash);
                    }
                }
            }
        }

        Ok(hits)
    }

    /// Insert or replace the entry for one path.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Sqlite`] if the write fails.
    pub fn set(&self, entry: &CacheEntry) -> CacheResult<()> {
        self.set_batch(std::slice::from_ref(entry)).map(|_| ())
    }

    /// Insert or replace many entries in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Sqlite`] if the transaction fails; nothing from
    /// the batch is kept in that case.
    pub fn set_batch(&self, entries: &[CacheEntry]) -> CacheResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let now = timestamp_now();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO hash_cache (path, size, mtime, hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    path_key(&entry.path),
                    to_sql_size(entry.size),
                    entry.mtime,
                    entry.hash,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    /// Remove the entry for exactly `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Sqlite`] if the delete fails.
    pub fn invalidate(&self, path: &Path) -> CacheResult<usize> {
        let removed = self
            .conn()
            .execute("DELETE FROM hash_cache WHERE path = ?1", params![path_key(path)])?;
        Ok(removed)
    }

    /// Remove `prefix` itself and every entry beneath it.
    ///
    /// Matching is by whole path segments: `/data/photos` removes
    /// `/data/photos/a.jpg` but leaves `/data/photos2/a.jpg` alone.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidPrefix`] for an empty, relative or
    /// NUL-containing prefix, and [`CacheError::Sqlite`] if the delete fails.
    pub fn invalidate_by_prefix(&self, prefix: &Path) -> CacheResult<usize> {
        let raw = path_key(prefix);
        let invalid = |reason| CacheError::InvalidPrefix {
            prefix: raw.clone(),
            reason,
        };
        if raw.is_empty() {
            return Err(invalid("prefix is empty"));
        }
        if raw.contains('\0') {
            return Err(invalid("prefix contains a NUL byte"));
        }
        if !prefix.is_absolute() {
            return Err(invalid("prefix must be an absolute path"));
        }

        let base = raw.trim_end_matches(['/', MAIN_SEPARATOR]);
        let under = format!("{base}{MAIN_SEPARATOR}");
        let exact = if base.is_empty() { under.as_str() } else { base };

        let removed = self.conn().execute(
            "DELETE FROM hash_cache
             WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2",
            params![exact, under],
        )?;
        Ok(removed)
    }

    /// Drop entries whose file no longer exists, or, with `valid`, entries
    /// whose path is not in that set.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Sqlite`] if reading or deleting fails.
    pub fn cleanup_invalid_paths(&self, valid: Option<&HashSet<PathBuf>>) -> CacheResult<usize> {
        let valid_keys: Option<HashSet<String>> =
            valid.map(|set| set.iter().map(|p| path_key(p)).collect());

        let mut conn = self.conn();
        let stored: Vec<String> = conn
            .prepare("SELECT path FROM hash_cache")?
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        let stale: Vec<&String> = stored
            .iter()
            .filter(|key| match &valid_keys {
                Some(valid) => !valid.contains(*key),
                None => !Path::new(key.as_str()).exists(),
            })
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM hash_cache WHERE path = ?1")?;
            for key in &stale {
                stmt.execute(params![key])?;
            }
        }
        tx.commit()?;

        self.logger
            .debug(format_args!("Removed {} stale cache entries", stale.len()));
        Ok(stale.len())
    }

    /// Entry count, cached bytes, on-disk size and entry age range.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Sqlite`] if the aggregate query fails.
    pub fn stats(&self) -> CacheResult<CacheStats> {
        let (total_entries, total_size, oldest, newest) = self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(size), 0), MIN(created_at), MAX(created_at)
             FROM hash_cache",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )?;

        Ok(CacheStats {
            total_entries: from_sql_size(total_entries),
            total_size: from_sql_size(total_size),
            db_size: self.disk_usage(),
            oldest_entry: oldest.as_deref().and_then(parse_timestamp),
            newest_entry: newest.as_deref().and_then(parse_timestamp),
        })
    }

    /// Delete every entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Sqlite`] if the delete fails.
    pub fn clear(&self) -> CacheResult<usize> {
        let removed = self.conn().execute("DELETE FROM hash_cache", [])?;
        self.logger
            .info(format_args!("Cleared {removed} hash cache entries"));
        Ok(removed)
    }

    /// Close the connection, surfacing any error from the final flush.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Sqlite`] if SQLite refuses to close.
    pub fn close(self) -> CacheResult<()> {
        let conn = self.conn.into_inner().unwrap_or_else(|e| e.into_inner());
        conn.close().map_err(|(_, e)| CacheError::Sqlite(e))
    }

    fn disk_usage(&self) -> u64 {
        let Some(path) = &self.path else {
            return 0;
        };
        let mut wal = path.clone().into_os_string();
        wal.push("-wal");
        [path.clone(), PathBuf::from(wal)]
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum()
    }
}

fn configure_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA cache_size = -16000;",
    )
}

/// Rebuild the table when the stored layout is older than [`SCHEMA_VERSION`].
/// Everything in the cache can be recomputed, so nothing is migrated.
fn migrate_schema(conn: &Connection) -> rusqlite::Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        conn.execute_batch("DROP TABLE IF EXISTS hash_cache;")?;
    }
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS hash_cache (
             path       TEXT PRIMARY KEY NOT NULL,
             size       INTEGER NOT NULL,
             mtime      REAL NOT NULL,
             hash       TEXT NOT NULL,
             created_at TEXT NOT NULL,
             updated_at TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_hash_cache_size_mtime ON hash_cache (size, mtime);",
    )?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn to_sql_size(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

fn from_sql_size(size: i64) -> u64 {
    u64::try_from(size).unwrap_or(0)
}
