//! Key-value store access.
//!
//! Report passes only need ordered byte-keyed storage: point lookups by
//! [`crate::timegrid::TimeKey`], and a cursor over free-form keys (host
//! names, event names, lock names) in store order. [`KvStore`] captures that;
//! [`SqliteStore`] is the on-disk backend and [`MemoryStore`] backs tests and
//! scratch work.
//!
//! Passes acquire a store through [`with_store`], which opens exactly one
//! handle and closes it on every exit path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::error::{ReportError, Result};
use crate::records::{Record, decode, encode};

/// One key/value pair yielded by a cursor.
pub type Entry = (Vec<u8>, Vec<u8>);

/// Key-ordered iteration over a store.
///
/// [`MemoryStore`] walks its map in place. [`SqliteStore`] reads every row
/// when the cursor is created, so read errors surface from
/// [`KvStore::cursor`] rather than mid-iteration.
pub type Cursor<'a> = Box<dyn Iterator<Item = Entry> + 'a>;

/// How a pass intends to use a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Aggregation and rendering passes.
    ReadOnly,
    /// Purge and erase passes. Creates the store if missing.
    ReadWrite,
}

/// Byte-keyed store with ordered iteration.
pub trait KvStore {
    /// `Ok(None)` when the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Deleting an absent key succeeds.
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// All entries in ascending key order.
    fn cursor(&self) -> Result<Cursor<'_>>;
}

/// Typed access on top of any [`KvStore`].
pub trait RecordStore: KvStore {
    fn get_record<T: Record>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => decode(key, &raw).map(Some),
            None => Ok(None),
        }
    }

    fn put_record<T: Record>(&mut self, key: &[u8], value: &T) -> Result<()> {
        let raw = encode(value)?;
        self.put(key, &raw)
    }
}

impl<S: KvStore + ?Sized> RecordStore for S {}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Ordered in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn cursor(&self) -> Result<Cursor<'_>> {
        Ok(Box::new(
            self.entries.iter().map(|(k, v)| (k.clone(), v.clone())),
        ))
    }
}

// ---------------------------------------------------------------------------
// SQLite store
// ---------------------------------------------------------------------------

const SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS kv (key BLOB PRIMARY KEY NOT NULL, value BLOB NOT NULL) WITHOUT ROWID";

/// Single-table SQLite store. Keys compare bytewise.
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
    mode: StoreMode,
}

impl SqliteStore {
    /// Open the store at `path`.
    ///
    /// Read-only opens require an existing store; read-write opens create it.
    pub fn open(path: &Path, mode: StoreMode) -> Result<Self> {
        let unavailable = |reason: String| ReportError::StoreUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let conn = match mode {
            StoreMode::ReadOnly => {
                if !path.exists() {
                    return Err(unavailable("no such store".to_string()));
                }
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .map_err(|e| unavailable(e.to_string()))?;
                let has_table: Option<String> = conn
                    .query_row(
                        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'kv'",
                        [],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|e| unavailable(e.to_string()))?;
                if has_table.is_none() {
                    return Err(unavailable("not a key-value store".to_string()));
                }
                conn
            }
            StoreMode::ReadWrite => {
                let conn = Connection::open(path).map_err(|e| unavailable(e.to_string()))?;
                conn.execute(SCHEMA, [])
                    .map_err(|e| unavailable(e.to_string()))?;
                conn
            }
        };

        log::debug!("opened store {} ({:?})", path.display(), mode);
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    /// Close the handle, reporting any error the drop would swallow.
    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| {
            ReportError::Store(format!("closing {}: {e}", path.display()))
        })
    }

    fn require_writable(&self) -> Result<()> {
        if self.mode == StoreMode::ReadOnly {
            return Err(ReportError::Store(format!(
                "{} is open read-only",
                self.path.display()
            )));
        }
        Ok(())
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.require_writable()?;
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.require_writable()?;
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Snapshot of all rows in key order.
    fn cursor(&self) -> Result<Cursor<'_>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM kv ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<Entry>>>()?;
        Ok(Box::new(rows.into_iter()))
    }
}

/// Open the store at `path`, run `f`, and close the store whatever happens.
///
/// An error from `f` takes precedence over a close error.
pub fn with_store<T>(
    path: &Path,
    mode: StoreMode,
    f: impl FnOnce(&mut SqliteStore) -> Result<T>,
) -> Result<T> {
    let mut store = SqliteStore::open(path, mode)?;
    let result = f(&mut store);
    let closed = store.close();
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e),
    }
}
