//! Error taxonomy for report passes.
//!
//! A missing key is never an error: [`crate::store::KvStore::get`] returns
//! `Ok(None)` for it. Everything in [`ReportError`] aborts the current pass.

use std::path::PathBuf;

/// Fatal outcome of one report pass.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The store could not be opened or created.
    #[error("store unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    /// A read, write or delete failed for a reason other than "not found".
    #[error("store operation failed: {0}")]
    Store(String),

    /// A stored value did not decode into the expected record shape.
    #[error("malformed record at key {key:?}: {reason}")]
    MalformedRecord { key: String, reason: String },

    /// A destination file could not be created or written.
    #[error("cannot write {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted histogram table is missing or short.
    #[error("cannot load histogram table {path}: {reason}")]
    Histogram { path: PathBuf, reason: String },

    /// Invalid report configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for ReportError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;

impl ReportError {
    /// Wrap an I/O error raised while writing `path`.
    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }

    /// True for per-record decode failures that a pass may skip.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}
