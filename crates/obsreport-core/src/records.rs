//! Typed records kept in the agent's stores, and their byte codec.
//!
//! Values are stored as JSON. Decoding validates shape (for example the
//! observable vector length) so a corrupt record surfaces as
//! [`ReportError::MalformedRecord`] instead of being misread.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::observables::OBSERVABLE_COUNT;

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// Last value, running expectation and running variance of one quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QPoint {
    pub q: f64,
    pub expect: f64,
    pub var: f64,
}

impl QPoint {
    pub fn new(q: f64, expect: f64, var: f64) -> Self {
        Self { q, expect, var }
    }

    /// Same value in all three slots.
    pub fn splat(v: f64) -> Self {
        Self::new(v, v, v)
    }

    pub fn stddev(&self) -> f64 {
        self.var.max(0.0).sqrt()
    }
}

/// One time bucket: a [`QPoint`] for every observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Averages {
    #[serde(rename = "Q")]
    pub q: Vec<QPoint>,
}

impl Default for Averages {
    fn default() -> Self {
        Self::filled(QPoint::default())
    }
}

impl Averages {
    pub fn filled(point: QPoint) -> Self {
        Self {
            q: vec![point; OBSERVABLE_COUNT],
        }
    }
}

/// A timed event: performance measurements and class occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Time of the last occurrence.
    pub t: i64,
    #[serde(rename = "Q")]
    pub q: QPoint,
}

/// Lock bookkeeping entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LockData {
    pub pid: u32,
    pub time: i64,
}

/// Outcome recorded for an audited promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Kept,
    Repaired,
    NotKept,
    Interrupted,
    Unknown,
}

impl AuditStatus {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Kept => "Promise kept",
            Self::Repaired => "Promise repaired",
            Self::NotKept => "Promise not kept",
            Self::Interrupted => "Promise interrupted",
            Self::Unknown => "Promise status unknown",
        }
    }
}

/// One entry of the promise audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub operator: String,
    pub comment: String,
    pub filename: String,
    pub date: String,
    pub version: String,
    pub lineno: u32,
    pub status: AuditStatus,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// A value that can be stored in a [`crate::store::KvStore`].
pub trait Record: Serialize + DeserializeOwned {
    /// Reject values whose shape is inconsistent after decoding.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

impl Record for QPoint {}
impl Record for Event {}
impl Record for LockData {}
impl Record for AuditLog {}
impl Record for f64 {}

impl Record for Averages {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.q.len() != OBSERVABLE_COUNT {
            return Err(format!(
                "expected {OBSERVABLE_COUNT} observables, found {}",
                self.q.len()
            ));
        }
        Ok(())
    }
}

/// Decode `raw` stored under `key`.
pub fn decode<T: Record>(key: &[u8], raw: &[u8]) -> Result<T> {
    let malformed = |reason: String| ReportError::MalformedRecord {
        key: String::from_utf8_lossy(key).into_owned(),
        reason,
    };
    let value: T = serde_json::from_slice(raw).map_err(|e| malformed(e.to_string()))?;
    value.validate().map_err(malformed)?;
    Ok(value)
}

/// Encode a record for storage.
pub fn encode<T: Record>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| ReportError::Store(format!("encode failed: {e}")))
}
