//! Canonical weekly time grid.
//!
//! Samples are stored under a key naming their slot in a repeating week:
//! `Mon:Hr13:Min05_10` is the five minutes after 13:05 on any Monday (UTC).
//! The key depends only on the position of the timestamp inside the week
//! truncated to [`MEASURE_INTERVAL`], so the same slot of every week shares
//! one key.

use std::fmt;

/// Sampling granularity in seconds.
pub const MEASURE_INTERVAL: i64 = 5 * 60;

/// Seconds in an hour.
pub const HOUR: i64 = 3600;

/// Seconds in a day.
pub const DAY: i64 = 24 * HOUR;

/// Length of the canonical week in seconds.
pub const WEEK: i64 = 7 * DAY;

/// Reference Monday 00:00 UTC (1970-01-05) anchoring the grid.
pub const MONDAY_MORNING: i64 = 4 * DAY;

/// Number of buckets in one week at [`MEASURE_INTERVAL`].
pub const BUCKETS_PER_WEEK: usize = (WEEK / MEASURE_INTERVAL) as usize;

const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Canonical bucket key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeKey(String);

impl TimeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Offset of `t` inside the canonical week, truncated to the sampling grain.
fn week_offset(t: i64) -> i64 {
    let offset = t.saturating_sub(MONDAY_MORNING).rem_euclid(WEEK);
    offset - offset % MEASURE_INTERVAL
}

/// Key of the bucket containing `t`.
pub fn bucket_key(t: i64) -> TimeKey {
    let offset = week_offset(t);
    let day = (offset / DAY) as usize;
    let hour = (offset % DAY) / HOUR;
    let minute = (offset % HOUR) / 60;
    let next = (minute + MEASURE_INTERVAL / 60) % 60;
    TimeKey(format!(
        "{}:Hr{:02}:Min{:02}_{:02}",
        DAY_NAMES[day], hour, minute, next
    ))
}

/// Position (0-based) of the bucket containing `t` within the week.
pub fn bucket_index(t: i64) -> usize {
    (week_offset(t) / MEASURE_INTERVAL) as usize
}

/// One slot visited by a [`TimeGrid`] walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Ordinal of this bucket within the walk, starting at 0.
    pub index: usize,
    /// Grid time of the bucket start.
    pub time: i64,
    pub key: TimeKey,
}

/// A walk over consecutive buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGrid {
    start: i64,
    interval: i64,
    span: i64,
}

impl TimeGrid {
    /// Walk `span` seconds from `start` at `interval` steps.
    pub fn new(start: i64, interval: i64, span: i64) -> Self {
        Self {
            start,
            interval: interval.max(1),
            span: span.max(0),
        }
    }

    /// The full canonical week at the sampling granularity.
    pub fn week() -> Self {
        Self::new(MONDAY_MORNING, MEASURE_INTERVAL, WEEK)
    }

    /// The `span` seconds leading up to (excluding) `end`.
    pub fn trailing(end: i64, span: i64) -> Self {
        Self::new(end.saturating_sub(span), MEASURE_INTERVAL, span)
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// Number of buckets in the walk.
    pub fn len(&self) -> usize {
        ((self.span + self.interval - 1) / self.interval) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every bucket in order.
    pub fn iter(&self) -> impl Iterator<Item = Bucket> + use<> {
        let Self {
            start, interval, ..
        } = *self;
        (0..self.len()).map(move |index| {
            let time = start.saturating_add(index as i64 * interval);
            Bucket {
                index,
                time,
                key: bucket_key(time),
            }
        })
    }
}
