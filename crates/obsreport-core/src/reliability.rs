//! Peer intermittency.
//!
//! Every peer in the last-seen ledger has its own history store keyed by
//! week bucket. Walking that week yields two series per peer: time since last
//! contact, and the expected contact interval with its deviation. A bucket
//! without a sample is read as continued silence, so time since contact keeps
//! growing until real data shows up.

use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};
use crate::format::file_stem;
use crate::output::FileBatch;
use crate::records::QPoint;
use crate::store::{KvStore, RecordStore, StoreMode, with_store};
use crate::timegrid::{MEASURE_INTERVAL, TimeGrid, WEEK};

/// Time since contact assumed before the first bucket: a week of silence.
pub const LAST_SEEN_SEED: i64 = WEEK;

/// Expected contact interval assumed before any sample: one measurement.
pub const EXPECT_SEED: f64 = MEASURE_INTERVAL as f64;

// ---------------------------------------------------------------------------
// Peer discovery
// ---------------------------------------------------------------------------

/// Maps a ledger address to the identity used for a peer.
pub trait HostResolver {
    fn resolve(&self, address: &str) -> String;
}

/// Uses the address as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl HostResolver for IdentityResolver {
    fn resolve(&self, address: &str) -> String {
        address.to_string()
    }
}

/// Distinct peers of a last-seen ledger, in first-seen order.
///
/// Ledger keys carry a one-character direction prefix (`+` or `-`); the same
/// host recorded in both directions is one peer.
pub fn discover_peers<S: KvStore + ?Sized>(
    store: &S,
    resolver: &dyn HostResolver,
) -> Result<Vec<String>> {
    let mut peers: Vec<String> = Vec::new();
    for (key, _) in store.cursor()? {
        let key = String::from_utf8_lossy(&key);
        let mut chars = key.chars();
        if chars.next().is_none() {
            continue;
        }
        let address = chars.as_str();
        if address.is_empty() {
            continue;
        }
        let host = resolver.resolve(address);
        if !peers.contains(&host) {
            log::info!("examining intermittent host {host}");
            peers.push(host);
        }
    }
    Ok(peers)
}

// ---------------------------------------------------------------------------
// Per-peer series
// ---------------------------------------------------------------------------

/// Both series computed for one peer over a week.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSeries {
    pub peer: String,
    /// `(bucket, seconds since last contact)` for every bucket.
    pub last_seen: Vec<(usize, i64)>,
    /// `(bucket, expected interval, deviation)` for buckets with a sample.
    pub expected: Vec<(usize, f64, f64)>,
    /// Expected contact interval after the last bucket.
    pub expect: f64,
}

/// Walk the week of `history`. `None` means the peer has no history store.
pub fn peer_series<S: KvStore + ?Sized>(peer: &str, history: Option<&S>) -> Result<PeerSeries> {
    let grid = TimeGrid::week();
    let mut series = PeerSeries {
        peer: peer.to_string(),
        last_seen: Vec::with_capacity(grid.len()),
        expected: Vec::new(),
        expect: EXPECT_SEED,
    };
    let mut last_seen = LAST_SEEN_SEED;

    for bucket in grid.iter() {
        let sample = match history {
            Some(store) => match store.get_record::<QPoint>(bucket.key.as_bytes()) {
                Ok(s) => s,
                Err(e) if e.is_malformed() => {
                    log::warn!("{peer}: skipping bucket {}: {e}", bucket.key);
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        match sample {
            Some(point) => {
                // A contact time after the bucket counts as just seen.
                last_seen = elapsed_since(bucket.time, point.q);
                series.expect = point.expect;
                series
                    .expected
                    .push((bucket.index, point.expect, point.stddev()));
            }
            None => last_seen = last_seen.saturating_add(grid.interval()),
        }
        series.last_seen.push((bucket.index, last_seen));
    }
    Ok(series)
}

/// Seconds from `contact` to `now`, floored at zero. Out-of-range contact
/// times saturate instead of overflowing.
fn elapsed_since(now: i64, contact: f64) -> i64 {
    let elapsed = now as f64 - contact;
    if elapsed.is_nan() {
        return 0;
    }
    // `as` saturates at the i64 bounds.
    elapsed.max(0.0) as i64
}

/// Write `lastseen-<peer>.q` and `lastseen-<peer>.E-sigma`.
pub fn write_peer_files(series: &PeerSeries, dir: &Path) -> Result<Vec<PathBuf>> {
    let stem = file_stem(&series.peer);
    let mut batch = FileBatch::create(
        dir,
        [format!("lastseen-{stem}.q"), format!("lastseen-{stem}.E-sigma")],
    )?;
    for (index, seen) in &series.last_seen {
        batch.write(0, format_args!("{index} {seen}\n"))?;
    }
    for (index, expect, dev) in &series.expected {
        batch.write(1, format_args!("{index} {expect:.6} {dev:.6}\n"))?;
    }
    batch.finish()
}

/// Compute and write the series of every peer in the `last_seen` ledger.
///
/// `history_path` maps a peer to its history store. A missing ledger means no
/// peers; a missing history store means no samples for that peer.
pub fn write_peer_intermittency(
    last_seen: &Path,
    history_path: impl Fn(&str) -> PathBuf,
    resolver: &dyn HostResolver,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    let peers = match with_store(last_seen, StoreMode::ReadOnly, |s| discover_peers(&*s, resolver)) {
        Ok(p) => p,
        Err(e @ ReportError::StoreUnavailable { .. }) => {
            log::info!("no peers: {e}");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut written = Vec::new();
    for peer in peers {
        let path = history_path(&peer);
        log::debug!("consulting profile {}", path.display());
        let series = match with_store(&path, StoreMode::ReadOnly, |s| peer_series(&peer, Some(&*s))) {
            Ok(s) => s,
            Err(ReportError::StoreUnavailable { .. }) => {
                log::info!("{peer}: no history store at {}", path.display());
                peer_series::<crate::store::MemoryStore>(&peer, None)?
            }
            Err(e) => return Err(e),
        };
        written.extend(write_peer_files(&series, dir)?);
    }
    Ok(written)
}
