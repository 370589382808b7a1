//! Weekly aggregation of observable samples.
//!
//! Two passes over the canonical week:
//!
//! 1. [`compute_extrema`] finds the running maximum and minimum of `|expect|`
//!    and `|q|` per observable.
//! 2. [`compute_series`] averages consecutive buckets into chunks of a given
//!    resolution; each chunk can then be normalized by the weekly maxima for
//!    plotting.
//!
//! The resulting [`Series`] is written out as gnuplot-ready matrices and
//! per-observable files by [`write_graph_files`] and [`write_magnify_files`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::observables::{OBSERVABLE_COUNT, OBSERVABLES};
use crate::output::FileBatch;
use crate::records::{Averages, QPoint};
use crate::store::{KvStore, RecordStore};
use crate::timegrid::{MEASURE_INTERVAL, TimeGrid, TimeKey, WEEK};

/// Initial value of every running maximum.
pub const EXTREMA_FLOOR: f64 = 0.01;

/// Initial value of every running minimum.
pub const EXTREMA_CEILING: f64 = 9999.0;

/// Buckets per chunk for the coarse (default) resolution: one hour.
pub const COARSE_RESOLUTION: usize = 12;

/// Key holding the age of the averages store.
pub const DATABASE_AGE_KEY: &str = "DATABASE_AGE";

// ---------------------------------------------------------------------------
// Sample access
// ---------------------------------------------------------------------------

/// Read the sample stored for one bucket.
///
/// A missing bucket is `Ok(None)`. A malformed record is logged and treated
/// as missing so a single corrupt bucket cannot sink the week.
pub fn read_sample<S: KvStore + ?Sized>(store: &S, key: &TimeKey) -> Result<Option<Averages>> {
    match store.get_record::<Averages>(key.as_bytes()) {
        Ok(sample) => Ok(sample),
        Err(e) if e.is_malformed() => {
            log::warn!("skipping bucket {key}: {e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Store the sample for one bucket.
pub fn write_sample<S: KvStore + ?Sized>(store: &mut S, key: &TimeKey, sample: &Averages) -> Result<()> {
    store.put_record(key.as_bytes(), sample)
}

// ---------------------------------------------------------------------------
// Extrema
// ---------------------------------------------------------------------------

/// Per-observable running maxima and minima over one week.
#[derive(Debug, Clone, PartialEq)]
pub struct Extrema {
    pub max: Averages,
    pub min: Averages,
    /// Buckets that contributed.
    pub samples: usize,
}

impl Default for Extrema {
    fn default() -> Self {
        Self {
            max: Averages::filled(QPoint::splat(EXTREMA_FLOOR)),
            min: Averages::filled(QPoint::splat(EXTREMA_CEILING)),
            samples: 0,
        }
    }
}

impl Extrema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample into the running extrema.
    pub fn observe(&mut self, sample: &Averages) {
        for ((max, min), point) in self
            .max
            .q
            .iter_mut()
            .zip(self.min.q.iter_mut())
            .zip(sample.q.iter())
        {
            let expect = point.expect.abs();
            let q = point.q.abs();
            let var = point.var.abs();
            max.expect = max.expect.max(expect);
            max.q = max.q.max(q);
            max.var = max.var.max(var);
            min.expect = min.expect.min(expect);
            min.q = min.q.min(q);
            min.var = min.var.min(var);
        }
        self.samples += 1;
    }

    /// True when no bucket contributed: maxima sit at the floor sentinel.
    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }
}

/// Scan one week and compute per-observable extrema.
pub fn compute_extrema<S: KvStore + ?Sized>(store: &S) -> Result<Extrema> {
    let mut extrema = Extrema::new();
    for bucket in TimeGrid::week().iter() {
        if let Some(sample) = read_sample(store, &bucket.key)? {
            extrema.observe(&sample);
        }
    }
    log::info!("extrema computed from {} sampled bucket(s)", extrema.samples);
    Ok(extrema)
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Whether plotted values are normalized by the weekly maxima.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scaling {
    Scaled,
    Unscaled,
}

impl Scaling {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::Scaled } else { Self::Unscaled }
    }
}

/// Mean of one chunk of buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    /// Buckets consumed so far, including this chunk (the plot x coordinate).
    pub index: usize,
    pub mean: Averages,
}

/// Chunked week with the divisors used to normalize it.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub resolution: usize,
    pub scaling: Scaling,
    /// Per-observable divisors; 1 where normalization is disabled.
    pub scale: Averages,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    /// Normalized value of observable `obs` at `point`.
    pub fn normalized(&self, point: &SeriesPoint, obs: usize) -> QPoint {
        let v = &point.mean.q[obs];
        let s = &self.scale.q[obs];
        QPoint::new(
            safe_ratio(v.q, s.q),
            safe_ratio(v.expect, s.expect),
            safe_ratio(v.var, s.var),
        )
    }
}

/// `value / divisor`, with the divisor clamped away from zero and non-finite
/// results mapped to zero.
pub fn safe_ratio(value: f64, divisor: f64) -> f64 {
    let divisor = if divisor.abs() < EXTREMA_FLOOR || !divisor.is_finite() {
        EXTREMA_FLOOR
    } else {
        divisor
    };
    let r = value / divisor;
    if r.is_finite() { r } else { 0.0 }
}

/// Divisors for `scaling`. Unscaled output keeps observable 0 normalized and
/// pins the `expect` and `q` divisors of every other observable to 1; the
/// variance keeps its weekly maximum.
pub fn scale_divisors(extrema: &Extrema, scaling: Scaling) -> Averages {
    let mut scale = extrema.max.clone();
    if scaling == Scaling::Unscaled {
        for point in scale.q.iter_mut().skip(1) {
            point.expect = 1.0;
            point.q = 1.0;
        }
    }
    scale
}

/// Number of points [`compute_series`] yields for a grid and resolution.
pub fn chunk_count(grid: &TimeGrid, resolution: usize) -> usize {
    grid.len().div_ceil(resolution.max(1))
}

/// Average `grid` in chunks of `resolution` buckets.
///
/// Each chunk value is the arithmetic mean over the buckets of the chunk; a
/// bucket without a sample contributes zero. The final chunk may be short
/// when the grid length is not a multiple of `resolution`.
pub fn compute_series<S: KvStore + ?Sized>(
    store: &S,
    grid: &TimeGrid,
    extrema: &Extrema,
    resolution: usize,
    scaling: Scaling,
) -> Result<Series> {
    let resolution = resolution.max(1);
    let buckets: Vec<_> = grid.iter().collect();
    let mut points = Vec::with_capacity(chunk_count(grid, resolution));
    let mut consumed = 0usize;

    for chunk in buckets.chunks(resolution) {
        let n = chunk.len() as f64;
        let mut mean = Averages::default();
        for bucket in chunk {
            if let Some(sample) = read_sample(store, &bucket.key)? {
                for (acc, point) in mean.q.iter_mut().zip(sample.q.iter()) {
                    acc.expect += point.expect / n;
                    acc.var += point.var / n;
                    acc.q += point.q / n;
                }
            }
        }
        consumed += chunk.len();
        points.push(SeriesPoint {
            index: consumed,
            mean,
        });
    }

    Ok(Series {
        resolution,
        scaling,
        scale: scale_divisors(extrema, scaling),
        points,
    })
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

const MATRIX_FILES: [&str; 3] = ["cfenv-average", "cfenv-stddev", "cfenv-now"];
const RULE: &str = "##############################################";

/// Write the three normalized matrices plus `<obs>.E-sigma` and `<obs>.q`
/// for every observable.
pub fn write_graph_files(series: &Series, dir: &Path, titles: bool) -> Result<Vec<PathBuf>> {
    let mut names: Vec<String> = MATRIX_FILES.iter().map(|s| s.to_string()).collect();
    for o in OBSERVABLES {
        names.push(format!("{}.E-sigma", o.name));
        names.push(format!("{}.q", o.name));
    }
    let mut batch = FileBatch::create(dir, &names)?;

    if titles {
        for m in 0..MATRIX_FILES.len() {
            for (i, o) in OBSERVABLES.iter().enumerate() {
                batch.write(m, format_args!("# Column {}: {}\n", i, o.name))?;
            }
            batch.write(m, format_args!("{RULE}\n"))?;
        }
    }

    for point in &series.points {
        for m in 0..MATRIX_FILES.len() {
            batch.write(m, format_args!("{} ", point.index))?;
        }
        for i in 0..OBSERVABLE_COUNT {
            let n = series.normalized(point, i);
            batch.write(0, format_args!("{:.6} ", n.expect))?;
            batch.write(1, format_args!("{:.6} ", n.var))?;
            batch.write(2, format_args!("{:.6} ", n.q))?;
        }
        for m in 0..MATRIX_FILES.len() {
            batch.write(m, format_args!("\n"))?;
        }

        for (i, raw) in point.mean.q.iter().enumerate() {
            let e = MATRIX_FILES.len() + 2 * i;
            batch.write(
                e,
                format_args!("{} {:.6} {:.6}\n", point.index, raw.expect, raw.stddev()),
            )?;
            // Same scaling as E-sigma so the two can be overlaid.
            batch.write(e + 1, format_args!("{} {:.6} 0.0\n", point.index, raw.q))?;
        }
    }

    batch.finish()
}

/// Write `<obs>.mag` files: `index expect stddev q` per point.
pub fn write_magnify_files(series: &Series, dir: &Path) -> Result<Vec<PathBuf>> {
    let names: Vec<String> = OBSERVABLES.iter().map(|o| format!("{}.mag", o.name)).collect();
    let mut batch = FileBatch::create(dir, &names)?;
    for point in &series.points {
        for (i, raw) in point.mean.q.iter().enumerate() {
            batch.write(
                i,
                format_args!(
                    "{} {:.6} {:.6} {:.6}\n",
                    point.index,
                    raw.expect,
                    raw.stddev(),
                    raw.q
                ),
            )?;
        }
    }
    batch.finish()
}

// ---------------------------------------------------------------------------
// Summary and maintenance
// ---------------------------------------------------------------------------

/// Age of the averages store, in stored units, if recorded.
pub fn database_age<S: KvStore + ?Sized>(store: &S) -> Result<Option<f64>> {
    store.get_record::<f64>(DATABASE_AGE_KEY.as_bytes())
}

/// Log the extrema table and the store age.
pub fn log_summary(extrema: &Extrema, age: Option<f64>) {
    for (i, o) in OBSERVABLES.iter().enumerate() {
        log::info!(
            "{:2}. {:<12} min {:10.4} max {:10.4} sd {:10.4}",
            i,
            o.name,
            extrema.min.q[i].expect,
            extrema.max.q[i].expect,
            extrema.max.q[i].var.sqrt()
        );
    }
    if let Some(age) = age {
        log::info!(
            "DATABASE_AGE {:.1} (weeks)",
            age / WEEK as f64 * MEASURE_INTERVAL as f64
        );
    }
}

/// Zero the stored history (`expect`, `var`; `q` is kept) of the observables
/// at `indices` in every bucket of the week. Returns the rewritten bucket count.
pub fn erase_history<S: KvStore + ?Sized>(store: &mut S, indices: &[usize]) -> Result<usize> {
    let mut rewritten = 0;
    for bucket in TimeGrid::week().iter() {
        let Some(mut sample) = read_sample(store, &bucket.key)? else {
            continue;
        };
        for &i in indices {
            if let Some(point) = sample.q.get_mut(i) {
                point.expect = 0.0;
                point.var = 0.0;
            }
        }
        write_sample(store, &bucket.key, &sample)?;
        rewritten += 1;
    }
    log::info!("erased history of {} observable(s) in {rewritten} bucket(s)", indices.len());
    Ok(rewritten)
}
