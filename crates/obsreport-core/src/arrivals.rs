//! Filesystem arrival process plots.
//!
//! Each `scan:*` store in the work directory holds one arrival count per
//! week bucket. Counts are summed into chunks, lightly smoothed and scaled
//! to a 0..50 plot range.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};
use crate::store::{KvStore, RecordStore, StoreMode, with_store};
use crate::timegrid::TimeGrid;

/// Plot height of the largest chunk.
pub const PLOT_RANGE: f64 = 50.0;

/// Arrival store files under `workdir` whose name starts with `prefix`, by name.
pub fn discover_stores(workdir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    log::info!("looking for filesystem arrival data in {}", workdir.display());
    let entries = std::fs::read_dir(workdir).map_err(|e| ReportError::StoreUnavailable {
        path: workdir.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
        .map(|e| e.path())
        .collect();
    found.sort();
    Ok(found)
}

/// Sum arrivals over chunks of `resolution` week buckets.
pub fn chunk_arrivals<S: KvStore + ?Sized>(store: &S, resolution: usize) -> Result<Vec<f64>> {
    let buckets: Vec<_> = TimeGrid::week().iter().collect();
    let mut chunks = Vec::with_capacity(buckets.len().div_ceil(resolution.max(1)));
    for chunk in buckets.chunks(resolution.max(1)) {
        let mut grain = 0.0;
        for bucket in chunk {
            match store.get_record::<f64>(bucket.key.as_bytes()) {
                Ok(Some(v)) => grain += v,
                Ok(None) => {}
                Err(e) if e.is_malformed() => log::warn!("skipping bucket {}: {e}", bucket.key),
                Err(e) => return Err(e),
            }
        }
        chunks.push(grain);
    }
    Ok(chunks)
}

/// Three-point mean on interior points, scaled so the largest raw chunk
/// (at least 1) maps to [`PLOT_RANGE`].
pub fn plot_values(chunks: &[f64]) -> Vec<f64> {
    let max = chunks.iter().copied().fold(1.0_f64, f64::max);
    let n = chunks.len();
    (0..n)
        .map(|i| {
            let v = if i > 0 && i + 1 < n {
                (chunks[i - 1] + chunks[i] + chunks[i + 1]) / 3.0
            } else {
                chunks[i]
            };
            v / max * PLOT_RANGE
        })
        .collect()
}

/// Write one `<store name>.cfenv` plot per arrival store.
///
/// A store that cannot be opened is skipped with a warning.
pub fn write_arrival_plots(
    workdir: &Path,
    prefix: &str,
    dir: &Path,
    resolution: usize,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for path in discover_stores(workdir, prefix)? {
        let chunks = match with_store(&path, StoreMode::ReadOnly, |s| chunk_arrivals(&*s, resolution)) {
            Ok(c) => c,
            Err(e @ ReportError::StoreUnavailable { .. }) => {
                log::warn!("{e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out = dir.join(format!("{name}.cfenv"));
        log::info!("{name}: {} data points", chunks.len());

        let mut text = String::new();
        for (i, v) in plot_values(&chunks).iter().enumerate() {
            text.push_str(&format!("{i} {v:.6}\n"));
        }
        std::fs::File::create(&out)
            .and_then(|mut f| f.write_all(text.as_bytes()))
            .map_err(|e| ReportError::output(&out, e))?;
        written.push(out);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::timegrid::{BUCKETS_PER_WEEK, MEASURE_INTERVAL, MONDAY_MORNING, bucket_key};

    #[test]
    fn test_chunk_sums_and_missing_as_zero() {
        let mut store = MemoryStore::new();
        store.put_record(bucket_key(MONDAY_MORNING).as_bytes(), &2.0f64).unwrap();
        store
            .put_record(bucket_key(MONDAY_MORNING + MEASURE_INTERVAL).as_bytes(), &3.0f64)
            .unwrap();
        let chunks = chunk_arrivals(&store, 12).unwrap();
        assert_eq!(chunks.len(), BUCKETS_PER_WEEK / 12);
        assert_eq!(chunks[0], 5.0);
        assert!(chunks[1..].iter().all(|&c| c == 0.0));

        let fine = chunk_arrivals(&store, 1).unwrap();
        assert_eq!(fine.len(), BUCKETS_PER_WEEK);
        assert_eq!(&fine[..3], &[2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_plot_values_smooth_and_scale() {
        let v = plot_values(&[3.0, 6.0, 0.0, 3.0]);
        assert_eq!(v[0], 25.0);
        assert_eq!(v[1], 25.0);
        assert_eq!(v[2], 25.0);
        assert_eq!(v[3], 25.0);
    }

    #[test]
    fn test_plot_values_floor_max() {
        // Below the unit floor nothing is stretched.
        let v = plot_values(&[0.5, 0.0]);
        assert_eq!(v, vec![25.0, 0.0]);
        assert!(plot_values(&[]).is_empty());
    }

    #[test]
    fn test_write_plots_for_scan_stores() {
        let tmp = tempfile::tempdir().unwrap();
        let workdir = tmp.path().join("work");
        let out = tmp.path().join("out");
        std::fs::create_dir_all(&workdir).unwrap();
        std::fs::create_dir_all(&out).unwrap();

        with_store(&workdir.join("scan:etc"), StoreMode::ReadWrite, |s| {
            s.put_record(bucket_key(MONDAY_MORNING).as_bytes(), &4.0f64)
        })
        .unwrap();
        std::fs::write(workdir.join("other.db"), b"").unwrap();

        let written = write_arrival_plots(&workdir, "scan:", &out, 12).unwrap();
        assert_eq!(written, vec![out.join("scan:etc.cfenv")]);
        let text = std::fs::read_to_string(&written[0]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 168);
        assert_eq!(lines[0], "0 50.000000");
        assert_eq!(lines[1], "1 16.666667");
        assert_eq!(lines[2], "2 0.000000");
    }

    #[test]
    fn test_unreadable_scan_store_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("scan:bogus"), b"not a database").unwrap();
        let written = write_arrival_plots(tmp.path(), "scan:", tmp.path(), 12).unwrap();
        assert!(written.is_empty());
    }
}
