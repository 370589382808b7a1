//! Report passes end to end.
//!
//! [`run_report`] executes one [`ReportKind`]: open its store, scan, render,
//! close. Passes share nothing; accumulators live only inside a pass.

use std::path::{Path, PathBuf};

use crate::aggregate::{
    COARSE_RESOLUTION, Extrema, Scaling, compute_extrema, compute_series, database_age,
    erase_history, log_summary, write_graph_files, write_magnify_files,
};
use crate::arrivals::write_arrival_plots;
use crate::config::{ReportConfig, ReportKind};
use crate::error::{ReportError, Result};
use crate::format::short_time;
use crate::histogram::write_histograms;
use crate::observables;
use crate::output::ensure_dir;
use crate::reliability::{HostResolver, write_peer_intermittency};
use crate::render::Document;
use crate::reports::{
    AUDIT_HEADINGS, LedgerScan, delete_expired, scan_audit, scan_classes, scan_last_seen,
    scan_locks, scan_performance, write_report,
};
use crate::store::{SqliteStore, StoreMode, with_store};
use crate::timegrid::{HOUR, TimeGrid};

/// Span of the magnified window before now.
pub const MAGNIFY_SPAN: i64 = 4 * HOUR;

/// Buckets per chunk for the configured resolution.
pub fn resolution(config: &ReportConfig) -> usize {
    if config.high_resolution { 1 } else { COARSE_RESOLUTION }
}

fn document(config: &ReportConfig, title: String) -> Document {
    Document {
        title,
        stylesheet: config.stylesheet.clone(),
        web_driver: config.web_driver.clone(),
        banner: config.banner.clone(),
        column_headings: Vec::new(),
    }
}

fn require_existing(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ReportError::StoreUnavailable {
            path: path.to_path_buf(),
            reason: "no such store".to_string(),
        })
    }
}

/// Scan one ledger. With `purge`, the store is opened read-write and expired
/// keys are deleted after the scan.
fn scan_ledger(
    config: &ReportConfig,
    file: &str,
    purge: bool,
    scan: impl FnOnce(&SqliteStore) -> Result<LedgerScan>,
) -> Result<LedgerScan> {
    let path = config.store_path(file);
    log::info!("reading {}", path.display());
    if !purge {
        return with_store(&path, StoreMode::ReadOnly, |s| scan(&*s));
    }
    require_existing(&path)?;
    with_store(&path, StoreMode::ReadWrite, |s| {
        let result = scan(&*s)?;
        delete_expired(s, &result.expired)?;
        Ok(result)
    })
}

/// Run one report kind, writing into `dir`. Returns the files written.
pub fn run_report(
    config: &ReportConfig,
    kind: ReportKind,
    dir: &Path,
    resolver: &dyn HostResolver,
) -> Result<Vec<PathBuf>> {
    let now = config.now();
    let host = config.host_name();
    let stores = &config.stores;
    let mode = config.mode;

    let (doc, scan) = match kind {
        ReportKind::MonitorHistory => return monitor_history(config, dir, resolver),
        ReportKind::MonitorNow => return monitor_now(config, dir),
        ReportKind::LastSeen => (
            document(config, format!("Peers as last seen by {host}")),
            scan_ledger(config, &stores.last_seen, config.purge, |s| {
                scan_last_seen(s, now, config.purge, resolver)
            })?,
        ),
        ReportKind::Performance => (
            document(config, format!("Promises last kept by {host}")),
            scan_ledger(config, &stores.performance, config.purge, |s| {
                scan_performance(s, now, config.purge)
            })?,
        ),
        ReportKind::Classes => (
            document(
                config,
                format!("Classes last observed on {host} at {}", short_time(now)),
            ),
            scan_ledger(config, &stores.classes, config.purge, |s| {
                scan_classes(s, now, config.purge)
            })?,
        ),
        ReportKind::ActiveLocks | ReportKind::AllLocks => {
            let active = kind == ReportKind::ActiveLocks;
            let label = if active { "active" } else { "all" };
            (
                document(
                    config,
                    format!("{label} lock data observed on {host} at {}", short_time(now)),
                ),
                scan_ledger(config, &stores.locks, false, |s| scan_locks(s, active))?,
            )
        }
        ReportKind::Audit => {
            let mut doc = document(
                config,
                format!("Audit collected on {host} at {}", short_time(now)),
            );
            doc.column_headings = AUDIT_HEADINGS.iter().map(|h| h.to_string()).collect();
            (doc, scan_ledger(config, &stores.audit, false, |s| scan_audit(s))?)
        }
    };

    log::info!("{kind}: {} record(s)", scan.records.len());
    let path = write_report(dir, kind.as_str(), mode, &doc, scan.records)?;
    Ok(vec![path])
}

/// Weekly history: extrema, summary, graph files, histograms, arrival
/// plots and peer intermittency, in that order.
fn monitor_history(
    config: &ReportConfig,
    dir: &Path,
    resolver: &dyn HostResolver,
) -> Result<Vec<PathBuf>> {
    let averages = config.store_path(&config.stores.averages);
    let resolution = resolution(config);
    let scaling = Scaling::from_enabled(config.scaling);

    let series = with_store(&averages, StoreMode::ReadOnly, |s| {
        let extrema = compute_extrema(&*s)?;
        log_summary(&extrema, database_age(&*s)?);
        compute_series(&*s, &TimeGrid::week(), &extrema, resolution, scaling)
    })?;

    let mut written = write_graph_files(&series, dir, config.titles)?;
    written.extend(write_histograms(
        &config.store_path(&config.stores.histograms),
        dir,
        config.high_resolution,
    )?);
    written.extend(write_arrival_plots(
        &config.workdir,
        &config.stores.arrivals_prefix,
        dir,
        resolution,
    )?);
    written.extend(write_peer_intermittency(
        &config.store_path(&config.stores.last_seen),
        |peer| config.store_path(&config.stores.peer_history(peer)),
        resolver,
        dir,
    )?);
    Ok(written)
}

/// The last few hours at full resolution.
fn monitor_now(config: &ReportConfig, dir: &Path) -> Result<Vec<PathBuf>> {
    let averages = config.store_path(&config.stores.averages);
    let grid = TimeGrid::trailing(config.now(), MAGNIFY_SPAN);
    let series = with_store(&averages, StoreMode::ReadOnly, |s| {
        compute_series(&*s, &grid, &Extrema::new(), 1, Scaling::Unscaled)
    })?;
    write_magnify_files(&series, dir)
}

/// Erase the history of the configured observables. Returns rewritten buckets.
pub fn run_erase(config: &ReportConfig) -> Result<usize> {
    let mut indices = Vec::with_capacity(config.erase.len());
    for name in &config.erase {
        let index = observables::index_of(name)
            .ok_or_else(|| ReportError::Config(format!("unknown observable '{name}'")))?;
        indices.push(index);
    }
    let averages = config.store_path(&config.stores.averages);
    require_existing(&averages)?;
    with_store(&averages, StoreMode::ReadWrite, |s| erase_history(s, &indices))
}

/// Outcome of one queued report kind.
#[derive(Debug)]
pub struct KindOutcome {
    pub kind: ReportKind,
    pub result: Result<Vec<PathBuf>>,
}

/// Run every configured kind in order, continuing past failures.
///
/// Fails up front only if the output directory cannot be created.
pub fn run_all(config: &ReportConfig, resolver: &dyn HostResolver) -> Result<Vec<KindOutcome>> {
    let dir = config.output_path();
    ensure_dir(&dir)?;
    let outcomes = config
        .reports
        .iter()
        .map(|&kind| {
            let result = run_report(config, kind, &dir, resolver);
            if let Err(e) = &result {
                log::error!("{kind} failed: {e}");
            }
            KindOutcome { kind, result }
        })
        .collect();
    Ok(outcomes)
}
