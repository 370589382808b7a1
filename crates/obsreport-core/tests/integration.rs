//! Integration tests for obsreport-core.
//!
//! These exercise whole passes the way the CLI drives them:
//! store on disk → time grid walk → engine → files in the output directory.

use std::path::Path;

use obsreport_core::aggregate::{COARSE_RESOLUTION, EXTREMA_CEILING, EXTREMA_FLOOR};
use obsreport_core::timegrid::{BUCKETS_PER_WEEK, HOUR, MEASURE_INTERVAL, MONDAY_MORNING, WEEK};
use obsreport_core::{
    Averages, Event, GRAINS, HistogramTable, IdentityResolver, MemoryStore, OBSERVABLE_COUNT,
    OBSERVABLES, OutputMode, QPoint, RecordStore, ReportConfig, ReportKind, Scaling, StoreMode,
    TimeGrid, bucket_index, bucket_key, collapse_week, compute_extrema, compute_series,
    discover_peers, peer_series, run_all, run_erase, smooth, with_store,
};

const NOW: i64 = MONDAY_MORNING + 3 * WEEK + 10 * HOUR;

fn config(workdir: &Path) -> ReportConfig {
    ReportConfig {
        workdir: workdir.to_path_buf(),
        output_dir: Some(workdir.join("out")),
        host_name: Some("agent.example.org".into()),
        now: Some(NOW),
        ..Default::default()
    }
}

fn constant_week<S: RecordStore + ?Sized>(store: &mut S, point: QPoint) {
    for bucket in TimeGrid::week().iter() {
        store
            .put_record(bucket.key.as_bytes(), &Averages::filled(point))
            .unwrap();
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

// ---------------------------------------------------------------------------
// Time grid
// ---------------------------------------------------------------------------

#[test]
fn times_in_one_window_share_a_key() {
    let t = MONDAY_MORNING + 2 * HOUR + 10 * 60;
    assert_eq!(bucket_key(t), bucket_key(t + MEASURE_INTERVAL - 1));
    assert_eq!(bucket_key(t), bucket_key(t + 5 * WEEK));
    assert_ne!(bucket_key(t), bucket_key(t + MEASURE_INTERVAL));
    assert_eq!(bucket_key(t).as_str(), "Mon:Hr02:Min10_15");
}

#[test]
fn week_grid_visits_every_bucket_once() {
    let keys: std::collections::HashSet<_> = TimeGrid::week().iter().map(|b| b.key).collect();
    assert_eq!(keys.len(), BUCKETS_PER_WEEK);
    assert_eq!(bucket_index(MONDAY_MORNING + WEEK - 1), BUCKETS_PER_WEEK - 1);
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[test]
fn empty_week_keeps_sentinels() {
    let extrema = compute_extrema(&MemoryStore::new()).unwrap();
    assert!(extrema.is_empty());
    for (max, min) in extrema.max.q.iter().zip(extrema.min.q.iter()) {
        assert_eq!(max.expect, EXTREMA_FLOOR);
        assert_eq!(min.expect, EXTREMA_CEILING);
    }
}

#[test]
fn constant_week_normalizes_to_one() {
    let mut store = MemoryStore::new();
    constant_week(&mut store, QPoint::new(10.0, 10.0, 4.0));

    let extrema = compute_extrema(&store).unwrap();
    assert_eq!(extrema.samples, BUCKETS_PER_WEEK);
    assert_eq!(extrema.max.q[0].expect, 10.0);
    assert_eq!(extrema.min.q[0].expect, 10.0);

    let series = compute_series(
        &store,
        &TimeGrid::week(),
        &extrema,
        COARSE_RESOLUTION,
        Scaling::Scaled,
    )
    .unwrap();
    assert_eq!(series.points.len(), BUCKETS_PER_WEEK / COARSE_RESOLUTION);
    assert_eq!(series.points.last().map(|p| p.index), Some(BUCKETS_PER_WEEK));
    for point in &series.points {
        for obs in 0..OBSERVABLE_COUNT {
            let n = series.normalized(point, obs);
            assert!((n.expect - 1.0).abs() < 1e-9, "expect {}", n.expect);
            assert!((point.mean.q[obs].stddev() - 2.0).abs() < 1e-9);
        }
    }
}

// ---------------------------------------------------------------------------
// Histograms
// ---------------------------------------------------------------------------

#[test]
fn constant_histogram_collapses_to_seven_times() {
    let mut table = HistogramTable::default();
    for obs in 0..OBSERVABLE_COUNT {
        for day in 0..7 {
            for k in 0..GRAINS {
                table.set(obs, day, k, 3);
            }
        }
    }
    let parsed = HistogramTable::parse(&table.to_text()).unwrap();
    let weekly = collapse_week(&smooth(&parsed, false));
    assert_eq!(weekly.len(), OBSERVABLE_COUNT);
    assert!(weekly.iter().all(|row| row.iter().all(|&c| c == 21)));

    let zero = collapse_week(&smooth(&HistogramTable::default(), false));
    assert!(zero.iter().all(|row| row.iter().all(|&c| c == 0)));
}

// ---------------------------------------------------------------------------
// Reliability
// ---------------------------------------------------------------------------

#[test]
fn silent_peer_drifts_to_two_weeks() {
    let series = peer_series::<MemoryStore>("quiet.example.org", None).unwrap();
    assert_eq!(series.last_seen.len(), BUCKETS_PER_WEEK);
    assert_eq!(series.last_seen[0], (0, WEEK + MEASURE_INTERVAL));
    assert_eq!(series.last_seen.last().map(|p| p.1), Some(2 * WEEK));
    assert!(series.expected.is_empty());
}

#[test]
fn both_directions_are_one_peer() {
    let mut ledger = MemoryStore::new();
    ledger.put_record(b"+hostA", &QPoint::new(0.0, 0.0, 0.0)).unwrap();
    ledger.put_record(b"-hostA", &QPoint::new(0.0, 0.0, 0.0)).unwrap();
    ledger.put_record(b"-hostB", &QPoint::new(0.0, 0.0, 0.0)).unwrap();
    let peers = discover_peers(&ledger, &IdentityResolver).unwrap();
    assert_eq!(peers, vec!["hostA".to_string(), "hostB".to_string()]);
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[test]
fn performance_report_reads_back() {
    let tmp = tempfile::tempdir().unwrap();
    let mut c = config(tmp.path());
    c.reports = vec![ReportKind::Performance];
    with_store(&c.store_path(&c.stores.performance), StoreMode::ReadWrite, |s| {
        s.put_record(
            b"backup",
            &Event {
                t: NOW - HOUR,
                q: QPoint::new(120.0, 60.0, 3600.0),
            },
        )
    })
    .unwrap();

    let outcomes = run_all(&c, &IdentityResolver).unwrap();
    assert!(outcomes[0].result.is_ok());
    let text = read(&tmp.path().join("out/performance.txt"));
    let line = text.lines().next().unwrap();
    let measure: f64 = line
        .trim_start_matches('(')
        .split_whitespace()
        .next()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(measure, 2.0);
    assert!(line.ends_with("Av  1.0000 +/-  1.0000 for backup "), "{line}");
}

#[test]
fn html_report_is_a_document() {
    let tmp = tempfile::tempdir().unwrap();
    let mut c = config(tmp.path());
    c.mode = OutputMode::Html;
    c.reports = vec![ReportKind::LastSeen];
    with_store(&c.store_path(&c.stores.last_seen), StoreMode::ReadWrite, |s| {
        s.put_record(b"+10.0.0.1", &QPoint::new((NOW - 2 * HOUR) as f64, 3600.0, 0.0))
    })
    .unwrap();

    run_all(&c, &IdentityResolver).unwrap();
    let html = read(&tmp.path().join("out/lastseen.html"));
    assert!(html.starts_with("<html>"));
    assert!(html.contains("Peers as last seen by agent.example.org"));
    assert!(html.contains("10.0.0.1"));
    assert!(html.trim_end().ends_with("</html>"));
}

#[test]
fn monitor_history_writes_every_plot() {
    let tmp = tempfile::tempdir().unwrap();
    let mut c = config(tmp.path());
    c.reports = vec![ReportKind::MonitorHistory];
    std::fs::create_dir_all(tmp.path().join("state")).unwrap();

    with_store(&c.store_path(&c.stores.averages), StoreMode::ReadWrite, |s| {
        constant_week(s, QPoint::new(5.0, 4.0, 1.0));
        Ok(())
    })
    .unwrap();
    std::fs::write(
        c.store_path(&c.stores.histograms),
        HistogramTable::default().to_text(),
    )
    .unwrap();
    with_store(&tmp.path().join("scan:root"), StoreMode::ReadWrite, |s| {
        s.put_record(bucket_key(MONDAY_MORNING).as_bytes(), &7.0_f64)
    })
    .unwrap();
    with_store(&c.store_path(&c.stores.last_seen), StoreMode::ReadWrite, |s| {
        s.put_record(b"+hostA", &QPoint::new(0.0, 0.0, 0.0))
    })
    .unwrap();
    with_store(
        &c.store_path(&c.stores.peer_history("hostA")),
        StoreMode::ReadWrite,
        |s| s.put_record(bucket_key(MONDAY_MORNING).as_bytes(), &QPoint::new(0.0, 600.0, 0.0)),
    )
    .unwrap();

    let outcomes = run_all(&c, &IdentityResolver).unwrap();
    let written = outcomes[0].result.as_ref().unwrap();
    // Three matrices, E-sigma and q per observable, distributions, one
    // arrival plot and two peer files.
    assert_eq!(written.len(), 3 + 3 * OBSERVABLE_COUNT + 1 + 2);

    let out = tmp.path().join("out");
    let average = read(&out.join("cfenv-average"));
    assert_eq!(average.lines().count(), BUCKETS_PER_WEEK / COARSE_RESOLUTION);
    let first = average.lines().next().unwrap();
    assert!(first.starts_with("12 1.000000 "), "{first}");

    let users = read(&out.join(format!("{}.E-sigma", OBSERVABLES[0].name)));
    assert!(users.lines().all(|l| l.ends_with(" 4.000000 1.000000")));

    let distr = read(&out.join(format!("{}.distr", OBSERVABLES[0].name)));
    assert_eq!(distr.lines().count(), GRAINS);

    let arrivals = read(&out.join("scan:root.cfenv"));
    assert_eq!(arrivals.lines().next(), Some("0 50.000000"));

    let seen = read(&out.join("lastseen-hostA.q"));
    assert_eq!(seen.lines().next(), Some(format!("0 {MONDAY_MORNING}").as_str()));
    let esigma = read(&out.join("lastseen-hostA.E-sigma"));
    assert_eq!(esigma.lines().collect::<Vec<_>>(), vec!["0 600.000000 0.000000"]);
}

#[test]
fn erase_clears_only_named_observables() {
    let tmp = tempfile::tempdir().unwrap();
    let mut c = config(tmp.path());
    std::fs::create_dir_all(tmp.path().join("state")).unwrap();
    let path = c.store_path(&c.stores.averages);
    with_store(&path, StoreMode::ReadWrite, |s| {
        constant_week(s, QPoint::new(1.0, 1.0, 1.0));
        Ok(())
    })
    .unwrap();

    c.erase = vec![OBSERVABLES[0].name.to_string()];
    assert_eq!(run_erase(&c).unwrap(), BUCKETS_PER_WEEK);

    let sample = with_store(&path, StoreMode::ReadOnly, |s| {
        s.get_record::<Averages>(bucket_key(MONDAY_MORNING).as_bytes())
    })
    .unwrap()
    .unwrap();
    assert_eq!(sample.q[0], QPoint::new(1.0, 0.0, 0.0));
    assert_eq!(sample.q[1], QPoint::new(1.0, 1.0, 1.0));
}

#[test]
fn erase_requires_existing_store() {
    let tmp = tempfile::tempdir().unwrap();
    let mut c = config(tmp.path());
    c.erase = vec![OBSERVABLES[0].name.to_string()];
    assert!(run_erase(&c).is_err());
    assert!(!c.store_path(&c.stores.averages).exists());
}
