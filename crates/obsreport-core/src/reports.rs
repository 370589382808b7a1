//! Ledger reports.
//!
//! The agent keeps several small ledgers next to the averages store: peers
//! last seen, promise performance, class probabilities, locks and the promise
//! audit trail. Each `scan_*` function walks one ledger in store order and
//! turns its entries into rendered [`Record`]s.
//!
//! With purging enabled, expired entries are collected as the cursor is read
//! and handed back in [`LedgerScan::expired`]; [`delete_expired`] removes
//! them once the cursor is gone. Expired entries are never rendered.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};
use crate::format::{TICKS_PER_HOUR, TICKS_PER_MINUTE, short_address, short_time};
use crate::records::{AuditLog, Event, LockData, QPoint, Record as StoredRecord, decode};
use crate::reliability::HostResolver;
use crate::render::{Cell, Document, Field, OutputMode, Record, render};
use crate::store::KvStore;
use crate::timegrid::WEEK;

/// Classes shown at most.
pub const MAX_CLASSES: usize = 1024;

/// Width at which audit text is wrapped in HTML.
pub const AUDIT_WRAP: usize = 40;

/// Age after which last-seen and performance entries expire.
pub const LEDGER_EXPIRY: i64 = WEEK;

/// Age after which class entries expire.
pub const CLASS_EXPIRY: i64 = 52 * WEEK;

/// Longest believable promise run time.
pub const MAX_PERFORMANCE: f64 = (4 * WEEK) as f64;

/// Rendered rows of one ledger and the keys due for deletion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerScan {
    pub records: Vec<Record>,
    pub expired: Vec<Vec<u8>>,
}

/// Decode every entry of `store`, skipping malformed ones with a warning.
fn entries<S, T>(store: &S) -> Result<Vec<(String, T)>>
where
    S: KvStore + ?Sized,
    T: StoredRecord,
{
    let mut out = Vec::new();
    for (key, raw) in store.cursor()? {
        match decode::<T>(&key, &raw) {
            Ok(value) => out.push((String::from_utf8_lossy(&key).into_owned(), value)),
            Err(e) => log::warn!("{e}"),
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Last seen
// ---------------------------------------------------------------------------

/// Peers and how long ago they were last in contact.
pub fn scan_last_seen<S: KvStore + ?Sized>(
    store: &S,
    now: i64,
    purge: bool,
    resolver: &dyn HostResolver,
) -> Result<LedgerScan> {
    let mut scan = LedgerScan::default();
    for (key, point) in entries::<S, QPoint>(store)? {
        let then = point.q;
        if purge && now as f64 - then > LEDGER_EXPIRY as f64 {
            log::info!("deleting expired entry for {key}");
            scan.expired.push(key.into_bytes());
            continue;
        }

        let mut chars = key.chars();
        let pm = chars.next().map(String::from).unwrap_or_default();
        let address = chars.as_str();
        let host = resolver.resolve(address);
        let date = short_time(then as i64);
        let ago = (now as f64 - then) / TICKS_PER_HOUR;
        let average = point.expect / TICKS_PER_HOUR;
        let deviation = point.stddev() / TICKS_PER_HOUR;

        let text = format!(
            "IP {pm} {host:>25.25} {:>15.15}  @ [{date}] not seen for ({ago:.2}) hrs, Av {average:.2} +/- {deviation:.2} hrs",
            short_address(address)
        );
        scan.records.push(
            Record::new(text)
                .cell(Cell::new(Field::Pm, pm))
                .cell(Cell::new(Field::Host, host))
                .cell(Cell::new(Field::Ip, address))
                .cell(Cell::new(Field::Date, date).labelled(" Last seen at ", ""))
                .cell(Cell::new(Field::Q, format!("{ago:.2}")).labelled(" ", " hrs ago "))
                .cell(Cell::new(Field::Average, format!("{average:.2}")).labelled(" Av ", " hrs "))
                .cell(
                    Cell::new(Field::Deviation, format!("{deviation:.2}"))
                        .labelled(" &plusmn; ", " hrs "),
                ),
        );
    }
    Ok(scan)
}

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

/// Time taken by each promise the last time it was kept.
pub fn scan_performance<S: KvStore + ?Sized>(store: &S, now: i64, purge: bool) -> Result<LedgerScan> {
    let mut scan = LedgerScan::default();
    for (key, event) in entries::<S, Event>(store)? {
        if purge {
            if now.saturating_sub(event.t) > LEDGER_EXPIRY {
                log::info!("deleting expired entry for {key}");
                scan.expired.push(key.into_bytes());
                continue;
            }
            let q = &event.q;
            if q.q < 0.0 || q.expect < 0.0 || q.q > MAX_PERFORMANCE {
                log::info!("deleting entry for {key}: implausible run time {:.1}s", q.q);
                scan.expired.push(key.into_bytes());
                continue;
            }
        }

        let date = short_time(event.t);
        let measure = event.q.q / TICKS_PER_MINUTE;
        let average = event.q.expect / TICKS_PER_MINUTE;
        let deviation = event.q.stddev() / TICKS_PER_MINUTE;

        let text = format!(
            "({measure:7.4} mins @ {date}) Av {average:7.4} +/- {deviation:7.4} for {key} "
        );
        scan.records.push(
            Record::new(text)
                .cell(Cell::new(Field::Event, key))
                .cell(Cell::new(Field::Date, date).labelled(" last performed at ", ""))
                .cell(
                    Cell::new(Field::Q, format!("{measure:.4}"))
                        .labelled(" completed in ", " mins "),
                )
                .cell(Cell::new(Field::Average, format!("{average:.4}")).labelled(" Av ", " mins "))
                .cell(
                    Cell::new(Field::Deviation, format!("{deviation:.4}"))
                        .labelled(" &plusmn; ", " mins "),
                ),
        );
    }
    Ok(scan)
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

/// Class probabilities, most probable first.
///
/// Ties keep store order. Classes with zero probability are left out and at
/// most [`MAX_CLASSES`] are shown.
pub fn scan_classes<S: KvStore + ?Sized>(store: &S, now: i64, purge: bool) -> Result<LedgerScan> {
    let mut scan = LedgerScan::default();
    let mut ranked: Vec<(String, Event)> = Vec::new();
    for (key, event) in entries::<S, Event>(store)? {
        if purge && now.saturating_sub(event.t) > CLASS_EXPIRY {
            log::info!("deleting expired entry for {key}");
            scan.expired.push(key.into_bytes());
            continue;
        }
        ranked.push((key, event));
    }

    ranked.sort_by(|a, b| b.1.q.expect.total_cmp(&a.1.q.expect));
    ranked.retain(|(_, e)| e.q.expect > 0.0);
    ranked.truncate(MAX_CLASSES);

    for (name, event) in ranked {
        let date = short_time(event.t);
        let probability = event.q.expect;
        let deviation = event.q.stddev();
        let text = format!(
            "Probability {probability:7.4} +/- {deviation:7.4} for {name} (last observed @ {date})"
        );
        scan.records.push(
            Record::new(text)
                .cell(Cell::new(Field::Event, name))
                .cell(Cell::new(Field::Date, date).labelled(" last occurred at ", ""))
                .cell(
                    Cell::new(Field::Average, format!("{probability:.4}"))
                        .labelled(" Probability ", " "),
                )
                .cell(
                    Cell::new(Field::Deviation, format!("{deviation:.4}"))
                        .labelled(" &plusmn; ", " "),
                ),
        );
    }
    Ok(scan)
}

// ---------------------------------------------------------------------------
// Locks
// ---------------------------------------------------------------------------

/// Key prefix of held locks.
pub const ACTIVE_LOCK_PREFIX: &str = "lock";

/// Key prefix of last-run markers.
pub const LAST_LOCK_PREFIX: &str = "last";

/// Held locks (`active`) or last-run markers of every lock.
pub fn scan_locks<S: KvStore + ?Sized>(store: &S, active: bool) -> Result<LedgerScan> {
    let prefix = if active { ACTIVE_LOCK_PREFIX } else { LAST_LOCK_PREFIX };
    let mut scan = LedgerScan::default();
    for (key, lock) in entries::<S, LockData>(store)? {
        if !key.starts_with(prefix) {
            continue;
        }
        let date = short_time(lock.time);
        scan.records.push(
            Record::new(format!("{key} = {date}"))
                .cell(Cell::new(Field::Filename, key))
                .cell(Cell::new(Field::Date, date)),
        );
    }
    Ok(scan)
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Column headings of the HTML audit table.
pub const AUDIT_HEADINGS: [&str; 7] = [
    "t-index",
    "Scan convergence",
    "Observed",
    "Promise made",
    "Promise originates in",
    "Promise version",
    "line",
];

const AUDIT_RULE: &str = ". . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . .";

fn audit_text(entry: &AuditLog) -> String {
    let mut text = format!(
        "{AUDIT_RULE}\nConverge '{}' {}",
        entry.operator,
        entry.status.message()
    );
    if !entry.comment.is_empty() {
        text.push_str(&format!("\nComment: {}", entry.comment));
    }
    if entry.filename == "Terminal" {
        if entry.comment.contains("closing") {
            text.push_str(&format!("\n\n{}\n", "=".repeat(95)));
        }
    } else if entry.version.is_empty() {
        text.push_str(&format!(
            "\nPromised in {} (unnamed version last edited at {}) at/before line {}",
            entry.filename, entry.date, entry.lineno
        ));
    } else {
        text.push_str(&format!(
            "\nPromised in {} (version {} last edited at {}) at/before line {}",
            entry.filename, entry.version, entry.date, entry.lineno
        ));
    }
    text
}

/// The promise audit trail in store order.
pub fn scan_audit<S: KvStore + ?Sized>(store: &S) -> Result<LedgerScan> {
    let mut scan = LedgerScan::default();
    for (key, entry) in entries::<S, AuditLog>(store)? {
        let event = format!("{}, {}", entry.operator, entry.status.message());
        scan.records.push(
            Record::new(audit_text(&entry))
                .cell(Cell::new(Field::Index, key))
                .cell(Cell::new(Field::Event, event).wrapped(AUDIT_WRAP))
                .cell(Cell::new(Field::Q, entry.comment.clone()).wrapped(AUDIT_WRAP))
                .cell(Cell::new(Field::Date, entry.date.clone()))
                .cell(Cell::new(Field::Average, entry.filename.clone()))
                .cell(Cell::new(Field::Version, entry.version.clone()))
                .cell(Cell::new(Field::Reference, entry.lineno.to_string())),
        );
    }
    Ok(scan)
}

// ---------------------------------------------------------------------------
// Purge and output
// ---------------------------------------------------------------------------

/// Delete `keys` from `store`. Returns how many were deleted.
pub fn delete_expired<S: KvStore + ?Sized>(store: &mut S, keys: &[Vec<u8>]) -> Result<usize> {
    for key in keys {
        store.delete(key)?;
    }
    if !keys.is_empty() {
        log::info!("purged {} expired entries", keys.len());
    }
    Ok(keys.len())
}

/// Render `records` into `<dir>/<name>.<ext>`.
pub fn write_report(
    dir: &Path,
    name: &str,
    mode: OutputMode,
    doc: &Document,
    records: Vec<Record>,
) -> Result<PathBuf> {
    let path = dir.join(format!("{name}.{}", mode.extension()));
    let file = File::create(&path).map_err(|e| ReportError::output(&path, e))?;
    let mut out = BufWriter::new(file);
    render(&mut out, mode, doc, records)
        .and_then(|()| out.flush())
        .map_err(|e| ReportError::output(&path, e))?;
    log::debug!("wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::AuditStatus;
    use crate::reliability::IdentityResolver;
    use crate::render::render_to_string;
    use crate::store::{MemoryStore, RecordStore};

    const NOW: i64 = 10 * WEEK;

    fn event(t: i64, q: f64, expect: f64, var: f64) -> Event {
        Event {
            t,
            q: QPoint::new(q, expect, var),
        }
    }

    fn texts(scan: &LedgerScan) -> Vec<String> {
        scan.records.iter().map(|r| r.text.clone()).collect()
    }

    // -----------------------------------------------------------------------
    // Last seen
    // -----------------------------------------------------------------------

    #[test]
    fn test_last_seen_text_line() {
        let mut store = MemoryStore::new();
        let then = (NOW - 2 * 3600) as f64;
        store
            .put_record(b"+10.0.0.1", &QPoint::new(then, 7200.0, 3600.0 * 3600.0))
            .unwrap();
        let scan = scan_last_seen(&store, NOW, false, &IdentityResolver).unwrap();
        assert_eq!(scan.records.len(), 1);
        let line = &scan.records[0].text;
        assert!(line.starts_with("IP + "));
        assert!(line.contains("10.0.0.1  @ ["));
        assert!(line.ends_with("not seen for (2.00) hrs, Av 2.00 +/- 1.00 hrs"));
    }

    #[test]
    fn test_last_seen_html_labels() {
        let mut store = MemoryStore::new();
        store
            .put_record(b"-hostB", &QPoint::new(NOW as f64, 0.0, 0.0))
            .unwrap();
        let scan = scan_last_seen(&store, NOW, false, &IdentityResolver).unwrap();
        let html = render_to_string(OutputMode::Html, &Document::default(), scan.records);
        assert!(html.contains("<td bgcolor=#add8e6>-</td>"));
        assert!(html.contains(" 0.00 hrs ago "));
        assert!(html.contains(" &plusmn; 0.00 hrs "));
    }

    #[test]
    fn test_last_seen_purge_is_deferred() {
        let mut store = MemoryStore::new();
        store
            .put_record(b"+old", &QPoint::new((NOW - 2 * WEEK) as f64, 0.0, 0.0))
            .unwrap();
        store
            .put_record(b"+new", &QPoint::new((NOW - 60) as f64, 0.0, 0.0))
            .unwrap();

        let scan = scan_last_seen(&store, NOW, true, &IdentityResolver).unwrap();
        assert_eq!(scan.expired, vec![b"+old".to_vec()]);
        assert_eq!(scan.records.len(), 1);
        // Nothing deleted until asked.
        assert_eq!(store.len(), 2);
        assert_eq!(delete_expired(&mut store, &scan.expired).unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Performance
    // -----------------------------------------------------------------------

    #[test]
    fn test_performance_minutes() {
        let mut store = MemoryStore::new();
        store
            .put_record(b"backup", &event(NOW, 120.0, 90.0, 3600.0))
            .unwrap();
        let scan = scan_performance(&store, NOW, false).unwrap();
        assert_eq!(
            texts(&scan)[0],
            format!(
                "( 2.0000 mins @ {}) Av  1.5000 +/-  1.0000 for backup ",
                short_time(NOW)
            )
        );
    }

    #[test]
    fn test_performance_purges_implausible() {
        let mut store = MemoryStore::new();
        store.put_record(b"a-ok", &event(NOW, 10.0, 10.0, 0.0)).unwrap();
        store.put_record(b"b-neg", &event(NOW, -1.0, 10.0, 0.0)).unwrap();
        store
            .put_record(b"c-long", &event(NOW, MAX_PERFORMANCE + 1.0, 10.0, 0.0))
            .unwrap();
        store
            .put_record(b"d-old", &event(NOW - 2 * WEEK, 10.0, 10.0, 0.0))
            .unwrap();
        let scan = scan_performance(&store, NOW, true).unwrap();
        assert_eq!(scan.records.len(), 1);
        assert_eq!(
            scan.expired,
            vec![b"b-neg".to_vec(), b"c-long".to_vec(), b"d-old".to_vec()]
        );
        // Without purge everything is shown.
        assert_eq!(scan_performance(&store, NOW, false).unwrap().records.len(), 4);
    }

    // -----------------------------------------------------------------------
    // Classes
    // -----------------------------------------------------------------------

    #[test]
    fn test_classes_ranked_stable_and_filtered() {
        let mut store = MemoryStore::new();
        store.put_record(b"alpha", &event(NOW, 0.0, 0.5, 0.0)).unwrap();
        store.put_record(b"beta", &event(NOW, 0.0, 0.9, 0.0)).unwrap();
        store.put_record(b"gamma", &event(NOW, 0.0, 0.5, 0.0)).unwrap();
        store.put_record(b"zero", &event(NOW, 0.0, 0.0, 0.0)).unwrap();
        let scan = scan_classes(&store, NOW, false).unwrap();
        let names: Vec<&str> = scan
            .records
            .iter()
            .map(|r| r.cells[0].value.as_str())
            .collect();
        assert_eq!(names, vec!["beta", "alpha", "gamma"]);
        assert!(scan.records[0].text.starts_with("Probability  0.9000 +/-  0.0000 for beta"));
    }

    #[test]
    fn test_classes_truncated() {
        let mut store = MemoryStore::new();
        for i in 0..(MAX_CLASSES + 10) {
            store
                .put_record(format!("c{i:05}").as_bytes(), &event(NOW, 0.0, 1.0, 0.0))
                .unwrap();
        }
        let scan = scan_classes(&store, NOW, false).unwrap();
        assert_eq!(scan.records.len(), MAX_CLASSES);
    }

    #[test]
    fn test_classes_expire_after_a_year() {
        let mut store = MemoryStore::new();
        store
            .put_record(b"ancient", &event(NOW - 53 * WEEK, 0.0, 1.0, 0.0))
            .unwrap();
        store
            .put_record(b"recent", &event(NOW - 2 * WEEK, 0.0, 1.0, 0.0))
            .unwrap();
        let scan = scan_classes(&store, NOW, true).unwrap();
        assert_eq!(scan.expired, vec![b"ancient".to_vec()]);
        assert_eq!(scan.records.len(), 1);
    }

    #[test]
    fn test_purge_with_extreme_event_times() {
        let mut store = MemoryStore::new();
        store.put_record(b"early", &event(i64::MIN, 1.0, 1.0, 0.0)).unwrap();
        store.put_record(b"late", &event(i64::MAX, 1.0, 1.0, 0.0)).unwrap();

        let perf = scan_performance(&store, NOW, true).unwrap();
        assert_eq!(perf.expired, vec![b"early".to_vec()]);
        assert_eq!(perf.records.len(), 1);

        let classes = scan_classes(&store, NOW, true).unwrap();
        assert_eq!(classes.expired, vec![b"early".to_vec()]);
        assert_eq!(classes.records.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Locks and audit
    // -----------------------------------------------------------------------

    #[test]
    fn test_locks_filter_by_prefix() {
        let mut store = MemoryStore::new();
        let lock = LockData { pid: 42, time: 0 };
        store.put_record(b"lock.files.check", &lock).unwrap();
        store.put_record(b"last.files.check", &lock).unwrap();
        store.put_record(b"other", &lock).unwrap();

        let active = scan_locks(&store, true).unwrap();
        assert_eq!(texts(&active), vec!["lock.files.check = Thu Jan  1 00:00"]);
        let all = scan_locks(&store, false).unwrap();
        assert_eq!(texts(&all), vec!["last.files.check = Thu Jan  1 00:00"]);
    }

    #[test]
    fn test_audit_text_and_cells() {
        let mut store = MemoryStore::new();
        let entry = AuditLog {
            operator: "files:/etc/motd".into(),
            comment: "edited".into(),
            filename: "promises.cf".into(),
            date: "Mon Feb  2 10:00".into(),
            version: "1.2".into(),
            lineno: 17,
            status: AuditStatus::Repaired,
        };
        store.put_record(b"0001", &entry).unwrap();
        let scan = scan_audit(&store).unwrap();
        let text = &scan.records[0].text;
        assert!(text.contains("Converge 'files:/etc/motd' Promise repaired"));
        assert!(text.contains("Comment: edited"));
        assert!(text.ends_with(
            "Promised in promises.cf (version 1.2 last edited at Mon Feb  2 10:00) at/before line 17"
        ));
        let xml = render_to_string(OutputMode::Xml, &Document::default(), scan.records);
        assert!(xml.contains("<index>\n0001\n</index>"));
        assert!(xml.contains("<ref>\n17\n</ref>"));
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let mut store = MemoryStore::new();
        store.put(b"+bad", b"not json").unwrap();
        store
            .put_record(b"+good", &QPoint::new(NOW as f64, 0.0, 0.0))
            .unwrap();
        let scan = scan_last_seen(&store, NOW, false, &IdentityResolver).unwrap();
        assert_eq!(scan.records.len(), 1);
    }

    #[test]
    fn test_write_report_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_report(
            tmp.path(),
            "classes",
            OutputMode::Xml,
            &Document::default(),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(path, tmp.path().join("classes.xml"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "<?xml version=\"1.0\"?>\n<output>\n</output>\n"
        );
    }
}
