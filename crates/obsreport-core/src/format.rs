//! Small formatting helpers shared by the ledger reports.

use chrono::DateTime;

/// Seconds per hour, the unit of last-seen dashboards.
pub const TICKS_PER_HOUR: f64 = 3600.0;

/// Seconds per minute, the unit of performance dashboards.
pub const TICKS_PER_MINUTE: f64 = 60.0;

/// Human-readable UTC time without seconds or year, e.g. `Thu Jan  1 00:00`.
pub fn short_time(t: i64) -> String {
    match DateTime::from_timestamp(t, 0) {
        Some(dt) => dt.format("%a %b %e %H:%M").to_string(),
        None => format!("@{t}"),
    }
}

/// Compact stamp for directory names, e.g. `2026-02-15T013000Z`.
pub fn compact_stamp(t: i64) -> String {
    match DateTime::from_timestamp(t, 0) {
        Some(dt) => dt.format("%Y-%m-%dT%H%M%SZ").to_string(),
        None => t.to_string(),
    }
}

/// Convert raw ticks to hours.
pub fn hours(ticks: f64) -> f64 {
    ticks / TICKS_PER_HOUR
}

/// Convert raw ticks to minutes.
pub fn minutes(ticks: f64) -> f64 {
    ticks / TICKS_PER_MINUTE
}

/// Standard deviation from a stored variance.
pub fn stddev(var: f64) -> f64 {
    var.max(0.0).sqrt()
}

/// Shorten long addresses (IPv6) to their tail so columns stay aligned.
pub fn short_address(addr: &str) -> String {
    if addr.chars().count() > 15 {
        let tail: String = addr
            .chars()
            .rev()
            .take(10)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{tail}")
    } else {
        addr.to_string()
    }
}

/// Insert `<br>` after punctuation once a line passes `width - 5` characters.
/// Character entities (`&lt;`) are never split.
pub fn wrap_markup(s: &str, width: usize) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    let mut count = 0usize;
    let mut in_entity = false;
    for c in s.chars() {
        out.push(c);
        count += 1;
        match c {
            '&' => in_entity = true,
            ';' if in_entity => {
                in_entity = false;
                continue;
            }
            _ => {}
        }
        if !in_entity && count > width.saturating_sub(5) && c.is_ascii_punctuation() {
            out.push_str("<br>");
            count = 0;
        }
    }
    out
}

/// Make an arbitrary identity usable as a file name component.
pub fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}
