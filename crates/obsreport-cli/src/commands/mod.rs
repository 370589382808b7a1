pub mod list;
pub mod report;

use obsreport_core::{ReportConfig, ReportKind};

/// Install the logger. `RUST_LOG` wins over the flags.
pub fn init_logging(verbose: bool, debug: bool) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Load the configuration file, or defaults when none is given.
pub fn load_config(path: Option<&str>) -> Result<ReportConfig, String> {
    match path {
        Some(p) => ReportConfig::load(std::path::Path::new(p)).map_err(|e| e.to_string()),
        None => Ok(ReportConfig::default()),
    }
}

/// Parse report kind names, rejecting unknown ones.
pub fn parse_kinds(names: &[String]) -> Result<Vec<ReportKind>, String> {
    names
        .iter()
        .map(|n| {
            ReportKind::parse(n).ok_or_else(|| {
                let known: Vec<&str> = ReportKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown report '{n}' (expected one of: {})", known.join(", "))
            })
        })
        .collect()
}

/// Parse a reference time given as Unix seconds or RFC 3339.
pub fn parse_time(s: &str) -> Result<i64, String> {
    if let Ok(secs) = s.parse::<i64>() {
        return chrono::DateTime::from_timestamp(secs, 0)
            .map(|_| secs)
            .ok_or_else(|| format!("time {secs} is out of range"));
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp())
        .map_err(|e| format!("invalid time '{s}': {e}"))
}

/// Split a comma-separated list, dropping empty items.
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(str::to_string)
        .collect()
}
