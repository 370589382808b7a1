//! Phase histograms per observable and day of week.
//!
//! The monitor persists a table of occurrence counts indexed by
//! `[observable][day][phase]`. The table file has one row per phase: the phase
//! index followed by `OBSERVABLE_COUNT * 7` counts, day-major within each
//! observable. Loading is all-or-nothing.

use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};
use crate::observables::{OBSERVABLE_COUNT, OBSERVABLES};
use crate::output::FileBatch;

/// Phase positions along the histogram axis.
pub const GRAINS: usize = 64;

/// Days per table.
pub const DAYS: usize = 7;

fn slot(obs: usize, day: usize, phase: usize) -> usize {
    (obs * DAYS + day) * GRAINS + phase
}

// ---------------------------------------------------------------------------
// Raw table
// ---------------------------------------------------------------------------

/// Raw counts as persisted by the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramTable {
    counts: Vec<u32>,
}

impl Default for HistogramTable {
    fn default() -> Self {
        Self {
            counts: vec![0; OBSERVABLE_COUNT * DAYS * GRAINS],
        }
    }
}

impl HistogramTable {
    pub fn get(&self, obs: usize, day: usize, phase: usize) -> u32 {
        self.counts[slot(obs, day, phase)]
    }

    pub fn set(&mut self, obs: usize, day: usize, phase: usize, count: u32) {
        self.counts[slot(obs, day, phase)] = count;
    }

    /// Read the table file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ReportError::Histogram {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let table = Self::parse(&text).map_err(|reason| ReportError::Histogram {
            path: path.to_path_buf(),
            reason,
        })?;
        log::info!("loaded histogram table {}", path.display());
        Ok(table)
    }

    /// Parse the whitespace-separated table text.
    ///
    /// Every one of the [`GRAINS`] rows must be present and complete, and each
    /// phase must appear exactly once.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut table = Self::default();
        let mut tokens = text.split_whitespace();
        let mut next = |what: &dyn Fn() -> String| -> std::result::Result<u32, String> {
            let token = tokens
                .next()
                .ok_or_else(|| format!("truncated table, expected {}", what()))?;
            token
                .parse::<u32>()
                .map_err(|_| format!("bad count '{token}' for {}", what()))
        };

        let mut seen = [false; GRAINS];
        for row in 0..GRAINS {
            let phase = next(&|| format!("phase index of row {row}"))? as usize;
            if phase >= GRAINS {
                return Err(format!("phase {phase} out of range in row {row}"));
            }
            if std::mem::replace(&mut seen[phase], true) {
                return Err(format!("duplicate phase {phase} in row {row}"));
            }
            for obs in 0..OBSERVABLE_COUNT {
                for day in 0..DAYS {
                    let count = next(&|| format!("row {row}, observable {obs}, day {day}"))?;
                    table.set(obs, day, phase, count);
                }
            }
        }
        Ok(table)
    }

    /// Serialize in the persisted layout.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for phase in 0..GRAINS {
            out.push_str(&phase.to_string());
            for obs in 0..OBSERVABLE_COUNT {
                for day in 0..DAYS {
                    out.push(' ');
                    out.push_str(&self.get(obs, day, phase).to_string());
                }
            }
            out.push('\n');
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Smoothing and weekly collapse
// ---------------------------------------------------------------------------

/// A table after smoothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedTable {
    values: Vec<f64>,
}

impl SmoothedTable {
    pub fn get(&self, obs: usize, day: usize, phase: usize) -> f64 {
        self.values[slot(obs, day, phase)]
    }
}

/// Three-point mean over interior phases; boundaries keep their raw value.
/// High resolution copies the table unchanged.
pub fn smooth(table: &HistogramTable, high_res: bool) -> SmoothedTable {
    let mut values: Vec<f64> = table.counts.iter().map(|&c| f64::from(c)).collect();
    if !high_res {
        for obs in 0..OBSERVABLE_COUNT {
            for day in 0..DAYS {
                for k in 1..GRAINS - 1 {
                    let sum: f64 = (k - 1..=k + 1)
                        .map(|p| f64::from(table.get(obs, day, p)))
                        .sum();
                    values[slot(obs, day, k)] = sum / 3.0;
                }
            }
        }
    }
    SmoothedTable { values }
}

/// Sum each phase over the seven days, rounding every day's term to the
/// nearest integer. One row of [`GRAINS`] counts per observable.
pub fn collapse_week(smoothed: &SmoothedTable) -> Vec<Vec<i64>> {
    (0..OBSERVABLE_COUNT)
        .map(|obs| {
            (0..GRAINS)
                .map(|k| {
                    (0..DAYS)
                        .map(|day| (smoothed.get(obs, day, k) + 0.5) as i64)
                        .sum()
                })
                .collect()
        })
        .collect()
}

/// Write `<obs>.distr` files with lines `phase weekly_count`.
pub fn write_distributions(weekly: &[Vec<i64>], dir: &Path) -> Result<Vec<PathBuf>> {
    let names: Vec<String> = OBSERVABLES.iter().map(|o| format!("{}.distr", o.name)).collect();
    let mut batch = FileBatch::create(dir, &names)?;
    for (i, row) in weekly.iter().enumerate().take(batch.len()) {
        for (k, count) in row.iter().enumerate() {
            batch.write(i, format_args!("{k} {count}\n"))?;
        }
    }
    batch.finish()
}

/// Load, smooth, collapse and write the weekly distributions.
pub fn write_histograms(table_path: &Path, dir: &Path, high_res: bool) -> Result<Vec<PathBuf>> {
    let table = HistogramTable::load(table_path)?;
    let weekly = collapse_week(&smooth(&table, high_res));
    write_distributions(&weekly, dir)
}
