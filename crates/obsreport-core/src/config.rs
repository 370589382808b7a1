//! Report configuration.
//!
//! A [`ReportConfig`] says which reports to run, where the agent's stores
//! live, where output goes and how it is formatted. It can be loaded from a
//! JSON file; every field has a default so partial files are fine.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::observables;
use crate::render::OutputMode;

// ---------------------------------------------------------------------------
// Report kinds
// ---------------------------------------------------------------------------

/// A named report the runner knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    #[serde(rename = "lastseen")]
    LastSeen,
    #[serde(rename = "performance")]
    Performance,
    #[serde(rename = "classes")]
    Classes,
    #[serde(rename = "all_locks")]
    AllLocks,
    #[serde(rename = "active_locks")]
    ActiveLocks,
    #[serde(rename = "audit")]
    Audit,
    #[serde(rename = "monitor_now")]
    MonitorNow,
    #[serde(rename = "monitor_history")]
    MonitorHistory,
}

impl ReportKind {
    pub const ALL: [ReportKind; 8] = [
        Self::LastSeen,
        Self::Performance,
        Self::Classes,
        Self::AllLocks,
        Self::ActiveLocks,
        Self::Audit,
        Self::MonitorNow,
        Self::MonitorHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastSeen => "lastseen",
            Self::Performance => "performance",
            Self::Classes => "classes",
            Self::AllLocks => "all_locks",
            Self::ActiveLocks => "active_locks",
            Self::Audit => "audit",
            Self::MonitorNow => "monitor_now",
            Self::MonitorHistory => "monitor_history",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Store locations
// ---------------------------------------------------------------------------

/// File names of the consumed stores, relative to the work directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreFiles {
    pub averages: String,
    pub last_seen: String,
    pub performance: String,
    pub classes: String,
    pub audit: String,
    pub locks: String,
    pub histograms: String,
    /// File name prefix of filesystem arrival stores.
    pub arrivals_prefix: String,
}

impl Default for StoreFiles {
    fn default() -> Self {
        Self {
            averages: "state/env_data.db".to_string(),
            last_seen: "cf_lastseen.db".to_string(),
            performance: "performance.db".to_string(),
            classes: "cf_classes.db".to_string(),
            audit: "cf_audit.db".to_string(),
            locks: "cfengine_lock.db".to_string(),
            histograms: "state/histograms".to_string(),
            arrivals_prefix: "scan:".to_string(),
        }
    }
}

impl StoreFiles {
    /// Per-peer history store name.
    pub fn peer_history(&self, peer: &str) -> String {
        format!("{}.{}", self.last_seen, peer)
    }
}

// ---------------------------------------------------------------------------
// Report config
// ---------------------------------------------------------------------------

/// Everything a report pass needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Agent work directory holding the stores.
    pub workdir: PathBuf,
    /// Output directory; `<workdir>/reports` when unset.
    pub output_dir: Option<PathBuf>,
    pub mode: OutputMode,
    pub reports: Vec<ReportKind>,
    /// Delete expired ledger entries while reporting.
    pub purge: bool,
    /// One point per measurement interval instead of coarse chunks.
    pub high_resolution: bool,
    /// Normalize graph matrices by the weekly maxima.
    pub scaling: bool,
    /// Write column titles into graph matrices.
    pub titles: bool,
    /// Append a time stamp to the output directory name.
    pub timestamps: bool,
    pub stylesheet: String,
    pub web_driver: String,
    pub banner: String,
    /// Host name used in report titles; detected when unset.
    pub host_name: Option<String>,
    /// Observables whose history should be erased.
    pub erase: Vec<String>,
    pub stores: StoreFiles,
    /// Fixed reference time (Unix seconds); wall clock when unset.
    pub now: Option<i64>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("/var/cfengine"),
            output_dir: None,
            mode: OutputMode::Text,
            reports: Vec::new(),
            purge: false,
            high_resolution: false,
            scaling: true,
            titles: false,
            timestamps: false,
            stylesheet: "http://www.cfengine.org/css/promises.css".to_string(),
            web_driver: "#".to_string(),
            banner: String::new(),
            host_name: None,
            erase: Vec::new(),
            stores: StoreFiles::default(),
            now: None,
        }
    }
}

impl ReportConfig {
    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ReportError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str::<ReportConfig>(&raw).map_err(|e| {
            ReportError::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Reject settings that would fail half-way through a pass.
    pub fn validate(&self) -> Result<()> {
        for name in &self.erase {
            if observables::index_of(name).is_none() {
                return Err(ReportError::Config(format!("unknown observable '{name}'")));
            }
        }
        Ok(())
    }

    /// Path of a store file inside the work directory.
    pub fn store_path(&self, file: &str) -> PathBuf {
        self.workdir.join(file)
    }

    /// Resolved output directory, including the optional time stamp.
    pub fn output_path(&self) -> PathBuf {
        let base = self
            .output_dir
            .clone()
            .unwrap_or_else(|| self.workdir.join("reports"));
        if self.timestamps {
            let mut name = base.as_os_str().to_os_string();
            name.push("-");
            name.push(crate::format::compact_stamp(self.now()));
            PathBuf::from(name)
        } else {
            base
        }
    }

    /// Reference time for the pass.
    pub fn now(&self) -> i64 {
        self.now.unwrap_or_else(|| chrono::Utc::now().timestamp())
    }

    /// Host name for report titles.
    pub fn host_name(&self) -> String {
        self.host_name
            .clone()
            .or_else(detect_host_name)
            .unwrap_or_else(|| "localhost".to_string())
    }
}

/// Fully qualified host name (best-effort).
fn detect_host_name() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        if let Some(name) = std::fs::read_to_string("/proc/sys/kernel/hostname")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
        {
            return Some(name);
        }
    }
    std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty())
}
