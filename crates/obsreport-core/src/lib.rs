//! # obsreport-core
//!
//! Reporting layer of a host monitoring agent.
//!
//! The agent's monitor stores one sample per five-minute bucket of a
//! canonical week, for every observable it tracks (users, load, sockets per
//! service, temperatures...). This crate reads those stores back and turns
//! them into something people and plotting tools can consume:
//!
//! - weekly extrema and chunked averages, normalized for plotting
//!   ([`aggregate`]);
//! - smoothed phase histograms collapsed over the week ([`histogram`]);
//! - per-peer contact intermittency ([`reliability`]);
//! - ledger reports (peers last seen, promise performance, class
//!   probabilities, locks, audit trail) in text, HTML or XML ([`reports`],
//!   [`render`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use obsreport_core::{IdentityResolver, ReportConfig, ReportKind, run_all};
//!
//! let config = ReportConfig {
//!     workdir: "/var/cfengine".into(),
//!     reports: vec![ReportKind::LastSeen, ReportKind::MonitorHistory],
//!     ..Default::default()
//! };
//! for outcome in run_all(&config, &IdentityResolver).unwrap() {
//!     println!("{}: {:?}", outcome.kind, outcome.result.map(|files| files.len()));
//! }
//! ```
//!
//! ## Architecture
//!
//! Store → TimeGrid walk → engine (aggregate / histogram / reliability /
//! reports) → renderer or plot files
//!
//! Every pass opens exactly one store through [`store::with_store`] and
//! closes it before returning. Passes are independent: a failure in one
//! report kind does not stop the others queued by [`run_all`].

pub mod aggregate;
pub mod arrivals;
pub mod config;
pub mod error;
pub mod format;
pub mod histogram;
pub mod observables;
pub mod output;
pub mod records;
pub mod reliability;
pub mod render;
pub mod reports;
pub mod runner;
pub mod store;
pub mod timegrid;

pub use aggregate::{Extrema, Scaling, Series, SeriesPoint, compute_extrema, compute_series};
pub use config::{ReportConfig, ReportKind, StoreFiles};
pub use error::{ReportError, Result};
pub use histogram::{GRAINS, HistogramTable, SmoothedTable, collapse_week, smooth};
pub use observables::{OBSERVABLE_COUNT, OBSERVABLES, Observable};
pub use records::{Averages, AuditLog, AuditStatus, Event, LockData, QPoint};
pub use reliability::{HostResolver, IdentityResolver, PeerSeries, discover_peers, peer_series};
pub use render::{Cell, Document, Field, OutputMode, Record};
pub use runner::{KindOutcome, run_all, run_erase, run_report};
pub use store::{KvStore, MemoryStore, RecordStore, SqliteStore, StoreMode, with_store};
pub use timegrid::{Bucket, TimeGrid, TimeKey, bucket_index, bucket_key};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
