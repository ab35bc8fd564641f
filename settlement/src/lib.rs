//! Weekly Settlement Engine
//!
//! Drives the data center clock and settles each billing week.
//!
//! # Architecture
//!
//! Every time the clock crosses the week close (Friday 23:59:00 by default)
//! one settlement batch runs:
//!
//! 1. **Member reports**: one per member with services this week
//! 2. **Provider reports**: one per provider, totals clamped to the limits
//! 3. **EFT and summary**: streamed as each provider report completes
//! 4. **Eviction**: records written at or before the boundary leave the store
//!
//! A single advance may cross several boundaries; each gets its own batch.
//!
//! # Example
//!
//! ```no_run
//! use settlement::{Config, FileSink, SettlementEngine};
//!
//! fn main() -> settlement::Result<()> {
//!     let config = Config::default();
//!     let sink = FileSink::new(config.reports.output_dir.clone());
//!     let now = chrono::Local::now().naive_local();
//!     let mut engine = SettlementEngine::new(config, now, Box::new(sink))?;
//!
//!     // Advance one week
//!     let outcomes = engine.advance_by(7 * 86_400)?;
//!     for outcome in outcomes {
//!         println!("Settled {}: {} records", outcome.period_label, outcome.evicted);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod week;
pub mod sink;
pub mod report;
pub mod aggregator;
pub mod scheduler;
pub mod metrics;
pub mod error;
pub mod config;
pub mod engine;

// Re-exports
pub use error::{Error, Result};
pub use aggregator::{ReportAggregator, ReportRequest, SettlementReports};
pub use config::Config;
pub use engine::SettlementEngine;
pub use metrics::Metrics;
pub use report::{
    EftEntry, EftReport, MemberLine, MemberReport, ProviderLine, ProviderReport, ReportHeader,
    SummaryEntry, SummaryReport,
};
pub use scheduler::{Clock, SettlementContext, SettlementOutcome, SettlementScheduler};
pub use sink::{FileSink, MemorySink, ReportKind, ReportSink};
pub use week::WeekBoundary;
