//! Metrics collection for observability
//!
//! Each engine owns its own Prometheus registry.
//!
//! # Metrics
//!
//! - `settlement_batches_total` - Settlement batches completed
//! - `settlement_records_evicted_total` - Records evicted after settlement
//! - `settlement_reports_written_total` - Report files written, by kind
//! - `ledger_records_stored` - Unsettled records currently held

use crate::{
    scheduler::SettlementOutcome,
    sink::ReportKind,
    Result,
};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Settlement batches completed
    pub batches_total: IntCounter,

    /// Records evicted after settlement
    pub records_evicted: IntCounter,

    /// Reports written, labelled by kind
    pub reports_written: IntCounterVec,

    /// Unsettled records currently stored
    pub records_stored: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let batches_total = IntCounter::new(
            "settlement_batches_total",
            "Settlement batches completed",
        )?;
        registry.register(Box::new(batches_total.clone()))?;

        let records_evicted = IntCounter::new(
            "settlement_records_evicted_total",
            "Service records evicted after settlement",
        )?;
        registry.register(Box::new(records_evicted.clone()))?;

        let reports_written = IntCounterVec::new(
            Opts::new("settlement_reports_written_total", "Report files written"),
            &["kind"],
        )?;
        registry.register(Box::new(reports_written.clone()))?;

        let records_stored = IntGauge::new(
            "ledger_records_stored",
            "Unsettled service records currently stored",
        )?;
        registry.register(Box::new(records_stored.clone()))?;

        Ok(Self {
            batches_total,
            records_evicted,
            reports_written,
            records_stored,
            registry,
        })
    }

    /// Record one written report
    pub fn record_report(&self, kind: ReportKind) {
        self.reports_written
            .with_label_values(&[kind.directory()])
            .inc();
    }

    /// Record a completed settlement batch
    pub fn record_settlement(&self, outcome: &SettlementOutcome) {
        self.batches_total.inc();
        self.records_evicted.inc_by(outcome.evicted as u64);
        self.reports_written
            .with_label_values(&[ReportKind::Member.directory()])
            .inc_by(outcome.member_reports as u64);
        self.reports_written
            .with_label_values(&[ReportKind::Provider.directory()])
            .inc_by(outcome.provider_reports as u64);
        self.record_report(ReportKind::Eft);
        self.record_report(ReportKind::Summary);
    }

    /// Update stored record gauge
    pub fn set_records_stored(&self, count: usize) {
        self.records_stored.set(count as i64);
    }

    /// Encode every metric in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("batches_total", &self.batches_total.get())
            .field("records_evicted", &self.records_evicted.get())
            .field("records_stored", &self.records_stored.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instances_do_not_collide() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();

        a.batches_total.inc();
        assert_eq!(a.batches_total.get(), 1);
        assert_eq!(b.batches_total.get(), 0);
    }

    #[test]
    fn test_encode() {
        let metrics = Metrics::new().unwrap();
        metrics.set_records_stored(12);
        metrics.record_report(ReportKind::Eft);

        let text = metrics.encode().unwrap();
        assert!(text.contains("ledger_records_stored 12"));
        assert!(text.contains("settlement_reports_written_total{kind=\"EFT_Reports\"} 1"));
    }
}
