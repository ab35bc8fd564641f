//! Clock advancement and weekly settlement
//!
//! The scheduler owns the global clock. Advancing it walks forward one
//! boundary at a time: time up to the next week close is applied, a settlement
//! batch runs with the clock sitting exactly on the boundary, then the rest of
//! the delta is consumed the same way. A delta that lands exactly on a
//! boundary stops there; that boundary settles on the next non-zero advance.

use crate::{
    aggregator::ReportAggregator,
    report::{EftReport, SummaryReport},
    sink::ReportSink,
    week::{WeekBoundary, WEEK_SECONDS},
    Error, Result,
};
use chrono::{Duration, NaiveDateTime};
use ledger_core::{Directory, ServiceRecordStore};
use tracing::{error, info};

/// Global data center clock; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    now: NaiveDateTime,
}

impl Clock {
    /// Create clock at `now`
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    /// Current instant
    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Instant `seconds` from now, if representable
    pub fn after(&self, seconds: u64) -> Option<NaiveDateTime> {
        let seconds = i64::try_from(seconds).ok()?;
        self.now.checked_add_signed(Duration::try_seconds(seconds)?)
    }

    fn advance(&mut self, seconds: u64) {
        self.now = self.after(seconds).unwrap_or(NaiveDateTime::MAX);
    }
}

/// Result of one settlement batch
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    /// Boundary the batch ran at
    pub boundary: NaiveDateTime,

    /// `"MM-DD-YYYY to MM-DD-YYYY"` label of the settled week
    pub period_label: String,

    /// Member reports written
    pub member_reports: usize,

    /// Provider reports written
    pub provider_reports: usize,

    /// EFT report
    pub eft: EftReport,

    /// Summary report
    pub summary: SummaryReport,

    /// Records evicted after reporting
    pub evicted: usize,
}

/// Mutable state a settlement batch works on
#[derive(Debug)]
pub struct SettlementContext<'a> {
    /// Unsettled records
    pub store: &'a mut ServiceRecordStore,

    /// Members and providers; provider clocks follow the global clock
    pub directory: &'a mut Directory,

    /// Report generator
    pub aggregator: &'a ReportAggregator,

    /// Report destination
    pub sink: &'a mut dyn ReportSink,
}

/// Drives the clock across week boundaries
#[derive(Debug, Clone)]
pub struct SettlementScheduler {
    week: WeekBoundary,
    clock: Clock,
    last_settlement: Option<NaiveDateTime>,
}

impl SettlementScheduler {
    /// Create new scheduler
    pub fn new(week: WeekBoundary, clock: Clock) -> Self {
        Self {
            week,
            clock,
            last_settlement: None,
        }
    }

    /// Resume with the boundary of the last completed batch
    pub fn with_last_settlement(mut self, boundary: Option<NaiveDateTime>) -> Self {
        self.last_settlement = boundary;
        self
    }

    /// Current clock
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Boundary of the last completed batch
    pub fn last_settlement(&self) -> Option<NaiveDateTime> {
        self.last_settlement
    }

    /// Billing week convention
    pub fn week(&self) -> &WeekBoundary {
        &self.week
    }

    /// Seconds until the next boundary that still needs settling
    pub fn seconds_until_settlement(&self) -> u64 {
        let now = self.clock.now();
        match self.week.seconds_until_boundary(now) {
            0 if self.last_settlement == Some(now) => WEEK_SECONDS,
            seconds => seconds,
        }
    }

    /// Advance the clock by `seconds`, settling every boundary crossed.
    ///
    /// Returns one outcome per settlement, oldest first. If a batch fails the
    /// clock stays on that boundary, its records stay in the store and the
    /// error propagates; the next non-zero advance retries it.
    pub fn advance_by(
        &mut self,
        seconds: u64,
        ctx: &mut SettlementContext<'_>,
    ) -> Result<Vec<SettlementOutcome>> {
        if self.clock.after(seconds).is_none() {
            return Err(Error::ClockOverflow(seconds));
        }
        if let Some(provider) = ctx.directory.provider_clock_overflow(seconds) {
            error!(%provider, seconds, "Provider clock cannot advance");
            return Err(Error::ClockOverflow(seconds));
        }

        let mut remaining = seconds;
        let mut outcomes = Vec::new();

        loop {
            let until = self.seconds_until_settlement();
            if remaining <= until {
                self.shift(remaining, ctx.directory);
                return Ok(outcomes);
            }

            self.shift(until, ctx.directory);
            remaining -= until;

            let boundary = self.clock.now();
            let outcome = self.settle(boundary, ctx).map_err(|e| {
                error!(%boundary, error = %e, "Settlement batch failed");
                e
            })?;
            self.last_settlement = Some(boundary);
            outcomes.push(outcome);
        }
    }

    fn shift(&mut self, seconds: u64, directory: &mut Directory) {
        self.clock.advance(seconds);
        directory.shift_provider_clocks(seconds);
    }

    fn settle(&self, boundary: NaiveDateTime, ctx: &mut SettlementContext<'_>) -> Result<SettlementOutcome> {
        let period_label = self.week.period_label(boundary);
        info!(%boundary, period = %period_label, records = ctx.store.len(), "Running settlement batch");

        let reports = ctx
            .aggregator
            .run_settlement(&*ctx.store, &*ctx.directory, boundary, &mut *ctx.sink)?;
        let evicted = ctx.store.filter(boundary);

        info!(
            period = %period_label,
            member_reports = reports.member_reports,
            provider_reports = reports.provider_reports,
            evicted,
            "Settlement batch complete"
        );

        Ok(SettlementOutcome {
            boundary,
            period_label,
            member_reports: reports.member_reports,
            provider_reports: reports.provider_reports,
            eft: reports.eft,
            summary: reports.summary,
            evicted,
        })
    }
}
