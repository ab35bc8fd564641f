//! Data center facade
//!
//! Owns the directories, the record store, the scheduler and the report sink,
//! and exposes the operations the operator terminals call.

use crate::{
    aggregator::{ReportAggregator, ReportRequest},
    config::Config,
    metrics::Metrics,
    report::{EftReport, MemberReport, ProviderReport, SummaryReport},
    scheduler::{Clock, SettlementContext, SettlementOutcome, SettlementScheduler},
    sink::{ReportKind, ReportSink},
    week::WeekBoundary,
    Error, Result,
};
use chrono::{NaiveDate, NaiveDateTime};
use ledger_core::{
    Cursor, Directory, LedgerSnapshot, Member, MemberDirectory, MemberId, MemberStatus, Provider,
    ProviderDirectory, ProviderId, RecordKey, Service, ServiceCode, ServiceRecord,
    ServiceRecordStore,
};

/// Settlement engine
#[derive(Debug)]
pub struct SettlementEngine {
    /// Configuration
    config: Config,

    /// Members and providers
    directory: Directory,

    /// Unsettled service records
    store: ServiceRecordStore,

    /// Clock and boundary bookkeeping
    scheduler: SettlementScheduler,

    /// Report generator
    aggregator: ReportAggregator,

    /// Report destination
    sink: Box<dyn ReportSink>,

    /// Metrics
    metrics: Metrics,
}

impl SettlementEngine {
    /// Create an empty engine with the global clock at `now`
    pub fn new(config: Config, now: NaiveDateTime, sink: Box<dyn ReportSink>) -> Result<Self> {
        Self::assemble(config, now, None, Directory::new(), ServiceRecordStore::new(), sink)
    }

    /// Resume from a snapshot
    pub fn from_snapshot(
        config: Config,
        snapshot: LedgerSnapshot,
        sink: Box<dyn ReportSink>,
    ) -> Result<Self> {
        let restored = snapshot.restore()?;
        Self::assemble(
            config,
            restored.clock,
            restored.last_settlement,
            restored.directory,
            restored.store,
            sink,
        )
    }

    fn assemble(
        config: Config,
        now: NaiveDateTime,
        last_settlement: Option<NaiveDateTime>,
        directory: Directory,
        store: ServiceRecordStore,
        sink: Box<dyn ReportSink>,
    ) -> Result<Self> {
        let week = WeekBoundary::from_config(&config.week)?;
        let scheduler = SettlementScheduler::new(week, Clock::new(now))
            .with_last_settlement(last_settlement);
        let aggregator = ReportAggregator::new(config.ledger.limits.clone(), week);
        let metrics = Metrics::new()?;
        metrics.set_records_stored(store.len());

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            clock = %now,
            members = directory.member_count(),
            providers = directory.provider_count(),
            records = store.len(),
            "Settlement engine ready"
        );

        Ok(Self {
            config,
            directory,
            store,
            scheduler,
            aggregator,
            sink,
            metrics,
        })
    }

    /// Capture the current state
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::capture(
            self.now(),
            self.scheduler.last_settlement(),
            &self.directory,
            &self.store,
        )
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current global clock
    pub fn now(&self) -> NaiveDateTime {
        self.scheduler.clock().now()
    }

    /// Members and providers
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Unsettled records
    pub fn store(&self) -> &ServiceRecordStore {
        &self.store
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Register a member
    pub fn register_member(&mut self, member: Member) -> Result<()> {
        self.directory.add_member(member)?;
        Ok(())
    }

    /// Register a provider whose local clock is within the time-zone window
    pub fn register_provider(&mut self, provider: Provider) -> Result<()> {
        let now = self.now();
        if !self
            .config
            .ledger
            .limits
            .is_within_time_zone(provider.local_clock, now)
        {
            return Err(Error::InvalidTimeZone {
                provider: provider.id,
                offset_secs: (provider.local_clock - now).num_seconds(),
            });
        }
        self.directory.add_provider(provider)?;
        Ok(())
    }

    /// Remove a member with no unsettled records
    pub fn remove_member(&mut self, id: MemberId) -> Result<Member> {
        if !self.store.cursor_from_member(id).is_empty() {
            return Err(Error::RecordsPending(format!("member {}", id)));
        }
        self.directory
            .remove_member(id)
            .ok_or_else(|| ledger_core::Error::UnknownMember(id).into())
    }

    /// Remove a provider with no unsettled records
    pub fn remove_provider(&mut self, id: ProviderId) -> Result<Provider> {
        if !self.store.cursor_from_provider(id).is_empty() {
            return Err(Error::RecordsPending(format!("provider {}", id)));
        }
        self.directory
            .remove_provider(id)
            .ok_or_else(|| ledger_core::Error::UnknownProvider(id).into())
    }

    /// Change a member's status
    pub fn set_member_status(&mut self, id: MemberId, status: MemberStatus) -> Result<()> {
        let member = self
            .directory
            .member_mut(id)
            .ok_or(ledger_core::Error::UnknownMember(id))?;
        member.status = status;
        Ok(())
    }

    /// Add a service to a provider's catalog
    pub fn add_service(&mut self, provider: ProviderId, service: Service) -> Result<()> {
        let code = service.code;
        let added = self
            .directory
            .provider_mut(provider)
            .ok_or(ledger_core::Error::UnknownProvider(provider))?
            .add_service(service);
        if !added {
            return Err(ledger_core::Error::DuplicateId(format!("service {}", code)).into());
        }
        Ok(())
    }

    /// Record a service a provider just rendered.
    ///
    /// The record is stamped with the provider's local clock.
    pub fn record_service(
        &mut self,
        provider_id: ProviderId,
        member_id: MemberId,
        service_code: ServiceCode,
        service_date: NaiveDate,
        comments: &str,
    ) -> Result<RecordKey> {
        let member = self.directory.require_member(member_id)?;
        if !member.is_active() {
            return Err(Error::MemberSuspended(member_id));
        }

        let provider = self.directory.require_provider(provider_id)?;
        self.directory.require_service(provider_id, service_code)?;

        let provider_date = provider.local_clock.date();
        if service_date > provider_date {
            return Err(Error::ServiceDateInFuture {
                service_date,
                provider_date,
            });
        }

        let record = ServiceRecord::new(
            provider.local_clock,
            service_date,
            provider_id,
            member_id,
            service_code,
            self.config.ledger.limits.truncate_comments(comments),
        );
        Ok(self.insert(record))
    }

    /// Insert a record as-is (manual back-entry)
    pub fn insert(&mut self, record: ServiceRecord) -> RecordKey {
        let key = self.store.insert(record);
        self.metrics.set_records_stored(self.store.len());
        key
    }

    /// Cursor over a member's unsettled records
    pub fn cursor_from_member(&self, id: MemberId) -> Cursor<'_> {
        self.store.cursor_from_member(id)
    }

    /// Cursor over a provider's unsettled records
    pub fn cursor_from_provider(&self, id: ProviderId) -> Cursor<'_> {
        self.store.cursor_from_provider(id)
    }

    /// Evict every record written at or before `cutoff`
    pub fn filter(&mut self, cutoff: NaiveDateTime) -> usize {
        let evicted = self.store.filter(cutoff);
        self.metrics.set_records_stored(self.store.len());
        evicted
    }

    /// Advance the global clock, settling every week boundary crossed
    pub fn advance_by(&mut self, seconds: u64) -> Result<Vec<SettlementOutcome>> {
        let mut ctx = SettlementContext {
            store: &mut self.store,
            directory: &mut self.directory,
            aggregator: &self.aggregator,
            sink: self.sink.as_mut(),
        };
        let result = self.scheduler.advance_by(seconds, &mut ctx);
        self.metrics.set_records_stored(self.store.len());

        let outcomes = result?;
        for outcome in &outcomes {
            self.metrics.record_settlement(outcome);
        }
        Ok(outcomes)
    }

    /// Manager-requested member report at the current clock.
    ///
    /// `Ok(None)` when the member has no record this period.
    pub fn member_report(&mut self, id: MemberId) -> Result<Option<MemberReport>> {
        self.directory.require_member(id)?;
        let now = self.now();
        let cursor = self.store.cursor_from_member(id);
        if !ReportAggregator::has_in_period_records(&cursor, now) {
            return Ok(None);
        }

        let request = ReportRequest::new(id, cursor, now, true);
        let report = self
            .aggregator
            .generate_member_report(request, &self.directory, self.sink.as_mut())?;
        self.metrics.record_report(ReportKind::Member);
        Ok(Some(report))
    }

    /// Manager-requested provider report at the current clock.
    ///
    /// `Ok(None)` when the provider has no record this period.
    pub fn provider_report(&mut self, id: ProviderId) -> Result<Option<ProviderReport>> {
        self.directory.require_provider(id)?;
        let now = self.now();
        let cursor = self.store.cursor_from_provider(id);
        if !ReportAggregator::has_in_period_records(&cursor, now) {
            return Ok(None);
        }

        let request = ReportRequest::new(id, cursor, now, true);
        let report = self
            .aggregator
            .generate_provider_report(request, &self.directory, self.sink.as_mut())?;
        self.metrics.record_report(ReportKind::Provider);
        Ok(Some(report))
    }

    /// Manager-requested EFT report at the current clock
    pub fn eft_report(&mut self) -> Result<EftReport> {
        let report = self.aggregator.generate_eft_report(
            &self.store,
            &self.directory,
            self.now(),
            true,
            self.sink.as_mut(),
        )?;
        self.metrics.record_report(ReportKind::Eft);
        Ok(report)
    }

    /// Manager-requested summary report at the current clock
    pub fn summary_report(&mut self) -> Result<SummaryReport> {
        let report = self.aggregator.generate_summary_report(
            &self.store,
            &self.directory,
            self.now(),
            true,
            self.sink.as_mut(),
        )?;
        self.metrics.record_report(ReportKind::Summary);
        Ok(report)
    }
}
