//! Report aggregation
//!
//! Walks per-entity cursors up to a reference instant, resolves names and fees
//! through the directories, and writes each report to a sink. Per-provider
//! totals are clamped before they are reported or fed into the EFT and
//! summary reports; the summary grand totals are not.
//!
//! Member and provider reports require a cursor whose first record precedes
//! the reference instant. Callers check [`ReportAggregator::has_in_period_records`]
//! first; handing over an empty or expired cursor panics.

use crate::{
    report::{
        self, EftEntry, EftReport, MemberLine, MemberReport, ProviderLine, ProviderReport,
        ReportHeader, SummaryEntry, SummaryReport,
    },
    sink::{ReportKind, ReportSink},
    week::WeekBoundary,
    Error, Result,
};
use chrono::NaiveDateTime;
use ledger_core::{
    Contact, Cursor, Limits, MemberDirectory, MemberId, Provider, ProviderDirectory, ProviderId,
    ServiceRecordStore,
};
use rust_decimal::Decimal;
use std::io::Write;

/// Inputs for one member or provider report
#[derive(Debug, Clone)]
pub struct ReportRequest<'a, I> {
    /// Member or provider the report is about
    pub subject: I,

    /// Cursor over the subject's records
    pub cursor: Cursor<'a>,

    /// Records written at or after this instant are left out
    pub reference: NaiveDateTime,

    /// Manager-requested reports get numbered file names
    pub manager_requested: bool,
}

impl<'a, I> ReportRequest<'a, I> {
    /// Create new report request
    pub fn new(subject: I, cursor: Cursor<'a>, reference: NaiveDateTime, manager_requested: bool) -> Self {
        Self {
            subject,
            cursor,
            reference,
            manager_requested,
        }
    }
}

/// Everything one settlement batch produced
#[derive(Debug, Clone, Default)]
pub struct SettlementReports {
    /// Member reports written
    pub member_reports: usize,

    /// Provider reports written
    pub provider_reports: usize,

    /// EFT report
    pub eft: EftReport,

    /// Summary report
    pub summary: SummaryReport,
}

/// Line items and clamped totals of one provider's week
#[derive(Debug)]
struct ProviderTally {
    lines: Vec<ProviderLine>,
    consultations: u32,
    fee_total: Decimal,
}

/// Report generator
#[derive(Debug, Clone)]
pub struct ReportAggregator {
    limits: Limits,
    week: WeekBoundary,
}

impl ReportAggregator {
    /// Create new report aggregator
    pub fn new(limits: Limits, week: WeekBoundary) -> Self {
        Self { limits, week }
    }

    /// Configured caps
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Billing week convention
    pub fn week(&self) -> &WeekBoundary {
        &self.week
    }

    /// Check that the cursor's first record precedes `reference`
    pub fn has_in_period_records(cursor: &Cursor<'_>, reference: NaiveDateTime) -> bool {
        cursor.peek().map_or(false, |r| r.written_at < reference)
    }

    fn assert_precondition(cursor: &Cursor<'_>, reference: NaiveDateTime) {
        assert!(
            Self::has_in_period_records(cursor, reference),
            "report requested for a cursor with no record before {}",
            reference
        );
    }

    fn header(
        &self,
        subject_id: u32,
        contact: &Contact,
        reference: NaiveDateTime,
        manager_requested: bool,
    ) -> ReportHeader {
        ReportHeader {
            subject_id,
            contact: contact.clone(),
            period_start: self.week.period_start(reference),
            reference,
            manager_requested,
        }
    }

    /// Generate and write a member report
    pub fn generate_member_report<D>(
        &self,
        request: ReportRequest<'_, MemberId>,
        directory: &D,
        sink: &mut dyn ReportSink,
    ) -> Result<MemberReport>
    where
        D: MemberDirectory + ProviderDirectory,
    {
        let ReportRequest {
            subject,
            cursor,
            reference,
            manager_requested,
        } = request;
        Self::assert_precondition(&cursor, reference);

        let member = directory.require_member(subject)?;
        let mut lines = Vec::new();
        for record in cursor.take_while(|r| r.written_at < reference) {
            let provider = directory.require_provider(record.provider_id)?;
            let service = directory.require_service(record.provider_id, record.service_code)?;
            lines.push(MemberLine {
                service_date: record.service_date,
                provider_name: provider.name().to_string(),
                service_name: service.name.clone(),
            });
        }

        let report = MemberReport {
            member_id: subject,
            header: self.header(subject.get(), &member.contact, reference, manager_requested),
            lines,
        };

        let label = self.week.period_label(reference);
        self.emit(ReportKind::Member, Some(subject.get()), &label, manager_requested, sink, |w| {
            report::write_member_report(w, &report)
        })?;

        tracing::debug!(member = %subject, services = report.lines.len(), "Wrote member report");
        Ok(report)
    }

    /// Generate and write a provider report; totals come back clamped
    pub fn generate_provider_report<D>(
        &self,
        request: ReportRequest<'_, ProviderId>,
        directory: &D,
        sink: &mut dyn ReportSink,
    ) -> Result<ProviderReport>
    where
        D: MemberDirectory + ProviderDirectory,
    {
        let ReportRequest {
            subject,
            cursor,
            reference,
            manager_requested,
        } = request;
        Self::assert_precondition(&cursor, reference);

        let provider = directory.require_provider(subject)?;
        let tally = self.tally_provider(cursor, reference, directory)?;

        let report = ProviderReport {
            provider_id: subject,
            header: self.header(subject.get(), &provider.contact, reference, manager_requested),
            lines: tally.lines,
            consultations: tally.consultations,
            fee_total: tally.fee_total,
        };

        let label = self.week.period_label(reference);
        self.emit(ReportKind::Provider, Some(subject.get()), &label, manager_requested, sink, |w| {
            report::write_provider_report(w, &report)
        })?;

        tracing::debug!(
            provider = %subject,
            consultations = report.consultations,
            fee_total = %report.fee_total,
            "Wrote provider report"
        );
        Ok(report)
    }

    /// Walk a provider cursor up to `reference`; totals come back clamped
    fn tally_provider<D>(
        &self,
        cursor: Cursor<'_>,
        reference: NaiveDateTime,
        directory: &D,
    ) -> Result<ProviderTally>
    where
        D: MemberDirectory + ProviderDirectory,
    {
        let mut lines = Vec::new();
        let mut consultations: u32 = 0;
        let mut fee_total = Decimal::ZERO;

        for record in cursor.take_while(|r| r.written_at < reference) {
            let member = directory.require_member(record.member_id)?;
            let fee = directory
                .require_service(record.provider_id, record.service_code)?
                .fee;

            consultations = consultations.saturating_add(1);
            fee_total += fee;
            lines.push(ProviderLine {
                service_date: record.service_date,
                written_at: record.written_at,
                member_name: member.name().to_string(),
                member_id: record.member_id,
                service_code: record.service_code,
                fee,
            });
        }

        Ok(ProviderTally {
            lines,
            consultations: self.limits.clamp_consultations(consultations),
            fee_total: self.limits.clamp_weekly_fee(fee_total),
        })
    }

    /// Tally of one provider's in-period records, or `None` without any
    fn provider_totals<D>(
        &self,
        provider: &Provider,
        store: &ServiceRecordStore,
        directory: &D,
        reference: NaiveDateTime,
    ) -> Result<Option<ProviderTally>>
    where
        D: MemberDirectory + ProviderDirectory,
    {
        let cursor = store.cursor_from_provider(provider.id);
        if !Self::has_in_period_records(&cursor, reference) {
            return Ok(None);
        }
        self.tally_provider(cursor, reference, directory).map(Some)
    }

    /// Generate and write an EFT report over every provider
    pub fn generate_eft_report<D>(
        &self,
        store: &ServiceRecordStore,
        directory: &D,
        reference: NaiveDateTime,
        manager_requested: bool,
        sink: &mut dyn ReportSink,
    ) -> Result<EftReport>
    where
        D: MemberDirectory + ProviderDirectory,
    {
        let mut eft = EftReport::default();
        for provider in directory.providers() {
            if let Some(tally) = self.provider_totals(provider, store, directory, reference)? {
                eft.entries.push(EftEntry {
                    provider_name: provider.name().to_string(),
                    provider_id: provider.id,
                    amount: tally.fee_total,
                });
            }
        }

        let label = self.week.period_label(reference);
        self.emit(ReportKind::Eft, None, &label, manager_requested, sink, |w| {
            report::write_eft_report(w, &eft)
        })?;

        tracing::debug!(entries = eft.entries.len(), "Wrote EFT report");
        Ok(eft)
    }

    /// Generate and write a summary report over every provider
    pub fn generate_summary_report<D>(
        &self,
        store: &ServiceRecordStore,
        directory: &D,
        reference: NaiveDateTime,
        manager_requested: bool,
        sink: &mut dyn ReportSink,
    ) -> Result<SummaryReport>
    where
        D: MemberDirectory + ProviderDirectory,
    {
        let mut summary = SummaryReport::default();
        for provider in directory.providers() {
            if let Some(tally) = self.provider_totals(provider, store, directory, reference)? {
                summary.push(SummaryEntry {
                    provider_name: provider.name().to_string(),
                    consultations: tally.consultations,
                    fee_total: tally.fee_total,
                });
            }
        }

        let label = self.week.period_label(reference);
        self.emit(ReportKind::Summary, None, &label, manager_requested, sink, |w| {
            report::write_summary_report(w, &summary)
        })?;

        tracing::debug!(providers = summary.total_providers, "Wrote summary report");
        Ok(summary)
    }

    /// Write every weekly report for the period closing at `boundary`.
    ///
    /// Member reports come first, then provider reports, each provider's EFT
    /// and summary entries streamed as its report completes. Records are not
    /// evicted here.
    pub fn run_settlement<D>(
        &self,
        store: &ServiceRecordStore,
        directory: &D,
        boundary: NaiveDateTime,
        sink: &mut dyn ReportSink,
    ) -> Result<SettlementReports>
    where
        D: MemberDirectory + ProviderDirectory,
    {
        let label = self.week.period_label(boundary);
        let mut eft_writer = sink
            .open(ReportKind::Eft, None, &label, false)
            .map_err(|e| Error::sink(ReportKind::Eft, e))?;
        let mut summary_writer = sink
            .open(ReportKind::Summary, None, &label, false)
            .map_err(|e| Error::sink(ReportKind::Summary, e))?;
        report::write_summary_intro(&mut *summary_writer)
            .map_err(|e| Error::sink(ReportKind::Summary, e))?;

        let mut reports = SettlementReports::default();

        for member in directory.members() {
            let cursor = store.cursor_from_member(member.id);
            if Self::has_in_period_records(&cursor, boundary) {
                let request = ReportRequest::new(member.id, cursor, boundary, false);
                self.generate_member_report(request, directory, sink)?;
                reports.member_reports += 1;
            }
        }

        for provider in directory.providers() {
            let cursor = store.cursor_from_provider(provider.id);
            if !Self::has_in_period_records(&cursor, boundary) {
                continue;
            }

            let request = ReportRequest::new(provider.id, cursor, boundary, false);
            let provider_report = self.generate_provider_report(request, directory, sink)?;
            reports.provider_reports += 1;

            let eft_entry = EftEntry {
                provider_name: provider.name().to_string(),
                provider_id: provider.id,
                amount: provider_report.fee_total,
            };
            report::write_eft_entry(&mut *eft_writer, &eft_entry)
                .map_err(|e| Error::sink(ReportKind::Eft, e))?;
            reports.eft.entries.push(eft_entry);

            let summary_entry = SummaryEntry {
                provider_name: provider.name().to_string(),
                consultations: provider_report.consultations,
                fee_total: provider_report.fee_total,
            };
            report::write_summary_entry(&mut *summary_writer, &summary_entry)
                .map_err(|e| Error::sink(ReportKind::Summary, e))?;
            reports.summary.push(summary_entry);
        }

        report::write_summary_totals(&mut *summary_writer, &reports.summary)
            .and_then(|_| summary_writer.flush())
            .map_err(|e| Error::sink(ReportKind::Summary, e))?;
        eft_writer
            .flush()
            .map_err(|e| Error::sink(ReportKind::Eft, e))?;

        Ok(reports)
    }

    fn emit<F>(
        &self,
        kind: ReportKind,
        subject: Option<u32>,
        label: &str,
        manager_requested: bool,
        sink: &mut dyn ReportSink,
        render: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
    {
        let mut writer = sink
            .open(kind, subject, label, manager_requested)
            .map_err(|e| Error::sink(kind, e))?;
        render(&mut *writer)
            .and_then(|_| writer.flush())
            .map_err(|e| {
                tracing::error!(%kind, error = %e, "Report write failed");
                Error::sink(kind, e)
            })
    }
}
