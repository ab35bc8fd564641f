//! Report values and their plain-text rendering

use crate::week::{date_range, DATE_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use ledger_core::{Contact, MemberId, ProviderId, ServiceCode};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::io::{self, Write};

/// Time format used for received-at stamps
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Subject block and intro shared by member and provider reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportHeader {
    /// Member or provider number
    pub subject_id: u32,

    /// Name and address of the subject
    pub contact: Contact,

    /// First day of the billing week
    pub period_start: NaiveDate,

    /// Reference instant the report was cut at
    pub reference: NaiveDateTime,

    /// Requested by a manager rather than produced by settlement
    pub manager_requested: bool,
}

/// One service received by a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberLine {
    /// Date of service
    pub service_date: NaiveDate,

    /// Provider who rendered the service
    pub provider_name: String,

    /// Service name from the provider's catalog
    pub service_name: String,
}

/// Weekly or manager-requested member report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberReport {
    /// Member the report is about
    pub member_id: MemberId,

    /// Subject block
    pub header: ReportHeader,

    /// Services in the period, in the member's record order
    pub lines: Vec<MemberLine>,
}

/// One consultation given by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderLine {
    /// Date of service
    pub service_date: NaiveDate,

    /// When the record reached the data center
    pub written_at: NaiveDateTime,

    /// Member served
    pub member_name: String,

    /// Member number
    pub member_id: MemberId,

    /// Service code
    pub service_code: ServiceCode,

    /// Fee for this service
    pub fee: Decimal,
}

/// Weekly or manager-requested provider report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderReport {
    /// Provider the report is about
    pub provider_id: ProviderId,

    /// Subject block
    pub header: ReportHeader,

    /// Consultations in the period, in the provider's record order
    pub lines: Vec<ProviderLine>,

    /// Consultation count, clamped
    pub consultations: u32,

    /// Fee total, clamped
    pub fee_total: Decimal,
}

/// Amount owed to one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EftEntry {
    /// Provider name
    pub provider_name: String,

    /// Provider number
    pub provider_id: ProviderId,

    /// Clamped weekly fee total
    pub amount: Decimal,
}

/// Statement of amounts owed to providers for one period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EftReport {
    /// One entry per provider with in-period services, ascending id
    pub entries: Vec<EftEntry>,
}

/// Per-provider line of the summary report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    /// Provider name
    pub provider_name: String,

    /// Clamped consultation count
    pub consultations: u32,

    /// Clamped fee total
    pub fee_total: Decimal,
}

/// Database-wide summary for one period
///
/// Grand totals add up the clamped per-provider values and are not clamped
/// themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    /// One entry per provider with in-period services, ascending id
    pub entries: Vec<SummaryEntry>,

    /// Providers who provided services
    pub total_providers: u32,

    /// Sum of consultation counts
    pub total_consultations: u64,

    /// Sum of fee totals
    pub total_fees: Decimal,
}

impl SummaryReport {
    /// Append one provider and update the grand totals
    pub fn push(&mut self, entry: SummaryEntry) {
        self.total_providers += 1;
        self.total_consultations += u64::from(entry.consultations);
        self.total_fees += entry.fee_total;
        self.entries.push(entry);
    }
}

/// Format an amount as US currency, e.g. `$1,234.56`
pub fn format_usd(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}${}.{}", sign, grouped, cents)
}

fn write_contact(w: &mut dyn Write, label: &str, id: u32, contact: &Contact) -> io::Result<()> {
    writeln!(w, "{} name: {}", label, contact.name)?;
    writeln!(w, "{} number: {}", label, id)?;
    writeln!(w, "{} street address: {}", label, contact.street)?;
    writeln!(w, "{} city: {}", label, contact.city)?;
    writeln!(w, "{} state: {}", label, contact.state)?;
    writeln!(w, "{} zip code: {}", label, contact.zip)
}

fn write_intro(
    w: &mut dyn Write,
    header: &ReportHeader,
    label: &str,
    subject: &str,
    direction: &str,
) -> io::Result<()> {
    write_contact(w, label, header.subject_id, &header.contact)?;
    writeln!(w)?;

    let request = if header.manager_requested {
        "manager requested"
    } else {
        "weekly"
    };
    writeln!(
        w,
        "Below is your {} {} report of all services provided {} you for the",
        request, subject, direction
    )?;
    writeln!(
        w,
        "dates of {}:",
        date_range(header.period_start, header.reference.date())
    )?;
    writeln!(w)
}

/// Render a member report
pub fn write_member_report(w: &mut dyn Write, report: &MemberReport) -> io::Result<()> {
    write_intro(w, &report.header, "Member", "member", "to")?;

    for line in &report.lines {
        writeln!(w, "\tDate of service: {}", line.service_date.format(DATE_FORMAT))?;
        writeln!(w, "\tProvider name: {}", line.provider_name)?;
        writeln!(w, "\tService name: {}", line.service_name)?;
        writeln!(w)?;
    }

    Ok(())
}

/// Render a provider report
pub fn write_provider_report(w: &mut dyn Write, report: &ProviderReport) -> io::Result<()> {
    write_intro(w, &report.header, "Provider", "provider", "by")?;

    for line in &report.lines {
        writeln!(w, "\tDate of service: {}", line.service_date.format(DATE_FORMAT))?;
        writeln!(
            w,
            "\tDate and time data were received by the computer: {} {}",
            line.written_at.format(DATE_FORMAT),
            line.written_at.format(TIME_FORMAT)
        )?;
        writeln!(w, "\tMember name: {}", line.member_name)?;
        writeln!(w, "\tMember code: {}", line.member_id)?;
        writeln!(w, "\tService code: {}", line.service_code)?;
        writeln!(w, "\tFee to be paid: {}", format_usd(line.fee))?;
        writeln!(w)?;
    }

    writeln!(w, "Total number of consultations with members: {}", report.consultations)?;
    write!(w, "Total fee for the week: {}", format_usd(report.fee_total))
}

/// Render one EFT entry
pub fn write_eft_entry(w: &mut dyn Write, entry: &EftEntry) -> io::Result<()> {
    writeln!(w, "Provider name: {}", entry.provider_name)?;
    writeln!(w, "Provider number: {}", entry.provider_id)?;
    writeln!(w, "Amount to be transferred: {}", format_usd(entry.amount))?;
    writeln!(w)
}

/// Render a complete EFT report
pub fn write_eft_report(w: &mut dyn Write, report: &EftReport) -> io::Result<()> {
    for entry in &report.entries {
        write_eft_entry(w, entry)?;
    }
    Ok(())
}

/// Render the summary introduction
pub fn write_summary_intro(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "This is the summary report. Below you will find all of the providers that need to be")?;
    writeln!(w, "paid for that week, the number of consultations that each of them had, and the total")?;
    writeln!(w, "amount that needs to be paid to them.")?;
    writeln!(w)
}

/// Render one summary entry
pub fn write_summary_entry(w: &mut dyn Write, entry: &SummaryEntry) -> io::Result<()> {
    writeln!(w, "Provider name: {}", entry.provider_name)?;
    writeln!(w, "Number of consultations: {}", entry.consultations)?;
    writeln!(w, "Overall fee total: {}", format_usd(entry.fee_total))?;
    writeln!(w)
}

/// Render the summary grand totals
pub fn write_summary_totals(w: &mut dyn Write, report: &SummaryReport) -> io::Result<()> {
    writeln!(w, "Total number of providers who provided services: {}", report.total_providers)?;
    writeln!(w, "Total consultations: {}", report.total_consultations)?;
    writeln!(w, "Total fees: {}", format_usd(report.total_fees))
}

/// Render a complete summary report
pub fn write_summary_report(w: &mut dyn Write, report: &SummaryReport) -> io::Result<()> {
    write_summary_intro(w)?;
    for entry in &report.entries {
        write_summary_entry(w, entry)?;
    }
    write_summary_totals(w, report)
}
