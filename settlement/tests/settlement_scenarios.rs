//! End-to-end settlement scenarios
//!
//! Drives a full engine through week boundaries and checks what ends up in
//! the reports and in the store.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ledger_core::{
    Contact, Member, MemberId, Provider, ProviderDirectory, ProviderId, Service, ServiceCode,
    ServiceRecord,
};
use rust_decimal::Decimal;
use settlement::{Config, Error, FileSink, MemorySink, ReportKind, ReportSink, SettlementEngine};
use std::io::{self, Write};

const WEEK_ONE: &str = "11-28-2015 to 12-04-2015";

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2015, 12, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn boundary() -> NaiveDateTime {
    at(4, 23, 59)
}

fn member(id: u32, name: &str) -> Member {
    Member::new(MemberId::new(id), Contact::named(name))
}

fn provider(id: u32, name: &str, clock: NaiveDateTime) -> Provider {
    Provider::new(ProviderId::new(id), Contact::named(name), clock)
        .with_service(Service::new(ServiceCode::new(100), "Dietitian", Decimal::new(1000, 2)))
        .with_service(Service::new(ServiceCode::new(200), "Aerobics", Decimal::new(2000, 2)))
}

fn back_entry(written_at: NaiveDateTime, provider: u32, member: u32, code: u32) -> ServiceRecord {
    ServiceRecord::new(
        written_at,
        written_at.date(),
        ProviderId::new(provider),
        MemberId::new(member),
        ServiceCode::new(code),
        "",
    )
}

/// Engine at `now` with members 1..=2 and provider 10, sharing a memory sink
fn setup(now: NaiveDateTime) -> (SettlementEngine, MemorySink) {
    let sink = MemorySink::new();
    let mut engine = SettlementEngine::new(Config::default(), now, Box::new(sink.clone())).unwrap();
    engine.register_member(member(1, "Ana Ruiz")).unwrap();
    engine.register_member(member(2, "Ben Ode")).unwrap();
    engine.register_provider(provider(10, "Dr. Hale", now)).unwrap();
    (engine, sink)
}

#[test]
fn scenario_a_literal_advance_stops_short_of_boundary() {
    // Thursday 10:00 + 36h is Friday 22:00, still before the week closes
    let (mut engine, sink) = setup(at(3, 10, 0));
    engine.insert(back_entry(at(3, 9, 0), 10, 1, 100));

    let outcomes = engine.advance_by(129_600).unwrap();
    assert!(outcomes.is_empty());
    assert_eq!(engine.now(), at(4, 22, 0));
    assert_eq!(engine.store().len(), 1);
    assert!(sink.is_empty());
}

#[test]
fn scenario_a_single_crossing_evicts_settled_records() {
    let (mut engine, sink) = setup(at(3, 12, 0));
    engine.insert(back_entry(at(3, 9, 0), 10, 1, 100));
    engine.insert(back_entry(at(4, 23, 0), 10, 2, 200));
    // Written after the boundary by a provider ahead of the global clock
    engine.insert(back_entry(at(5, 0, 30), 10, 1, 100));

    // Thursday 12:00 + 36h is Saturday 00:00
    let outcomes = engine.advance_by(129_600).unwrap();
    assert_eq!(outcomes.len(), 1);

    let outcome = &outcomes[0];
    assert_eq!(outcome.boundary, boundary());
    assert_eq!(outcome.period_label, WEEK_ONE);
    assert_eq!(outcome.member_reports, 2);
    assert_eq!(outcome.provider_reports, 1);
    assert_eq!(outcome.evicted, 2);

    assert_eq!(engine.now(), at(5, 0, 0));
    assert_eq!(engine.store().len(), 1);
    assert!(engine.store().iter().all(|(_, r)| r.written_at > boundary()));

    // Provider clock moved in lockstep
    let clock = engine
        .directory()
        .provider(ProviderId::new(10))
        .map(|p| p.local_clock);
    assert_eq!(clock, Some(at(5, 0, 0)));

    assert!(sink.report(ReportKind::Member, Some(1), WEEK_ONE, "Main.txt").is_some());
    assert!(sink.report(ReportKind::Member, Some(2), WEEK_ONE, "Main.txt").is_some());
    assert!(sink.report(ReportKind::Provider, Some(10), WEEK_ONE, "Main.txt").is_some());
    assert!(sink.report(ReportKind::Eft, None, WEEK_ONE, "Main.txt").is_some());
    assert!(sink.report(ReportKind::Summary, None, WEEK_ONE, "Main.txt").is_some());
}

#[test]
fn member_served_across_time_zones_is_reported_before_eviction() {
    let (mut engine, sink) = setup(at(4, 12, 0));
    // Provider 20 runs 20 hours ahead, already in the next billing week
    engine.register_provider(provider(20, "Dr. Ames", at(5, 8, 0))).unwrap();

    engine
        .record_service(ProviderId::new(20), MemberId::new(1), ServiceCode::new(200), at(5, 8, 0).date(), "")
        .unwrap();
    engine
        .record_service(ProviderId::new(10), MemberId::new(1), ServiceCode::new(100), at(4, 12, 0).date(), "")
        .unwrap();

    let outcomes = engine.advance_by(86_400).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].member_reports, 1);
    assert_eq!(outcomes[0].provider_reports, 1);
    assert_eq!(outcomes[0].evicted, 1);

    let report = sink
        .report(ReportKind::Member, Some(1), WEEK_ONE, "Main.txt")
        .unwrap();
    assert!(report.contains("Dr. Hale"));
    assert!(!report.contains("Dr. Ames"));

    // The next-week record stays for the following batch
    assert_eq!(engine.store().len(), 1);
    assert_eq!(engine.cursor_from_member(MemberId::new(1)).count(), 1);
}

#[test]
fn late_back_entry_is_billed_in_its_own_week() {
    let (mut engine, sink) = setup(at(4, 12, 0));
    // Next-week record arrives first, then a back-entry from Friday morning
    engine.insert(back_entry(at(5, 1, 0), 10, 2, 200));
    engine.insert(back_entry(at(4, 9, 0), 10, 1, 100));

    let outcomes = engine.advance_by(86_400).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].evicted, 1);
    assert_eq!(outcomes[0].provider_reports, 1);
    assert_eq!(outcomes[0].eft.entries.len(), 1);
    assert_eq!(outcomes[0].eft.entries[0].amount, Decimal::new(1000, 2));
    assert_eq!(outcomes[0].summary.total_consultations, 1);

    assert!(sink.report(ReportKind::Member, Some(1), WEEK_ONE, "Main.txt").is_some());
    assert!(sink.report(ReportKind::Member, Some(2), WEEK_ONE, "Main.txt").is_none());
    assert_eq!(engine.store().len(), 1);
}

#[test]
fn scenario_b_provider_totals_flow_into_summary() {
    let (mut engine, sink) = setup(at(3, 12, 0));
    engine.insert(back_entry(at(1, 10, 0), 10, 1, 100));
    engine.insert(back_entry(at(2, 10, 0), 10, 2, 200));

    let outcomes = engine.advance_by(2 * 86_400).unwrap();
    let outcome = &outcomes[0];

    assert_eq!(outcome.summary.entries.len(), 1);
    assert_eq!(outcome.summary.entries[0].consultations, 2);
    assert_eq!(outcome.summary.entries[0].fee_total, Decimal::new(3000, 2));
    assert_eq!(outcome.summary.total_providers, 1);
    assert_eq!(outcome.summary.total_consultations, 2);
    assert_eq!(outcome.summary.total_fees, Decimal::new(3000, 2));

    let provider_text = sink
        .report(ReportKind::Provider, Some(10), WEEK_ONE, "Main.txt")
        .unwrap();
    assert!(provider_text.contains("Total number of consultations with members: 2\n"));
    assert!(provider_text.ends_with("Total fee for the week: $30.00"));

    let summary_text = sink
        .report(ReportKind::Summary, None, WEEK_ONE, "Main.txt")
        .unwrap();
    assert!(summary_text.contains(
        "Provider name: Dr. Hale\nNumber of consultations: 2\nOverall fee total: $30.00\n\n"
    ));
    assert!(summary_text.ends_with("Total consultations: 2\nTotal fees: $30.00\n"));
}

#[test]
fn scenario_c_totals_clamped_in_eft() {
    let now = at(3, 12, 0);
    let sink = MemorySink::new();
    let mut engine = SettlementEngine::new(Config::default(), now, Box::new(sink.clone())).unwrap();
    engine.register_member(member(1, "Ana Ruiz")).unwrap();
    engine
        .register_provider(
            Provider::new(ProviderId::new(10), Contact::named("Dr. Hale"), now).with_service(
                Service::new(ServiceCode::new(300), "Therapy", Decimal::new(10_005, 2)),
            ),
        )
        .unwrap();

    // 1000 consultations at 100.05 each is 100050.00
    for i in 0..1000 {
        engine.insert(back_entry(at(1, 0, 0) + Duration::seconds(i), 10, 1, 300));
    }

    let outcomes = engine.advance_by(2 * 86_400).unwrap();
    let outcome = &outcomes[0];

    assert_eq!(outcome.eft.entries.len(), 1);
    assert_eq!(outcome.eft.entries[0].amount, Decimal::new(9_999_999, 2));
    assert_eq!(outcome.summary.entries[0].consultations, 999);

    let eft_text = sink.report(ReportKind::Eft, None, WEEK_ONE, "Main.txt").unwrap();
    assert!(eft_text.contains("Amount to be transferred: $99,999.99\n"));
    assert!(!eft_text.contains("100,050.00"));
}

#[test]
fn summary_grand_totals_are_not_clamped() {
    let now = at(3, 12, 0);
    let (mut engine, _sink) = setup(now);
    engine
        .register_provider(
            Provider::new(ProviderId::new(11), Contact::named("Dr. Vale"), now)
                .with_service(Service::new(ServiceCode::new(300), "Therapy", Decimal::new(9_999_999, 2))),
        )
        .unwrap();

    engine.insert(back_entry(at(1, 0, 0), 11, 1, 300));
    engine.insert(back_entry(at(1, 0, 1), 11, 1, 300));
    engine.insert(back_entry(at(1, 0, 2), 10, 1, 100));

    let outcomes = engine.advance_by(2 * 86_400).unwrap();
    let summary = &outcomes[0].summary;

    // Provider 11 is capped at 99999.99; the grand total adds provider 10 on top
    assert_eq!(summary.entries[1].fee_total, Decimal::new(9_999_999, 2));
    assert_eq!(summary.total_fees, Decimal::new(10_000_999, 2));
}

#[test]
fn multi_week_advance_runs_one_batch_per_boundary() {
    let (mut engine, sink) = setup(at(3, 12, 0));
    engine.insert(back_entry(at(3, 11, 0), 10, 1, 100));
    engine.insert(back_entry(at(9, 11, 0), 10, 2, 100));

    let outcomes = engine.advance_by(14 * 86_400).unwrap();
    let labels: Vec<_> = outcomes.iter().map(|o| o.period_label.as_str()).collect();
    assert_eq!(labels, vec![WEEK_ONE, "12-05-2015 to 12-11-2015"]);
    assert_eq!(outcomes[0].evicted, 1);
    assert_eq!(outcomes[1].evicted, 1);
    assert!(engine.store().is_empty());

    // Each record appears in exactly one week's member reports
    let week_two = "12-05-2015 to 12-11-2015";
    assert!(sink.report(ReportKind::Member, Some(1), WEEK_ONE, "Main.txt").is_some());
    assert!(sink.report(ReportKind::Member, Some(1), week_two, "Main.txt").is_none());
    assert!(sink.report(ReportKind::Member, Some(2), week_two, "Main.txt").is_some());

    assert_eq!(engine.metrics().batches_total.get(), 2);
    assert_eq!(engine.metrics().records_evicted.get(), 2);
}

#[test]
fn empty_week_still_writes_eft_and_summary() {
    let (mut engine, sink) = setup(at(3, 12, 0));

    let outcomes = engine.advance_by(2 * 86_400).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].member_reports, 0);

    let summary = sink.report(ReportKind::Summary, None, WEEK_ONE, "Main.txt").unwrap();
    assert!(summary.ends_with("Total number of providers who provided services: 0\nTotal consultations: 0\nTotal fees: $0.00\n"));
    assert_eq!(sink.report(ReportKind::Eft, None, WEEK_ONE, "Main.txt").as_deref(), Some(""));
}

#[test]
fn record_at_exact_boundary_is_evicted() {
    let (mut engine, sink) = setup(at(3, 12, 0));
    engine.insert(back_entry(boundary(), 10, 1, 100));

    let outcomes = engine.advance_by(2 * 86_400).unwrap();
    assert_eq!(outcomes[0].member_reports, 0);
    assert_eq!(outcomes[0].evicted, 1);
    assert!(sink.report(ReportKind::Member, Some(1), WEEK_ONE, "Main.txt").is_none());
}

/// Sink that fails every open of one report kind
#[derive(Debug)]
struct FailingSink {
    inner: MemorySink,
    fail_on: ReportKind,
}

impl ReportSink for FailingSink {
    fn open(
        &mut self,
        kind: ReportKind,
        subject: Option<u32>,
        period_label: &str,
        manager_requested: bool,
    ) -> io::Result<Box<dyn Write>> {
        if kind == self.fail_on {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only report volume"));
        }
        self.inner.open(kind, subject, period_label, manager_requested)
    }
}

#[test]
fn sink_failure_aborts_batch_and_keeps_records() {
    let now = at(3, 12, 0);
    let sink = FailingSink {
        inner: MemorySink::new(),
        fail_on: ReportKind::Provider,
    };
    let mut engine = SettlementEngine::new(Config::default(), now, Box::new(sink)).unwrap();
    engine.register_member(member(1, "Ana Ruiz")).unwrap();
    engine.register_provider(provider(10, "Dr. Hale", now)).unwrap();
    engine.insert(back_entry(at(3, 11, 0), 10, 1, 100));

    let result = engine.advance_by(2 * 86_400);
    assert!(matches!(
        result,
        Err(Error::Sink { kind: ReportKind::Provider, .. })
    ));

    // Clock parked on the boundary, nothing evicted, no batch counted
    assert_eq!(engine.now(), boundary());
    assert_eq!(engine.store().len(), 1);
    assert_eq!(engine.metrics().batches_total.get(), 0);
}

#[test]
fn file_sink_layout() {
    let temp_dir = tempfile::tempdir().unwrap();
    let now = at(3, 12, 0);
    let mut engine = SettlementEngine::new(
        Config::default(),
        now,
        Box::new(FileSink::new(temp_dir.path())),
    )
    .unwrap();
    engine.register_member(member(1, "Ana Ruiz")).unwrap();
    engine.register_provider(provider(10, "Dr. Hale", now)).unwrap();
    engine.insert(back_entry(at(3, 11, 0), 10, 1, 100));

    // Manager report mid-week, then the weekly batch
    engine.eft_report().unwrap();
    engine.eft_report().unwrap();
    engine.advance_by(2 * 86_400).unwrap();

    let week_dir = format!("Reports for {}", WEEK_ONE);
    let root = temp_dir.path();
    assert!(root.join("Members/1").join(&week_dir).join("Main.txt").exists());
    assert!(root.join("Providers/10").join(&week_dir).join("Main.txt").exists());
    assert!(root.join("EFT_Reports").join(&week_dir).join("1.txt").exists());
    assert!(root.join("EFT_Reports").join(&week_dir).join("2.txt").exists());
    assert!(root.join("EFT_Reports").join(&week_dir).join("Main.txt").exists());
    assert!(root.join("Summary_Reports").join(&week_dir).join("Main.txt").exists());

    let provider_text =
        std::fs::read_to_string(root.join("Providers/10").join(&week_dir).join("Main.txt")).unwrap();
    assert!(provider_text.contains(
        "\tDate and time data were received by the computer: 12-03-2015 11:00:00\n"
    ));
}
