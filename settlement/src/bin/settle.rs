//! Settlement runner
//!
//! Loads the ledger snapshot, applies one operator command and saves the
//! snapshot back.
//!
//! Usage:
//!   settle --config settlement.toml advance --days 3
//!   settle report summary
//!   settle status

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use ledger_core::{LedgerSnapshot, MemberId, ProviderId};
use settlement::{Config, FileSink, SettlementEngine};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "settle")]
#[command(about = "Advance the data center clock and write settlement reports")]
struct Args {
    /// Configuration file (TOML); defaults plus environment overrides if absent
    #[arg(short, long, env = "SETTLEMENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Advance the clock, settling every week boundary crossed
    Advance {
        /// Days to advance (capped at the configured maximum)
        #[arg(long, conflicts_with = "hours", allow_negative_numbers = true)]
        days: Option<i64>,

        /// Hours to advance (capped at 24 times the configured maximum days)
        #[arg(long, allow_negative_numbers = true)]
        hours: Option<i64>,
    },

    /// Write a manager-requested report at the current clock
    Report {
        /// Report kind
        #[arg(value_enum)]
        kind: ManagerReport,

        /// Member or provider number
        #[arg(long)]
        id: Option<u32>,
    },

    /// Print clock, directory sizes and metrics
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ManagerReport {
    Member,
    Provider,
    Eft,
    Summary,
}

/// Seconds to advance for the requested days or hours, capped like the
/// operator terminal
fn advance_seconds(days: Option<i64>, hours: Option<i64>, max_days: u32) -> anyhow::Result<u64> {
    let (amount, unit, cap, unit_seconds) = match (days, hours) {
        (Some(d), None) => (d, "days", i64::from(max_days), 86_400u64),
        (None, Some(h)) => (h, "hours", 24 * i64::from(max_days), 3_600u64),
        _ => bail!("Specify exactly one of --days or --hours"),
    };

    if amount < 0 {
        bail!("Negative time amount entered; cannot advance {}", unit);
    }
    if amount > cap {
        warn!(requested = amount, cap, unit, "Advance capped");
    }

    Ok(amount.min(cap) as u64 * unit_seconds)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    info!("Starting {} v{}", config.service_name, config.service_version);

    let snapshot_path = config.ledger.snapshot_path();
    let sink = Box::new(FileSink::new(config.reports.output_dir.clone()));
    let mut engine = if snapshot_path.exists() {
        let snapshot = LedgerSnapshot::load(&snapshot_path)
            .with_context(|| format!("loading snapshot {}", snapshot_path.display()))?;
        SettlementEngine::from_snapshot(config.clone(), snapshot, sink)?
    } else {
        info!(path = %snapshot_path.display(), "No snapshot found; starting empty ledger");
        SettlementEngine::new(config.clone(), chrono::Local::now().naive_local(), sink)?
    };

    match args.command {
        Command::Advance { days, hours } => {
            let seconds = advance_seconds(days, hours, config.max_advance_days)?;
            let outcomes = engine.advance_by(seconds)?;
            for outcome in &outcomes {
                println!(
                    "Settled {}: {} member reports, {} provider reports, {} records evicted",
                    outcome.period_label,
                    outcome.member_reports,
                    outcome.provider_reports,
                    outcome.evicted
                );
            }
            println!("Clock is now {}", engine.now());
        }
        Command::Report { kind, id } => match kind {
            ManagerReport::Member => {
                let id = id.context("--id is required for member reports")?;
                if engine.member_report(MemberId::new(id))?.is_none() {
                    println!("Member {} has no services this week", id);
                }
            }
            ManagerReport::Provider => {
                let id = id.context("--id is required for provider reports")?;
                if engine.provider_report(ProviderId::new(id))?.is_none() {
                    println!("Provider {} has no services this week", id);
                }
            }
            ManagerReport::Eft => {
                let eft = engine.eft_report()?;
                println!("EFT report written with {} entries", eft.entries.len());
            }
            ManagerReport::Summary => {
                let summary = engine.summary_report()?;
                println!(
                    "Summary report written: {} providers, {} consultations",
                    summary.total_providers, summary.total_consultations
                );
            }
        },
        Command::Status => {
            println!("Clock: {}", engine.now());
            println!("Members: {}", engine.directory().member_count());
            println!("Providers: {}", engine.directory().provider_count());
            println!("Unsettled records: {}", engine.store().len());
            print!("{}", engine.metrics().encode()?);
        }
    }

    engine
        .snapshot()
        .save(&snapshot_path)
        .with_context(|| format!("saving snapshot {}", snapshot_path.display()))?;

    info!("Shutting down settlement runner");
    Ok(())
}
