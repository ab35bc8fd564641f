//! Error types for settlement engine

use crate::sink::ReportKind;
use chrono::NaiveDate;
use ledger_core::{MemberId, ProviderId};
use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error (unknown member, provider or service among others)
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Opening or writing a report sink failed
    #[error("Failed to write {kind} report: {source}")]
    Sink {
        /// Report being written
        kind: ReportKind,
        /// Underlying IO failure
        #[source]
        source: std::io::Error,
    },

    /// Member may not receive services
    #[error("Member {0} is suspended")]
    MemberSuspended(MemberId),

    /// Service date lies after the provider's current date
    #[error("Service date {service_date} is after the provider's current date {provider_date}")]
    ServiceDateInFuture {
        /// Requested service date
        service_date: NaiveDate,
        /// Provider's local date
        provider_date: NaiveDate,
    },

    /// Provider clock outside the accepted window around the global clock
    #[error("Provider {provider} clock is {offset_secs}s from the global clock")]
    InvalidTimeZone {
        /// Provider being registered
        provider: ProviderId,
        /// Provider clock minus global clock
        offset_secs: i64,
    },

    /// Entity still has unsettled service records
    #[error("Unsettled records remain for {0}")]
    RecordsPending(String),

    /// Advancing the clock would leave the representable range
    #[error("Cannot advance clock by {0} seconds")]
    ClockOverflow(u64),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a sink failure for the given report kind
    pub fn sink(kind: ReportKind, source: std::io::Error) -> Self {
        Error::Sink { kind, source }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
