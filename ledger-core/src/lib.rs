//! ChocAn Ledger Core
//!
//! In-memory service-record ledger with member and provider lookup paths.
//!
//! # Architecture
//!
//! - **Primary store**: every service record, totally ordered by
//!   `(written_at, sequence)` so identical timestamps never collapse
//! - **Per-entity indices**: one chronological index per member and per
//!   provider, kept in lockstep with the primary store
//! - **Directories**: members, providers and each provider's service catalog
//! - **Limits**: numeric caps applied before totals are reported

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]
//!
//! # Invariants
//!
//! - Forward iteration of the primary store yields non-decreasing `written_at`
//! - A cursor for an id yields exactly the stored records carrying that id
//! - Records are immutable; they leave the store only through [`ServiceRecordStore::filter`]

pub mod types;
pub mod limits;
pub mod store;
pub mod directory;
pub mod snapshot;
pub mod error;
pub mod config;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    Contact, Member, MemberId, MemberStatus, Provider, ProviderId, RecordKey, Service,
    ServiceCode, ServiceRecord,
};
pub use limits::{clamp_amount, clamp_count, Limits};
pub use store::{Cursor, ServiceRecordStore};
pub use directory::{Directory, MemberDirectory, ProviderDirectory};
pub use snapshot::{LedgerSnapshot, RestoredLedger};
pub use config::Config;
