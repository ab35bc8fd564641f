//! Core types for the ledger
//!
//! All types are designed for:
//! - Plain-value semantics (records are never mutated once stored)
//! - Deterministic ordering (ids and keys are `Ord`)
//! - Exact arithmetic (Decimal for fees)

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create from the raw number
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            /// Raw number
            pub const fn get(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }
    };
}

numeric_id!(
    /// Member number (9 digits in practice)
    MemberId
);
numeric_id!(
    /// Provider number (9 digits in practice)
    ProviderId
);
numeric_id!(
    /// Service code (6 digits in practice)
    ServiceCode
);

/// Composite sort key and identity of a stored record.
///
/// `sequence` is assigned by the store at insert time and only breaks ties
/// between records committed at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Commit timestamp
    pub written_at: NaiveDateTime,

    /// Insertion sequence number
    pub sequence: u64,
}

/// A service rendered by a provider to a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// When the record was committed (provider's local clock)
    pub written_at: NaiveDateTime,

    /// Calendar date the service took place
    pub service_date: NaiveDate,

    /// Provider who rendered the service
    pub provider_id: ProviderId,

    /// Member who received the service
    pub member_id: MemberId,

    /// Code of the service rendered
    pub service_code: ServiceCode,

    /// Free-text comments
    #[serde(default)]
    pub comments: String,
}

impl ServiceRecord {
    /// Create new service record
    pub fn new(
        written_at: NaiveDateTime,
        service_date: NaiveDate,
        provider_id: ProviderId,
        member_id: MemberId,
        service_code: ServiceCode,
        comments: impl Into<String>,
    ) -> Self {
        Self {
            written_at,
            service_date,
            provider_id,
            member_id,
            service_code,
            comments: comments.into(),
        }
    }
}

/// Name and postal address shared by members and providers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Full name
    pub name: String,

    /// Street address
    pub street: String,

    /// City
    pub city: String,

    /// Two-letter state code
    pub state: String,

    /// ZIP code
    pub zip: String,
}

impl Contact {
    /// Contact with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Membership status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MemberStatus {
    /// Member may receive services
    #[default]
    Active,
    /// Member is suspended (e.g. unpaid dues)
    Suspended,
}

/// ChocAn member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member number
    pub id: MemberId,

    /// Name and address
    pub contact: Contact,

    /// Membership status
    #[serde(default)]
    pub status: MemberStatus,
}

impl Member {
    /// Create active member
    pub fn new(id: MemberId, contact: Contact) -> Self {
        Self {
            id,
            contact,
            status: MemberStatus::Active,
        }
    }

    /// Member display name
    pub fn name(&self) -> &str {
        &self.contact.name
    }

    /// Check if member may receive services
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

/// Entry in a provider's service catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service code
    pub code: ServiceCode,

    /// Service name
    pub name: String,

    /// Fee charged for the service
    pub fee: Decimal,
}

impl Service {
    /// Create new service
    pub fn new(code: ServiceCode, name: impl Into<String>, fee: Decimal) -> Self {
        Self {
            code,
            name: name.into(),
            fee,
        }
    }
}

/// ChocAn provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Provider number
    pub id: ProviderId,

    /// Name and address
    pub contact: Contact,

    /// Provider's local clock; moves in lockstep with the global clock
    pub local_clock: NaiveDateTime,

    /// Services offered, keyed by code
    #[serde(default)]
    pub services: BTreeMap<ServiceCode, Service>,
}

impl Provider {
    /// Create provider with an empty service catalog
    pub fn new(id: ProviderId, contact: Contact, local_clock: NaiveDateTime) -> Self {
        Self {
            id,
            contact,
            local_clock,
            services: BTreeMap::new(),
        }
    }

    /// Builder-style service registration
    pub fn with_service(mut self, service: Service) -> Self {
        self.add_service(service);
        self
    }

    /// Provider display name
    pub fn name(&self) -> &str {
        &self.contact.name
    }

    /// Add a service; returns false if the code was already present
    pub fn add_service(&mut self, service: Service) -> bool {
        if self.services.contains_key(&service.code) {
            return false;
        }
        self.services.insert(service.code, service);
        true
    }

    /// Remove a service by code
    pub fn remove_service(&mut self, code: ServiceCode) -> Option<Service> {
        self.services.remove(&code)
    }

    /// Look up a service by code
    pub fn service(&self, code: ServiceCode) -> Option<&Service> {
        self.services.get(&code)
    }

    /// Local clock `seconds` from now, if representable
    pub fn clock_after(&self, seconds: u64) -> Option<NaiveDateTime> {
        let seconds = i64::try_from(seconds).ok()?;
        self.local_clock
            .checked_add_signed(Duration::try_seconds(seconds)?)
    }

    /// Shift the local clock forward, stopping at the last representable
    /// instant. Check [`Provider::clock_after`] first.
    pub fn shift_clock(&mut self, seconds: u64) {
        self.local_clock = self.clock_after(seconds).unwrap_or(NaiveDateTime::MAX);
    }
}
