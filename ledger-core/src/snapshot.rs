//! JSON snapshot of the data center state
//!
//! Captures the global clock, both directories and every stored record so a
//! later run can resume where the previous one stopped. Records are written in
//! chronological order and re-inserted in that order on restore.

use crate::{
    directory::Directory,
    store::ServiceRecordStore,
    types::{Member, Provider, ServiceRecord},
    Result,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serializable data center state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Global clock
    pub clock: NaiveDateTime,

    /// Boundary of the most recent settlement batch, if any
    #[serde(default)]
    pub last_settlement: Option<NaiveDateTime>,

    /// Members in ascending id order
    #[serde(default)]
    pub members: Vec<Member>,

    /// Providers in ascending id order
    #[serde(default)]
    pub providers: Vec<Provider>,

    /// Unsettled records, oldest first
    #[serde(default)]
    pub records: Vec<ServiceRecord>,
}

/// State rebuilt from a snapshot
#[derive(Debug)]
pub struct RestoredLedger {
    /// Global clock
    pub clock: NaiveDateTime,

    /// Boundary of the most recent settlement batch
    pub last_settlement: Option<NaiveDateTime>,

    /// Members and providers
    pub directory: Directory,

    /// Unsettled records
    pub store: ServiceRecordStore,
}

impl LedgerSnapshot {
    /// Capture current state
    pub fn capture(
        clock: NaiveDateTime,
        last_settlement: Option<NaiveDateTime>,
        directory: &Directory,
        store: &ServiceRecordStore,
    ) -> Self {
        use crate::directory::{MemberDirectory, ProviderDirectory};

        Self {
            clock,
            last_settlement,
            members: directory.members().cloned().collect(),
            providers: directory.providers().cloned().collect(),
            records: store.iter().map(|(_, r)| r.clone()).collect(),
        }
    }

    /// Rebuild directory and store from the snapshot
    pub fn restore(self) -> Result<RestoredLedger> {
        let mut directory = Directory::new();
        for member in self.members {
            directory.add_member(member)?;
        }
        for provider in self.providers {
            directory.add_provider(provider)?;
        }

        let mut store = ServiceRecordStore::new();
        for record in self.records {
            store.insert(record);
        }

        Ok(RestoredLedger {
            clock: self.clock,
            last_settlement: self.last_settlement,
            directory,
            store,
        })
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&content)?;
        tracing::info!(
            path = %path.as_ref().display(),
            members = snapshot.members.len(),
            providers = snapshot.providers.len(),
            records = snapshot.records.len(),
            "Loaded ledger snapshot"
        );
        Ok(snapshot)
    }

    /// Save to a JSON file, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), records = self.records.len(), "Saved ledger snapshot");
        Ok(())
    }
}
