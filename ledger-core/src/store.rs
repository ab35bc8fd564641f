//! Service-record store
//!
//! # Layout
//!
//! - `records` - Primary store, ordered by [`RecordKey`] `(written_at, sequence)`
//! - `by_member` - Per-member index of record keys, in the same order
//! - `by_provider` - Per-provider index of record keys, in the same order
//!
//! Every key present in a per-entity index is present in `records`, and every
//! record in `records` is present in exactly one member index and one provider
//! index. Eviction always removes a chronological prefix of `records`, and so
//! a prefix of every entity index.

use crate::types::{MemberId, ProviderId, RecordKey, ServiceRecord};
use chrono::NaiveDateTime;
use std::collections::{btree_set, BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

/// Keys of one member's or provider's records, oldest first.
///
/// Records reach the store out of time order when providers sit in different
/// time zones or enter services late, so the index sorts on insert.
#[derive(Debug, Default)]
struct EntityIndex {
    keys: BTreeSet<RecordKey>,
}

impl EntityIndex {
    fn insert(&mut self, key: RecordKey) {
        self.keys.insert(key);
    }

    fn remove(&mut self, key: &RecordKey) -> bool {
        self.keys.remove(key)
    }

    fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Chronological store of service records with member and provider indices
#[derive(Debug, Default)]
pub struct ServiceRecordStore {
    records: BTreeMap<RecordKey, ServiceRecord>,
    by_member: HashMap<MemberId, EntityIndex>,
    by_provider: HashMap<ProviderId, EntityIndex>,
    next_sequence: u64,
}

impl ServiceRecordStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record.
    ///
    /// Never fails; records with identical `written_at` are kept apart by the
    /// sequence number in the returned key.
    pub fn insert(&mut self, record: ServiceRecord) -> RecordKey {
        let key = RecordKey {
            written_at: record.written_at,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        self.by_member
            .entry(record.member_id)
            .or_default()
            .insert(key);
        self.by_provider
            .entry(record.provider_id)
            .or_default()
            .insert(key);

        tracing::debug!(
            member = %record.member_id,
            provider = %record.provider_id,
            written_at = %record.written_at,
            sequence = key.sequence,
            "Stored service record"
        );

        self.records.insert(key, record);
        key
    }

    /// Cursor over a member's records, oldest first
    pub fn cursor_from_member(&self, id: MemberId) -> Cursor<'_> {
        Cursor::new(&self.records, self.by_member.get(&id))
    }

    /// Cursor over a provider's records, oldest first
    pub fn cursor_from_provider(&self, id: ProviderId) -> Cursor<'_> {
        Cursor::new(&self.records, self.by_provider.get(&id))
    }

    /// Evict every record with `written_at <= cutoff`.
    ///
    /// Returns the number of evicted records. Calling again with the same or
    /// an earlier cutoff evicts nothing.
    pub fn filter(&mut self, cutoff: NaiveDateTime) -> usize {
        let mut evicted = 0;

        while let Some(entry) = self.records.first_entry() {
            if entry.key().written_at > cutoff {
                break;
            }

            let (key, record) = entry.remove_entry();
            Self::unindex(&mut self.by_member, record.member_id, &key);
            Self::unindex(&mut self.by_provider, record.provider_id, &key);
            evicted += 1;
        }

        if evicted > 0 {
            tracing::info!(
                evicted,
                remaining = self.records.len(),
                cutoff = %cutoff,
                "Evicted settled service records"
            );
        }

        evicted
    }

    fn unindex<K: Eq + Hash>(indices: &mut HashMap<K, EntityIndex>, id: K, key: &RecordKey) {
        if let Some(index) = indices.get_mut(&id) {
            let removed = index.remove(key);
            debug_assert!(removed, "record missing from its entity index");
            if index.is_empty() {
                indices.remove(&id);
            }
        }
    }

    /// Look up a record by key
    pub fn get(&self, key: &RecordKey) -> Option<&ServiceRecord> {
        self.records.get(key)
    }

    /// All records in chronological order
    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &ServiceRecord)> + '_ {
        self.records.iter()
    }

    /// Oldest stored record
    pub fn oldest(&self) -> Option<&ServiceRecord> {
        self.records.values().next()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Restartable forward iterator over one entity's records.
///
/// Yields records in the primary store's order. Cloning a cursor or calling
/// [`Cursor::restart`] starts again from the oldest record.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    records: &'a BTreeMap<RecordKey, ServiceRecord>,
    keys: Option<&'a BTreeSet<RecordKey>>,
    position: Option<btree_set::Iter<'a, RecordKey>>,
}

impl<'a> Cursor<'a> {
    fn new(
        records: &'a BTreeMap<RecordKey, ServiceRecord>,
        index: Option<&'a EntityIndex>,
    ) -> Self {
        let keys = index.map(|i| &i.keys);
        Self {
            records,
            keys,
            position: keys.map(|k| k.iter()),
        }
    }

    /// Rewind to the oldest record
    pub fn restart(&mut self) {
        self.position = self.keys.map(|k| k.iter());
    }

    /// Next record without advancing
    pub fn peek(&self) -> Option<&'a ServiceRecord> {
        let key = self.position.clone()?.next()?;
        self.records.get(key)
    }

    /// Check if the entity has no records at all
    pub fn is_empty(&self) -> bool {
        self.keys.map_or(true, |k| k.is_empty())
    }

    /// Records left to visit
    pub fn remaining(&self) -> usize {
        self.position.as_ref().map_or(0, |p| p.len())
    }
}

impl<'a> Iterator for Cursor<'a> {
    type Item = &'a ServiceRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.position.as_mut()?.next()?;
        self.records.get(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}
