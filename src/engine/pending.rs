//! Time-indexed pending map keyed by (auction, ad-spot).

use crate::domain::{AdSpotId, AuctionId, MatchKey, TimeMs};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct TableEntry<V> {
    value: V,
    expires_at: TimeMs,
}

/// Map from `MatchKey` to value with a per-entry absolute expiry and an
/// expiry-ordered secondary index.
///
/// The primary map is ordered on the composite key, so all spots of one
/// auction are contiguous; `complete_prefix` exploits that to resolve
/// lookups that omit the ad-spot.
#[derive(Debug, Clone)]
pub struct PendingTable<V> {
    entries: BTreeMap<MatchKey, TableEntry<V>>,
    by_expiry: BTreeSet<(TimeMs, MatchKey)>,
}

impl<V> Default for PendingTable<V> {
    fn default() -> Self {
        PendingTable {
            entries: BTreeMap::new(),
            by_expiry: BTreeSet::new(),
        }
    }
}

impl<V> PendingTable<V> {
    pub fn new() -> Self {
        PendingTable::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &MatchKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &MatchKey) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Insert or replace; a replaced entry's old expiry is dropped.
    pub fn insert(&mut self, key: MatchKey, value: V, expires_at: TimeMs) {
        if let Some(old) = self.entries.insert(
            key.clone(),
            TableEntry { value, expires_at },
        ) {
            self.by_expiry.remove(&(old.expires_at, key.clone()));
        }
        self.by_expiry.insert((expires_at, key));
    }

    /// Replace the value of an existing entry, retaining its expiry.
    ///
    /// Returns false (and stores nothing) if the key is absent.
    pub fn update(&mut self, key: &MatchKey, value: V) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    /// Remove and return the entry for `key`.
    pub fn pop(&mut self, key: &MatchKey) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.by_expiry.remove(&(entry.expires_at, key.clone()));
        Some(entry.value)
    }

    /// Resolve a lookup whose spot id was empty: the first stored key of the
    /// auction, which by key order carries the lexicographically smallest
    /// spot id.
    pub fn complete_prefix(&self, auction_id: &AuctionId) -> Option<MatchKey> {
        let probe = MatchKey::new(auction_id.clone(), AdSpotId::none());
        self.entries
            .range(probe..)
            .next()
            .map(|(key, _)| key)
            .filter(|key| &key.auction_id == auction_id)
            .cloned()
    }

    /// Visit every entry with `expires_at <= now` in non-decreasing expiry
    /// order. The visitor returns `Some(new_expiry)` to reinsert the entry
    /// or `None` to drop it.
    ///
    /// The due set is snapshotted up front: entries reinserted during the
    /// sweep (even with an already-elapsed expiry) are not revisited, and an
    /// entry touched by `insert`/`pop`/`update` mid-sweep is re-checked
    /// before its visit.
    pub fn expire<F>(&mut self, now: TimeMs, mut visitor: F) -> usize
    where
        F: FnMut(&MatchKey, &V) -> Option<TimeMs>,
    {
        let due: Vec<(TimeMs, MatchKey)> = self
            .by_expiry
            .iter()
            .take_while(|(expires_at, _)| *expires_at <= now)
            .cloned()
            .collect();

        let mut visited = 0;
        for (expires_at, key) in due {
            // The entry may have been popped or re-deadlined since the
            // snapshot was taken.
            match self.entries.get(&key) {
                Some(entry) if entry.expires_at == expires_at => {}
                _ => continue,
            }

            let Some(entry) = self.entries.remove(&key) else {
                continue;
            };
            self.by_expiry.remove(&(entry.expires_at, key.clone()));

            visited += 1;
            if let Some(new_expiry) = visitor(&key, &entry.value) {
                self.insert(key, entry.value, new_expiry);
            }
        }
        visited
    }
}
