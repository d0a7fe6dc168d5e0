// SPDX-License-Identifier: Apache-2.0
//! Reactive keyed store: a `BTreeMap` mapping plus an ordered changelog and
//! registered consumer cursors.
//!
//! This is the primitive the whole derivation pipeline is built from. Every
//! derived view drains change batches from an upstream store through a
//! [`Connection`] and writes its own output store; a drain is an atomic batch
//! boundary, so consumers never observe partial intermediate states.
//!
//! Single-writer discipline: a store is mutated only by the pipeline driver
//! that owns it. Concurrent writers must be serialized by the caller.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, VecDeque};

/// Why a change record was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// The key was not present before.
    Add,
    /// The key was present with a different value.
    Update,
    /// The key was removed.
    Remove,
}

/// One ordered entry of a store's change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord<K, V> {
    /// What happened.
    pub reason: ChangeReason,
    /// The affected key.
    pub key: K,
    /// The value the change is about: the new value for Add/Update, the
    /// removed value for Remove.
    pub current: V,
    /// The replaced value for Update; `None` otherwise.
    pub previous: Option<V>,
}

/// A registered consumer cursor into a store's changelog.
///
/// Created by [`KeyedStore::connect`]; the first drain replays the store
/// contents as a synthetic Add batch, after which the cursor tracks live
/// changes. Dropping a connection without [`KeyedStore::disconnect`] leaks
/// its cursor and pins the changelog; the pipeline owns its connections for
/// process lifetime, so this only matters for ad-hoc consumers.
#[derive(Debug)]
pub struct Connection<K, V> {
    id: u64,
    snapshot: Option<Vec<ChangeRecord<K, V>>>,
}

/// Generic reactive key-value store.
///
/// `upsert` treats a duplicate Add as Update, and a value-equal upsert as a
/// no-op (no changelog entry), which is what makes re-derivation idempotent
/// end to end. Lookups on missing keys return `None`, never an error.
#[derive(Debug)]
pub struct KeyedStore<K, V> {
    items: BTreeMap<K, V>,
    /// Changelog entries not yet seen by every cursor. Front entry has
    /// sequence number `tail`.
    log: VecDeque<ChangeRecord<K, V>>,
    /// Sequence number of the next appended entry.
    head: u64,
    /// Sequence number of the first retained entry.
    tail: u64,
    /// Registered cursor positions (absolute sequence numbers).
    cursors: BTreeMap<u64, u64>,
    next_cursor: u64,
}

impl<K, V> Default for KeyedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> KeyedStore<K, V> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            log: VecDeque::new(),
            head: 0,
            tail: 0,
            cursors: BTreeMap::new(),
            next_cursor: 0,
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K, V> KeyedStore<K, V>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
{
    /// Returns the live value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.items.get(key)
    }

    /// `true` when `key` has a live value.
    pub fn contains_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    /// Iterates live entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.items.iter()
    }

    /// Adds or updates `key`.
    ///
    /// A duplicate add is recorded as Update. When the new value equals the
    /// live value nothing happens at all: no item change, no changelog entry.
    pub fn upsert(&mut self, key: K, value: V) {
        match self.items.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                self.push(ChangeRecord {
                    reason: ChangeReason::Add,
                    key,
                    current: value,
                    previous: None,
                });
            }
            Entry::Occupied(mut slot) => {
                if *slot.get() == value {
                    return;
                }
                let previous = slot.insert(value.clone());
                self.push(ChangeRecord {
                    reason: ChangeReason::Update,
                    key,
                    current: value,
                    previous: Some(previous),
                });
            }
        }
    }

    /// Removes `key`, returning the removed value. Missing keys are a no-op.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.items.remove(key)?;
        self.push(ChangeRecord {
            reason: ChangeReason::Remove,
            key: key.clone(),
            current: removed.clone(),
            previous: None,
        });
        Some(removed)
    }

    /// Registers a consumer cursor at the current changelog head.
    ///
    /// The store's current contents are captured and replayed as a synthetic
    /// Add batch on the connection's first drain.
    pub fn connect(&mut self) -> Connection<K, V> {
        let id = self.next_cursor;
        self.next_cursor += 1;
        self.cursors.insert(id, self.head);
        let snapshot = self
            .items
            .iter()
            .map(|(key, value)| ChangeRecord {
                reason: ChangeReason::Add,
                key: key.clone(),
                current: value.clone(),
                previous: None,
            })
            .collect();
        Connection {
            id,
            snapshot: Some(snapshot),
        }
    }

    /// Drains the ordered changes `conn` has not seen yet and advances its
    /// cursor. The first drain is the connect-time snapshot (plus anything
    /// logged since).
    pub fn changes_since(&mut self, conn: &mut Connection<K, V>) -> Vec<ChangeRecord<K, V>> {
        let mut batch = conn.snapshot.take().unwrap_or_default();
        let position = self.cursors.get(&conn.id).copied().unwrap_or(self.head);
        let start = position.saturating_sub(self.tail) as usize;
        batch.extend(self.log.iter().skip(start).cloned());
        self.cursors.insert(conn.id, self.head);
        self.collect_log();
        batch
    }

    /// Unregisters `conn`'s cursor, releasing its hold on the changelog.
    pub fn disconnect(&mut self, conn: Connection<K, V>) {
        self.cursors.remove(&conn.id);
        self.collect_log();
    }

    fn push(&mut self, record: ChangeRecord<K, V>) {
        // Nobody is listening: keep the log empty rather than unbounded.
        if self.cursors.is_empty() {
            self.head += 1;
            self.tail = self.head;
            return;
        }
        self.log.push_back(record);
        self.head += 1;
    }

    /// Drops changelog entries every registered cursor has passed.
    fn collect_log(&mut self) {
        let min = self.cursors.values().copied().min().unwrap_or(self.head);
        while self.tail < min {
            self.log.pop_front();
            self.tail += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(store: &mut KeyedStore<u32, String>, conn: &mut Connection<u32, String>) -> Vec<ChangeRecord<u32, String>> {
        store.changes_since(conn)
    }

    #[test]
    fn duplicate_add_becomes_update() {
        let mut store = KeyedStore::new();
        let mut conn = store.connect();
        store.upsert(1, "a".to_owned());
        store.upsert(1, "b".to_owned());
        let batch = drain(&mut store, &mut conn);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].reason, ChangeReason::Add);
        assert_eq!(batch[1].reason, ChangeReason::Update);
        assert_eq!(batch[1].previous.as_deref(), Some("a"));
        store.disconnect(conn);
    }

    #[test]
    fn value_equal_upsert_is_silent() {
        let mut store = KeyedStore::new();
        let mut conn = store.connect();
        store.upsert(1, "a".to_owned());
        drain(&mut store, &mut conn);
        store.upsert(1, "a".to_owned());
        assert!(drain(&mut store, &mut conn).is_empty());
        store.disconnect(conn);
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut store: KeyedStore<u32, String> = KeyedStore::new();
        let mut conn = store.connect();
        assert!(store.remove(&9).is_none());
        assert!(drain(&mut store, &mut conn).is_empty());
        store.disconnect(conn);
    }

    #[test]
    fn connect_replays_contents_as_add_batch() {
        let mut store = KeyedStore::new();
        store.upsert(2, "b".to_owned());
        store.upsert(1, "a".to_owned());
        let mut conn = store.connect();
        let batch = drain(&mut store, &mut conn);
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|c| c.reason == ChangeReason::Add));
        // Snapshot replays in key order.
        assert_eq!(batch[0].key, 1);
        assert_eq!(batch[1].key, 2);
        store.disconnect(conn);
    }

    #[test]
    fn two_cursors_see_independent_batches() {
        let mut store = KeyedStore::new();
        let mut a = store.connect();
        store.upsert(1, "a".to_owned());
        assert_eq!(drain(&mut store, &mut a).len(), 1);

        let mut b = store.connect();
        store.upsert(2, "b".to_owned());
        // b sees the snapshot {1} plus the live add of 2; a sees only 2.
        assert_eq!(drain(&mut store, &mut b).len(), 2);
        assert_eq!(drain(&mut store, &mut a).len(), 1);
        store.disconnect(a);
        store.disconnect(b);
    }

    #[test]
    fn log_is_collected_once_every_cursor_caught_up() {
        let mut store = KeyedStore::new();
        let mut a = store.connect();
        let mut b = store.connect();
        store.upsert(1, "a".to_owned());
        drain(&mut store, &mut a);
        assert_eq!(store.log.len(), 1, "b has not drained yet");
        drain(&mut store, &mut b);
        assert!(store.log.is_empty());
        store.disconnect(a);
        store.disconnect(b);
    }

    #[test]
    fn remove_carries_the_removed_value() {
        let mut store = KeyedStore::new();
        let mut conn = store.connect();
        store.upsert(1, "a".to_owned());
        store.remove(&1);
        let batch = drain(&mut store, &mut conn);
        assert_eq!(batch[1].reason, ChangeReason::Remove);
        assert_eq!(batch[1].current, "a");
        store.disconnect(conn);
    }
}
