// SPDX-License-Identifier: Apache-2.0
//! Derived-view stages over [`KeyedStore`] change batches.
//!
//! Each stage owns its output store and is pumped by the pipeline driver
//! with batches drained from its upstream(s). Operator state is explicit and
//! per-stage: a re-key stage remembers its forward key map, a join stage
//! keeps a reverse index from join keys to left keys, and a merge stage
//! consults the other side on removals.
//!
//! All stages preserve per-key at-most-one-live-value semantics, and the
//! value-equality no-op rule of [`KeyedStore::upsert`] keeps them idempotent.

use std::collections::BTreeMap;

use crate::store::{ChangeReason, ChangeRecord, KeyedStore};

/// Forwards only values matching a predicate.
///
/// When an Update makes a previously forwarded value stop matching, the key
/// is removed downstream.
#[derive(Debug)]
pub struct FilterView<K, V, P> {
    out: KeyedStore<K, V>,
    pred: P,
}

impl<K, V, P> FilterView<K, V, P>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
    P: Fn(&V) -> bool,
{
    /// Creates a filter stage with an empty output store.
    pub fn new(pred: P) -> Self {
        Self {
            out: KeyedStore::new(),
            pred,
        }
    }

    /// The stage's output store.
    pub fn output(&self) -> &KeyedStore<K, V> {
        &self.out
    }

    /// Mutable output store access (for connecting downstream cursors).
    pub fn output_mut(&mut self) -> &mut KeyedStore<K, V> {
        &mut self.out
    }

    /// Applies one upstream batch.
    pub fn apply(&mut self, batch: &[ChangeRecord<K, V>]) {
        for change in batch {
            match change.reason {
                ChangeReason::Add | ChangeReason::Update => {
                    if (self.pred)(&change.current) {
                        self.out.upsert(change.key.clone(), change.current.clone());
                    } else {
                        self.out.remove(&change.key);
                    }
                }
                ChangeReason::Remove => {
                    self.out.remove(&change.key);
                }
            }
        }
    }
}

/// Maps upstream values into a new value type, key-preserving.
#[derive(Debug)]
pub struct TransformView<K, W, F> {
    out: KeyedStore<K, W>,
    map: F,
}

impl<K, W, F> TransformView<K, W, F>
where
    K: Ord + Clone,
    W: Clone + PartialEq,
{
    /// Creates a transform stage with an empty output store.
    pub fn new(map: F) -> Self {
        Self {
            out: KeyedStore::new(),
            map,
        }
    }

    /// The stage's output store.
    pub fn output(&self) -> &KeyedStore<K, W> {
        &self.out
    }

    /// Mutable output store access.
    pub fn output_mut(&mut self) -> &mut KeyedStore<K, W> {
        &mut self.out
    }

    /// Applies one upstream batch.
    pub fn apply<V>(&mut self, batch: &[ChangeRecord<K, V>])
    where
        V: Clone + PartialEq,
        F: Fn(&K, &V) -> W,
    {
        for change in batch {
            match change.reason {
                ChangeReason::Add | ChangeReason::Update => {
                    let value = (self.map)(&change.key, &change.current);
                    self.out.upsert(change.key.clone(), value);
                }
                ChangeReason::Remove => {
                    self.out.remove(&change.key);
                }
            }
        }
    }
}

/// Re-keys upstream entries without altering the change-feed semantics.
///
/// Keeps a forward `K -> J` map so removals and key moves (an Update whose
/// derived key changed) are routed to the right downstream key.
#[derive(Debug)]
pub struct RekeyView<K, J, V, F> {
    out: KeyedStore<J, V>,
    key_fn: F,
    forward: BTreeMap<K, J>,
}

impl<K, J, V, F> RekeyView<K, J, V, F>
where
    K: Ord + Clone,
    J: Ord + Clone,
    V: Clone + PartialEq,
    F: Fn(&K, &V) -> J,
{
    /// Creates a re-key stage with an empty output store.
    pub fn new(key_fn: F) -> Self {
        Self {
            out: KeyedStore::new(),
            key_fn,
            forward: BTreeMap::new(),
        }
    }

    /// The stage's output store.
    pub fn output(&self) -> &KeyedStore<J, V> {
        &self.out
    }

    /// Mutable output store access.
    pub fn output_mut(&mut self) -> &mut KeyedStore<J, V> {
        &mut self.out
    }

    /// Applies one upstream batch.
    pub fn apply(&mut self, batch: &[ChangeRecord<K, V>]) {
        for change in batch {
            match change.reason {
                ChangeReason::Add | ChangeReason::Update => {
                    let derived = (self.key_fn)(&change.key, &change.current);
                    if let Some(stale) = self.forward.insert(change.key.clone(), derived.clone())
                    {
                        if stale != derived {
                            self.out.remove(&stale);
                        }
                    }
                    self.out.upsert(derived, change.current.clone());
                }
                ChangeReason::Remove => {
                    if let Some(derived) = self.forward.remove(&change.key) {
                        self.out.remove(&derived);
                    }
                }
            }
        }
    }
}

/// Left join of a primary feed against a secondary keyed store.
///
/// The combined record is re-emitted whenever *either* side changes, even if
/// the primary key's own fields did not (this is what keeps overlay edits
/// flowing into already-derived virtual rows). Left rows whose selector
/// returns `None` pass through with no join partner.
#[derive(Debug)]
pub struct JoinView<K, J, W, S, C> {
    out: KeyedStore<K, W>,
    selector: S,
    combine: C,
    /// Reverse index: join key -> left key currently joined through it.
    index: BTreeMap<J, K>,
}

impl<K, J, W, S, C> JoinView<K, J, W, S, C>
where
    K: Ord + Clone,
    J: Ord + Clone,
    W: Clone + PartialEq,
{
    /// Creates a join stage with an empty output store.
    pub fn new(selector: S, combine: C) -> Self {
        Self {
            out: KeyedStore::new(),
            selector,
            combine,
            index: BTreeMap::new(),
        }
    }

    /// The stage's output store.
    pub fn output(&self) -> &KeyedStore<K, W> {
        &self.out
    }

    /// Mutable output store access.
    pub fn output_mut(&mut self) -> &mut KeyedStore<K, W> {
        &mut self.out
    }

    /// Applies a batch from the primary (left) side.
    pub fn apply_left<V, O>(
        &mut self,
        batch: &[ChangeRecord<K, V>],
        right: &KeyedStore<J, O>,
    ) where
        V: Clone + PartialEq,
        O: Clone + PartialEq,
        S: Fn(&V) -> Option<J>,
        C: Fn(&V, Option<&O>) -> W,
    {
        for change in batch {
            match change.reason {
                ChangeReason::Add | ChangeReason::Update => {
                    if let Some(previous) = &change.previous {
                        if let Some(stale) = (self.selector)(previous) {
                            if self.index.get(&stale) == Some(&change.key) {
                                self.index.remove(&stale);
                            }
                        }
                    }
                    let partner = (self.selector)(&change.current);
                    let joined = partner.as_ref().and_then(|j| right.get(j));
                    if let Some(j) = partner {
                        self.index.insert(j, change.key.clone());
                    }
                    let combined = (self.combine)(&change.current, joined);
                    self.out.upsert(change.key.clone(), combined);
                }
                ChangeReason::Remove => {
                    if let Some(j) = (self.selector)(&change.current) {
                        if self.index.get(&j) == Some(&change.key) {
                            self.index.remove(&j);
                        }
                    }
                    self.out.remove(&change.key);
                }
            }
        }
    }

    /// Applies a batch from the secondary (right) side, re-emitting the
    /// joined record for every affected left key.
    pub fn apply_right<V, O>(
        &mut self,
        batch: &[ChangeRecord<J, O>],
        left: &KeyedStore<K, V>,
    ) where
        V: Clone + PartialEq,
        O: Clone + PartialEq,
        S: Fn(&V) -> Option<J>,
        C: Fn(&V, Option<&O>) -> W,
    {
        for change in batch {
            let Some(key) = self.index.get(&change.key).cloned() else {
                continue;
            };
            let Some(value) = left.get(&key) else {
                continue;
            };
            let joined = match change.reason {
                ChangeReason::Add | ChangeReason::Update => Some(&change.current),
                ChangeReason::Remove => None,
            };
            let combined = (self.combine)(value, joined);
            self.out.upsert(key, combined);
        }
    }
}

/// Union of two upstream feeds into one store.
///
/// The two sides are expected to have disjoint key spaces (real vs virtual
/// keys); on overlap, last write wins. A removal from one side falls back to
/// the other side's live value when present.
#[derive(Debug)]
pub struct MergeView<K, V> {
    out: KeyedStore<K, V>,
}

impl<K, V> MergeView<K, V>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
{
    /// Creates a merge stage with an empty output store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            out: KeyedStore::new(),
        }
    }

    /// The stage's output store.
    pub fn output(&self) -> &KeyedStore<K, V> {
        &self.out
    }

    /// Mutable output store access.
    pub fn output_mut(&mut self) -> &mut KeyedStore<K, V> {
        &mut self.out
    }

    /// Applies one side's batch; `other` is the opposite side's store, used
    /// as the fallback source on removals.
    pub fn apply(&mut self, batch: &[ChangeRecord<K, V>], other: &KeyedStore<K, V>) {
        for change in batch {
            match change.reason {
                ChangeReason::Add | ChangeReason::Update => {
                    self.out.upsert(change.key.clone(), change.current.clone());
                }
                ChangeReason::Remove => {
                    if let Some(fallback) = other.get(&change.key) {
                        self.out.upsert(change.key.clone(), fallback.clone());
                    } else {
                        self.out.remove(&change.key);
                    }
                }
            }
        }
    }
}

impl<K, V> Default for MergeView<K, V>
where
    K: Ord + Clone,
    V: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}
