// SPDX-License-Identifier: Apache-2.0
//! Virtual-location generation: incremental mirroring of real subtrees under
//! proxy function groups.
//!
//! Every proxy `FunctionGroup` gets a full mirrored copy of the subtree of
//! the real group it targets, re-parented under the proxy, with the
//! zone/group identifying field families overridden to the proxy's own. The
//! generator reacts to real-feed change batches with an explicit
//! removal-vs-recompute reconciliation rather than rebuilding from scratch,
//! and mints stable synthetic keys so UI bindings keyed on virtual ids never
//! thrash across re-derivations.

use std::collections::{BTreeMap, BTreeSet};

use plantloc_model::{CompoundKey, FunctionKind, FunctionLocation, VirtualKey};
use rustc_hash::FxHashSet;

use crate::store::{ChangeReason, ChangeRecord, KeyedStore};

/// Process-lifetime allocator of synthetic integer ids per mirror position.
///
/// Insert-or-get: the first materialization of a position assigns the next
/// unused integer (from 1, monotonically increasing); the same position
/// always yields the same id afterward. The table is never compacted, so it
/// grows for the life of the process — the price of key stability across a
/// long editing session.
#[derive(Debug)]
pub struct SyntheticKeys {
    next: i64,
    by_position: BTreeMap<VirtualKey, i64>,
}

impl SyntheticKeys {
    /// Creates an empty allocator; ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: 1,
            by_position: BTreeMap::new(),
        }
    }

    /// Returns the stable synthetic key for `position`, minting one on first
    /// use.
    pub fn mint(&mut self, position: VirtualKey) -> CompoundKey {
        let id = *self.by_position.entry(position).or_insert_with(|| {
            let id = self.next;
            self.next += 1;
            id
        });
        CompoundKey::virtual_shape(id)
    }

    /// Returns the synthetic key for `position` when one was ever minted.
    pub fn lookup(&self, position: &VirtualKey) -> Option<CompoundKey> {
        self.by_position
            .get(position)
            .map(|id| CompoundKey::virtual_shape(*id))
    }
}

impl Default for SyntheticKeys {
    fn default() -> Self {
        Self::new()
    }
}

/// One not-yet-materialized virtual node: which real node it mirrors, which
/// real group anchors the mirrored subtree, and which proxy it hangs under.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MirrorEntry {
    source: FunctionLocation,
    source_group: FunctionLocation,
    proxy_group: FunctionLocation,
    position: VirtualKey,
}

/// Incremental generator of the virtual location forest.
///
/// Consumes change batches from the real function-location store and keeps
/// its output store (virtual locations keyed by synthetic `CompoundKey`)
/// consistent with them. Each `apply` call is one atomic recomputation: the
/// output store's pull feed never exposes intermediate states.
#[derive(Debug)]
pub struct VirtualLocationGenerator {
    entries: BTreeMap<VirtualKey, MirrorEntry>,
    keys: SyntheticKeys,
    out: KeyedStore<CompoundKey, FunctionLocation>,
}

impl VirtualLocationGenerator {
    /// Creates a generator with an empty output store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            keys: SyntheticKeys::new(),
            out: KeyedStore::new(),
        }
    }

    /// The virtual location output store (pre-overlay).
    pub fn output(&self) -> &KeyedStore<CompoundKey, FunctionLocation> {
        &self.out
    }

    /// Mutable output store access (for connecting downstream cursors).
    pub fn output_mut(&mut self) -> &mut KeyedStore<CompoundKey, FunctionLocation> {
        &mut self.out
    }

    /// The stable synthetic key for a (proxy, target) position, when one has
    /// been materialized.
    pub fn synthetic_key(&self, position: &VirtualKey) -> Option<CompoundKey> {
        self.keys.lookup(position)
    }

    /// Applies one batch of real-feed changes. `real` is the real store
    /// after the batch took effect.
    pub fn apply(
        &mut self,
        batch: &[ChangeRecord<CompoundKey, FunctionLocation>],
        real: &KeyedStore<CompoundKey, FunctionLocation>,
    ) {
        if batch.is_empty() {
            return;
        }
        let changed: FxHashSet<CompoundKey> = batch.iter().map(|c| c.key).collect();
        let children = children_index(real);
        let proxies = proxy_index(real);

        // Step 1: candidate removals. Actual removal is deferred until the
        // recompute set is known, so a position refreshed in the same batch
        // is never dropped.
        let mut candidates: BTreeSet<VirtualKey> = BTreeSet::new();
        for change in batch {
            let loc = &change.current;
            if loc.kind == FunctionKind::ProcessZone {
                continue;
            }
            match change.reason {
                ChangeReason::Remove => {
                    if loc.is_proxy {
                        self.candidates_by_proxy(loc.id, &mut candidates);
                    } else {
                        self.candidates_by_target(loc.id, &mut candidates);
                    }
                }
                ChangeReason::Update => {
                    let Some(previous) = &change.previous else {
                        continue;
                    };
                    if previous.is_proxy && previous.target_id != loc.target_id {
                        // Retargeted proxy: its old mirror subtree is stale.
                        self.candidates_by_proxy(loc.id, &mut candidates);
                    }
                    if !loc.is_proxy && previous.parent_id != loc.parent_id {
                        // Reparented node: it may have moved out from under
                        // a mirrored subtree.
                        self.candidates_by_target(loc.id, &mut candidates);
                    }
                }
                ChangeReason::Add => {}
            }
        }

        // Step 2: recompute units, seeded per (proxy, mirrored group) pair
        // and expanded to one unit per descendant of the mirrored group.
        let mut seeds: BTreeSet<(CompoundKey, CompoundKey)> = BTreeSet::new();
        for change in batch {
            if change.reason == ChangeReason::Remove {
                continue;
            }
            let loc = &change.current;
            match loc.kind {
                FunctionKind::ProcessZone => {}
                FunctionKind::FunctionGroup if loc.is_proxy => {
                    if let Some(target) = loc.target_id {
                        if real.get(&target).is_some_and(|t| {
                            t.kind == FunctionKind::FunctionGroup && !t.is_proxy
                        }) {
                            seeds.insert((loc.id, target));
                        }
                    }
                }
                FunctionKind::FunctionGroup => {
                    seed_group_ancestry(loc.id, real, &proxies, &mut seeds);
                }
                FunctionKind::FunctionUnit
                | FunctionKind::Equipment
                | FunctionKind::Instrument
                | FunctionKind::FunctionElement => {
                    if let Some(group) = owning_group(loc, real) {
                        seed_group_ancestry(group, real, &proxies, &mut seeds);
                    }
                }
            }
        }

        let mut units: Vec<MirrorEntry> = Vec::new();
        let mut recomputed: BTreeSet<VirtualKey> = BTreeSet::new();
        for (proxy_id, group_id) in seeds {
            let (Some(proxy), Some(group)) = (real.get(&proxy_id), real.get(&group_id)) else {
                continue;
            };
            // Pre-order walk so parent mirrors are materialized before their
            // children within the same batch; downstream tree consumers rely
            // on parent-before-child availability.
            for source in descendants(group_id, &children) {
                let position = VirtualKey::new(proxy_id, source.id);
                if recomputed.insert(position) {
                    units.push(MirrorEntry {
                        source: source.clone(),
                        source_group: group.clone(),
                        proxy_group: proxy.clone(),
                        position,
                    });
                }
            }
        }

        // Step 3: removals not superseded by a recompute unit.
        for position in &candidates {
            if recomputed.contains(position) {
                continue;
            }
            if self.entries.remove(position).is_some() {
                if let Some(key) = self.keys.lookup(position) {
                    self.out.remove(&key);
                }
            }
        }

        // Step 4: apply units in enumeration (parent-first) order. An
        // existing entry is rewritten only when its source value changed or
        // its proxy group was in this batch's changed set — the latter
        // propagates proxy label edits to all mirrored descendants whose own
        // sources are untouched.
        for unit in units {
            let stale = match self.entries.get(&unit.position) {
                Some(existing) => {
                    existing.source != unit.source || changed.contains(&unit.proxy_group.id)
                }
                None => true,
            };
            if !stale {
                continue;
            }
            let materialized = materialize(&mut self.keys, &unit);
            let key = self.keys.mint(unit.position);
            self.entries.insert(unit.position, unit);
            self.out.upsert(key, materialized);
        }
    }

    fn candidates_by_proxy(&self, proxy_id: CompoundKey, candidates: &mut BTreeSet<VirtualKey>) {
        candidates.extend(
            self.entries
                .keys()
                .filter(|position| position.proxy_id == proxy_id)
                .copied(),
        );
    }

    fn candidates_by_target(&self, target_id: CompoundKey, candidates: &mut BTreeSet<VirtualKey>) {
        candidates.extend(
            self.entries
                .keys()
                .filter(|position| position.target_id == target_id)
                .copied(),
        );
    }
}

impl Default for VirtualLocationGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns a mirror entry into its virtual location record.
fn materialize(keys: &mut SyntheticKeys, entry: &MirrorEntry) -> FunctionLocation {
    let parent_id = if entry.source.parent_id == Some(entry.source_group.id) {
        // Direct child of the mirrored group: hang off the proxy itself.
        entry.proxy_group.id
    } else {
        let parent_target = entry.source.parent_id.unwrap_or_else(CompoundKey::root);
        keys.mint(VirtualKey::new(entry.position.proxy_id, parent_target))
    };
    let mut virt = entry.source.clone();
    virt.id = keys.mint(entry.position);
    virt.parent_id = Some(parent_id);
    virt.zone = entry.proxy_group.zone.clone();
    virt.zone_name = entry.proxy_group.zone_name.clone();
    virt.zone_name_en = entry.proxy_group.zone_name_en.clone();
    virt.group = entry.proxy_group.group.clone();
    virt.group_name = entry.proxy_group.group_name.clone();
    virt.group_name_en = entry.proxy_group.group_name_en.clone();
    virt.is_proxy = false;
    virt.is_virtual = true;
    virt.target_id = Some(entry.source.id);
    virt.proxy_group_id = Some(entry.proxy_group.id);
    virt
}

/// Parent -> children adjacency over the current real nodes.
fn children_index(
    real: &KeyedStore<CompoundKey, FunctionLocation>,
) -> BTreeMap<CompoundKey, Vec<&FunctionLocation>> {
    let mut index: BTreeMap<CompoundKey, Vec<&FunctionLocation>> = BTreeMap::new();
    for (_, loc) in real.iter() {
        if let Some(parent) = loc.parent_id {
            index.entry(parent).or_default().push(loc);
        }
    }
    index
}

/// Mirrored-group -> proxies reverse index over the current real nodes.
fn proxy_index(
    real: &KeyedStore<CompoundKey, FunctionLocation>,
) -> BTreeMap<CompoundKey, Vec<CompoundKey>> {
    let mut index: BTreeMap<CompoundKey, Vec<CompoundKey>> = BTreeMap::new();
    for (_, loc) in real.iter() {
        if loc.is_proxy {
            if let Some(target) = loc.target_id {
                index.entry(target).or_default().push(loc.id);
            }
        }
    }
    index
}

/// All descendants of `root` (excluding `root` itself), pre-order, children
/// visited in key order. Guards against parent cycles. Proxy nodes end
/// their branch: a nested proxy mirrors its own target independently, so
/// neither it nor anything parented under it belongs to this subtree's
/// mirror.
fn descendants<'a>(
    root: CompoundKey,
    children: &BTreeMap<CompoundKey, Vec<&'a FunctionLocation>>,
) -> Vec<&'a FunctionLocation> {
    let mut out = Vec::new();
    let mut visited: BTreeSet<CompoundKey> = BTreeSet::new();
    visited.insert(root);
    let mut stack: Vec<&FunctionLocation> = children
        .get(&root)
        .map(|kids| kids.iter().rev().copied().collect())
        .unwrap_or_default();
    while let Some(node) = stack.pop() {
        if !visited.insert(node.id) {
            continue;
        }
        if node.is_proxy {
            continue;
        }
        out.push(node);
        if let Some(kids) = children.get(&node.id) {
            stack.extend(kids.iter().rev().copied());
        }
    }
    out
}

/// Walks `loc`'s parent chain to the nearest enclosing `FunctionGroup`.
fn owning_group(
    loc: &FunctionLocation,
    real: &KeyedStore<CompoundKey, FunctionLocation>,
) -> Option<CompoundKey> {
    let mut visited: BTreeSet<CompoundKey> = BTreeSet::new();
    let mut cursor = loc.parent_id;
    while let Some(id) = cursor {
        if !visited.insert(id) {
            return None;
        }
        let Some(node) = real.get(&id) else {
            return None;
        };
        if node.kind == FunctionKind::FunctionGroup && !node.is_proxy {
            return Some(id);
        }
        cursor = node.parent_id;
    }
    None
}

/// Seeds one recompute unit per proxy of `group` and of every `FunctionGroup`
/// ancestor of `group` (a proxy targeting an ancestor mirrors this subtree
/// too).
fn seed_group_ancestry(
    group: CompoundKey,
    real: &KeyedStore<CompoundKey, FunctionLocation>,
    proxies: &BTreeMap<CompoundKey, Vec<CompoundKey>>,
    seeds: &mut BTreeSet<(CompoundKey, CompoundKey)>,
) {
    let mut visited: BTreeSet<CompoundKey> = BTreeSet::new();
    let mut cursor = Some(group);
    while let Some(id) = cursor {
        if !visited.insert(id) {
            break;
        }
        let Some(node) = real.get(&id) else {
            break;
        };
        if node.kind == FunctionKind::FunctionGroup && !node.is_proxy {
            if let Some(list) = proxies.get(&id) {
                for proxy in list {
                    seeds.insert((*proxy, id));
                }
            }
        }
        cursor = node.parent_id;
    }
}
