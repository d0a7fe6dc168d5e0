// SPDX-License-Identifier: Apache-2.0
//! End-to-end pipeline wiring.
//!
//! `LocationPipeline` owns the raw shape store and every derived stage, and
//! pumps them in topological order on [`LocationPipeline::refresh`]:
//!
//! ```text
//! shapes ─► real locations ─► mirror generator ─► ⋈ overlays ─┐
//!              │                                              ▼
//!              └──────────────────────────────────────────► merge ─► functions
//!                                                              │
//!                                   material filter ◄──────────┘
//!                                        │
//!                                        ▼
//!                            pristine materials ─► ⋈ overlays ─► materials
//! ```
//!
//! All collaborators are injected: the host port for property reads and
//! patch writes, and the overlay persistence backend. No globals, no
//! ambient state.
//!
//! Host write-back is one-way by design: `write_*_edits` patches the host,
//! and the host's own change notifications are expected to arrive back
//! through [`LocationPipeline::upsert_shape`] like any other edit. The
//! pipeline never assumes its patches took effect.

use std::collections::BTreeSet;

use plantloc_model::{
    CompoundKey, FunctionLocation, LocationOverlay, MaterialLocation, VirtualKey,
};
use rustc_hash::FxHashSet;

use crate::derive::{derive_function_location, ClassifyError};
use crate::material::{backing_shape, derive_material_location};
use crate::overlay::{
    apply_function_overlay, apply_material_overlay, OverlayPersistence, OverlayStore,
};
use crate::patch::{self, WriteError};
use crate::shape::{ShapeHost, ShapeRecord};
use crate::store::{ChangeReason, ChangeRecord, Connection, KeyedStore};
use crate::view::{FilterView, JoinView, MergeView};
use crate::virtualize::VirtualLocationGenerator;

/// Outcome of one [`LocationPipeline::refresh`] pump.
///
/// Per-shape classification failures are collected here instead of aborting
/// the batch: one bad shape never blocks the rest of the document.
#[derive(Debug, Default)]
pub struct PumpReport {
    /// Shapes whose category tags matched no function kind this pump.
    pub errors: Vec<ClassifyError>,
    /// Number of raw shape changes consumed.
    pub shape_changes: usize,
}

impl PumpReport {
    /// `true` when no shape failed classification.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

type FunctionJoin = JoinView<
    CompoundKey,
    VirtualKey,
    FunctionLocation,
    fn(&FunctionLocation) -> Option<VirtualKey>,
    fn(&FunctionLocation, Option<&LocationOverlay>) -> FunctionLocation,
>;

type MaterialJoin = JoinView<
    CompoundKey,
    VirtualKey,
    MaterialLocation,
    fn(&MaterialLocation) -> Option<VirtualKey>,
    fn(&MaterialLocation, Option<&LocationOverlay>) -> MaterialLocation,
>;

type MaterialFilter =
    FilterView<CompoundKey, FunctionLocation, fn(&FunctionLocation) -> bool>;

fn function_mirror_key(loc: &FunctionLocation) -> Option<VirtualKey> {
    if loc.is_virtual {
        Some(VirtualKey::new(loc.proxy_group_id?, loc.target_id?))
    } else {
        None
    }
}

fn material_mirror_key(material: &MaterialLocation) -> Option<VirtualKey> {
    if material.is_virtual {
        Some(VirtualKey::new(
            material.proxy_group_id?,
            material.target_id?,
        ))
    } else {
        None
    }
}

fn material_row(loc: &FunctionLocation) -> bool {
    loc.kind.carries_material()
}

/// The full derivation pipeline over one host document.
#[derive(Debug)]
pub struct LocationPipeline<H, P> {
    host: H,
    overlays: OverlayStore<P>,

    shapes: KeyedStore<CompoundKey, ShapeRecord>,
    shape_conn: Connection<CompoundKey, ShapeRecord>,

    real: KeyedStore<CompoundKey, FunctionLocation>,
    real_to_mirror: Connection<CompoundKey, FunctionLocation>,
    real_to_merge: Connection<CompoundKey, FunctionLocation>,

    generator: VirtualLocationGenerator,
    mirror_conn: Connection<CompoundKey, FunctionLocation>,

    vjoin: FunctionJoin,
    vjoin_conn: Connection<CompoundKey, FunctionLocation>,
    overlay_to_functions: Connection<VirtualKey, LocationOverlay>,

    merge: MergeView<CompoundKey, FunctionLocation>,
    functions_to_materials: Connection<CompoundKey, FunctionLocation>,

    filter: MaterialFilter,
    filter_conn: Connection<CompoundKey, FunctionLocation>,

    pristine_materials: KeyedStore<CompoundKey, MaterialLocation>,
    materials_conn: Connection<CompoundKey, MaterialLocation>,

    mjoin: MaterialJoin,
    overlay_to_materials: Connection<VirtualKey, LocationOverlay>,
}

impl<H: ShapeHost, P: OverlayPersistence> LocationPipeline<H, P> {
    /// Builds the pipeline around an injected host port and overlay store.
    pub fn new(host: H, mut overlays: OverlayStore<P>) -> Self {
        let mut shapes = KeyedStore::new();
        let shape_conn = shapes.connect();
        let mut real = KeyedStore::new();
        let real_to_mirror = real.connect();
        let real_to_merge = real.connect();
        let mut generator = VirtualLocationGenerator::new();
        let mirror_conn = generator.output_mut().connect();
        let mut vjoin: FunctionJoin =
            JoinView::new(function_mirror_key, apply_function_overlay);
        let vjoin_conn = vjoin.output_mut().connect();
        let overlay_to_functions = overlays.overlays_mut().connect();
        let mut merge = MergeView::new();
        let functions_to_materials = merge.output_mut().connect();
        let mut filter: MaterialFilter = FilterView::new(material_row);
        let filter_conn = filter.output_mut().connect();
        let mut pristine_materials = KeyedStore::new();
        let materials_conn = pristine_materials.connect();
        let mjoin: MaterialJoin = JoinView::new(material_mirror_key, apply_material_overlay);
        let overlay_to_materials = overlays.overlays_mut().connect();
        Self {
            host,
            overlays,
            shapes,
            shape_conn,
            real,
            real_to_mirror,
            real_to_merge,
            generator,
            mirror_conn,
            vjoin,
            vjoin_conn,
            overlay_to_functions,
            merge,
            functions_to_materials,
            filter,
            filter_conn,
            pristine_materials,
            materials_conn,
            mjoin,
            overlay_to_materials,
        }
    }

    /// Inserts or replaces a raw shape snapshot. Takes effect on the next
    /// [`Self::refresh`].
    pub fn upsert_shape(&mut self, shape: ShapeRecord) {
        self.shapes.upsert(shape.id, shape);
    }

    /// Removes a raw shape. Takes effect on the next [`Self::refresh`].
    pub fn remove_shape(&mut self, id: &CompoundKey) {
        self.shapes.remove(id);
    }

    /// Pumps every stage once, in topological order.
    ///
    /// A drain is an atomic batch boundary: subscribers connected to the
    /// output stores never observe a state between stages.
    pub fn refresh(&mut self) -> PumpReport {
        let mut report = PumpReport::default();

        // Stage 1: raw shapes -> real function locations. Parent resolution
        // reads container depth from neighbouring shapes, so shapes directly
        // contained in a changed shape are re-derived too.
        let shape_batch = self.shapes.changes_since(&mut self.shape_conn);
        report.shape_changes = shape_batch.len();
        let mut dirty: BTreeSet<CompoundKey> =
            shape_batch.iter().map(|change| change.key).collect();
        let dependents: Vec<CompoundKey> = self
            .shapes
            .iter()
            .filter(|(key, shape)| {
                !dirty.contains(key) && shape.containers.iter().any(|c| dirty.contains(c))
            })
            .map(|(key, _)| *key)
            .collect();
        dirty.extend(dependents);
        for key in &dirty {
            match self.shapes.get(key) {
                Some(shape) => match derive_function_location(shape, &self.shapes) {
                    Ok(loc) => {
                        self.real.upsert(*key, loc);
                    }
                    Err(err) => {
                        report.errors.push(err);
                        self.real.remove(key);
                    }
                },
                None => {
                    self.real.remove(key);
                }
            }
        }

        // Stage 2: real feed -> virtual mirror generator.
        let mirror_batch = self.real.changes_since(&mut self.real_to_mirror);
        self.generator.apply(&mirror_batch, &self.real);

        // Stage 3: pre-overlay virtual feed joined with overlays.
        let virtual_batch = self.generator.output_mut().changes_since(&mut self.mirror_conn);
        self.vjoin.apply_left(&virtual_batch, self.overlays.overlays());
        let overlay_batch = self
            .overlays
            .overlays_mut()
            .changes_since(&mut self.overlay_to_functions);
        self.vjoin.apply_right(&overlay_batch, self.generator.output());

        // Stage 4: merge real and projected virtual rows. Key spaces are
        // disjoint (virtual keys live on the reserved page), so the two
        // sides cannot clobber each other.
        let real_batch = self.real.changes_since(&mut self.real_to_merge);
        self.merge.apply(&real_batch, self.vjoin.output());
        let projected_batch = self.vjoin.output_mut().changes_since(&mut self.vjoin_conn);
        self.merge.apply(&projected_batch, &self.real);

        // Stage 5: filter the unified feed to material-carrying kinds.
        let function_batch = self
            .merge
            .output_mut()
            .changes_since(&mut self.functions_to_materials);
        self.filter.apply(&function_batch);

        // Stage 6: material derivation against the backing shapes. A shape
        // edit can change material properties without changing the derived
        // function row at all, so rows whose backing shape was in this
        // pump's dirty set are re-derived even when their function feed was
        // silent.
        let filtered_batch = self.filter.output_mut().changes_since(&mut self.filter_conn);
        let touched: FxHashSet<CompoundKey> =
            filtered_batch.iter().map(|change| change.key).collect();
        for change in &filtered_batch {
            match change.reason {
                ChangeReason::Add | ChangeReason::Update => {
                    if let Some(material) =
                        derive_material_location(&change.current, &self.host)
                    {
                        self.pristine_materials.upsert(change.key, material);
                    }
                }
                ChangeReason::Remove => {
                    self.pristine_materials.remove(&change.key);
                }
            }
        }
        let stale: Vec<(CompoundKey, FunctionLocation)> = self
            .filter
            .output()
            .iter()
            .filter(|(key, loc)| {
                !touched.contains(*key) && dirty.contains(&backing_shape(loc))
            })
            .map(|(key, loc)| (*key, loc.clone()))
            .collect();
        for (key, loc) in stale {
            if let Some(material) = derive_material_location(&loc, &self.host) {
                self.pristine_materials.upsert(key, material);
            }
        }

        // Stage 7: pristine materials joined with overlays.
        let material_batch = self.pristine_materials.changes_since(&mut self.materials_conn);
        self.mjoin.apply_left(&material_batch, self.overlays.overlays());
        let overlay_batch = self
            .overlays
            .overlays_mut()
            .changes_since(&mut self.overlay_to_materials);
        self.mjoin.apply_right(&overlay_batch, &self.pristine_materials);

        report
    }

    /// Writes edited function rows back: real rows become host property
    /// patches, virtual rows reconcile into overlays. Pumps the pipeline so
    /// overlay effects are visible immediately.
    pub fn write_function_edits(
        &mut self,
        edits: &[FunctionLocation],
    ) -> Result<(), WriteError> {
        patch::write_function_edits(
            edits,
            self.generator.output(),
            &mut self.host,
            &mut self.overlays,
        )?;
        self.refresh();
        Ok(())
    }

    /// Writes edited material rows back, with the same real/virtual split as
    /// [`Self::write_function_edits`].
    pub fn write_material_edits(
        &mut self,
        edits: &[MaterialLocation],
    ) -> Result<(), WriteError> {
        patch::write_material_edits(
            edits,
            &self.pristine_materials,
            &mut self.host,
            &mut self.overlays,
        )?;
        self.refresh();
        Ok(())
    }

    /// The unified function feed (real + overlay-projected virtual rows).
    pub fn functions(&self) -> &KeyedStore<CompoundKey, FunctionLocation> {
        self.merge.output()
    }

    /// The unified material feed.
    pub fn materials(&self) -> &KeyedStore<CompoundKey, MaterialLocation> {
        self.mjoin.output()
    }

    /// The real (host-backed) function rows only.
    pub fn real_functions(&self) -> &KeyedStore<CompoundKey, FunctionLocation> {
        &self.real
    }

    /// The pre-overlay virtual rows (pristine mirror output).
    pub fn pristine_virtuals(&self) -> &KeyedStore<CompoundKey, FunctionLocation> {
        self.generator.output()
    }

    /// The overlay store.
    pub fn overlays(&self) -> &OverlayStore<P> {
        &self.overlays
    }

    /// The injected host port.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host port access (for embedders that own host state).
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Subscribes to the unified function feed.
    pub fn connect_functions(&mut self) -> Connection<CompoundKey, FunctionLocation> {
        self.merge.output_mut().connect()
    }

    /// Drains function-feed changes for a subscription.
    pub fn function_changes(
        &mut self,
        conn: &mut Connection<CompoundKey, FunctionLocation>,
    ) -> Vec<ChangeRecord<CompoundKey, FunctionLocation>> {
        self.merge.output_mut().changes_since(conn)
    }

    /// Releases a function-feed subscription.
    pub fn disconnect_functions(&mut self, conn: Connection<CompoundKey, FunctionLocation>) {
        self.merge.output_mut().disconnect(conn);
    }

    /// Subscribes to the unified material feed.
    pub fn connect_materials(&mut self) -> Connection<CompoundKey, MaterialLocation> {
        self.mjoin.output_mut().connect()
    }

    /// Drains material-feed changes for a subscription.
    pub fn material_changes(
        &mut self,
        conn: &mut Connection<CompoundKey, MaterialLocation>,
    ) -> Vec<ChangeRecord<CompoundKey, MaterialLocation>> {
        self.mjoin.output_mut().changes_since(conn)
    }

    /// Releases a material-feed subscription.
    pub fn disconnect_materials(&mut self, conn: Connection<CompoundKey, MaterialLocation>) {
        self.mjoin.output_mut().disconnect(conn);
    }
}
