// SPDX-License-Identifier: Apache-2.0
//! Per-field edit overlays for virtual locations.
//!
//! Virtual rows have no host shape of their own, so user edits to them are
//! captured as per-field deltas against the pristine mirrored record. An
//! overlay field is `Some` exactly while the edited value differs from the
//! mirror source; editing a field back to its source value clears it, and an
//! overlay with no live fields is deleted outright. That keeps the overlay
//! store minimal and makes "revert to source" a natural consequence of
//! editing rather than a separate operation.

use plantloc_model::{FunctionLocation, LocationOverlay, MaterialLocation, VirtualKey};
use thiserror::Error;

use crate::store::KeyedStore;

/// Absolute tolerance for numeric field comparison during reconciliation.
/// Host quantity properties round-trip through display formatting, so exact
/// float equality would re-materialize overlays on every echo.
pub const NUMERIC_TOLERANCE: f64 = 0.01;

/// Error from the overlay layer.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The persistence backend rejected a save or load.
    #[error("overlay persistence failed: {message}")]
    Persistence {
        /// Backend-reported detail.
        message: String,
    },
}

impl OverlayError {
    /// Wraps a backend failure.
    pub fn persistence(source: impl std::fmt::Display) -> Self {
        Self::Persistence {
            message: source.to_string(),
        }
    }
}

/// Write-through persistence port for the overlay set.
///
/// Saves are full-replace: the backend stores exactly the slice it is given.
pub trait OverlayPersistence {
    /// Loads the persisted overlay set (empty when nothing was ever saved).
    fn load(&mut self) -> Result<Vec<LocationOverlay>, OverlayError>;

    /// Replaces the persisted overlay set.
    fn save(&mut self, overlays: &[LocationOverlay]) -> Result<(), OverlayError>;
}

impl<P: OverlayPersistence + ?Sized> OverlayPersistence for &mut P {
    fn load(&mut self) -> Result<Vec<LocationOverlay>, OverlayError> {
        (**self).load()
    }

    fn save(&mut self, overlays: &[LocationOverlay]) -> Result<(), OverlayError> {
        (**self).save(overlays)
    }
}

/// In-memory [`OverlayPersistence`] for tests and ephemeral embedders.
#[derive(Debug, Default)]
pub struct MemoryOverlayPersistence {
    overlays: Vec<LocationOverlay>,
}

impl MemoryOverlayPersistence {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverlayPersistence for MemoryOverlayPersistence {
    fn load(&mut self) -> Result<Vec<LocationOverlay>, OverlayError> {
        Ok(self.overlays.clone())
    }

    fn save(&mut self, overlays: &[LocationOverlay]) -> Result<(), OverlayError> {
        self.overlays = overlays.to_vec();
        Ok(())
    }
}

/// Reactive overlay store with write-through persistence.
///
/// The in-memory store is the source of truth; every reconciliation applies
/// in memory first and then persists the full set. A persistence failure
/// keeps the in-memory edit and surfaces the error to the caller.
#[derive(Debug)]
pub struct OverlayStore<P> {
    overlays: KeyedStore<VirtualKey, LocationOverlay>,
    persistence: P,
}

impl<P: OverlayPersistence> OverlayStore<P> {
    /// Creates the store, populating it from the backend.
    pub fn load(mut persistence: P) -> Result<Self, OverlayError> {
        let mut overlays = KeyedStore::new();
        for overlay in persistence.load()? {
            overlays.upsert(overlay.key, overlay);
        }
        Ok(Self {
            overlays,
            persistence,
        })
    }

    /// The live overlay store (for joins and subscriptions).
    pub fn overlays(&self) -> &KeyedStore<VirtualKey, LocationOverlay> {
        &self.overlays
    }

    /// Mutable store access (for connecting downstream cursors).
    pub fn overlays_mut(&mut self) -> &mut KeyedStore<VirtualKey, LocationOverlay> {
        &mut self.overlays
    }

    /// The overlay at `key`, if one is live.
    pub fn get(&self, key: &VirtualKey) -> Option<&LocationOverlay> {
        self.overlays.get(key)
    }

    /// Drops the overlay at `key` (used when its virtual row disappears for
    /// good and the delta should not resurrect).
    pub fn discard(&mut self, key: &VirtualKey) -> Result<(), OverlayError> {
        if self.overlays.remove(key).is_none() {
            return Ok(());
        }
        self.persist()
    }

    /// Reconciles a function-field edit of a virtual row against its
    /// pristine mirrored record.
    pub fn reconcile_function(
        &mut self,
        key: VirtualKey,
        pristine: &FunctionLocation,
        edited: &FunctionLocation,
    ) -> Result<(), OverlayError> {
        let mut overlay = self.current(key);
        overlay.description = delta_str(&pristine.description, &edited.description);
        overlay.remarks = delta_str(&pristine.remarks, &edited.remarks);
        overlay.unit_multiplier =
            delta_num(pristine.unit_multiplier, edited.unit_multiplier);
        self.commit(key, overlay)
    }

    /// Reconciles a material-field edit of a virtual row against its
    /// pristine derived record.
    pub fn reconcile_material(
        &mut self,
        key: VirtualKey,
        pristine: &MaterialLocation,
        edited: &MaterialLocation,
    ) -> Result<(), OverlayError> {
        let mut overlay = self.current(key);
        overlay.code = delta_str(&pristine.code, &edited.code);
        overlay.quantity = delta_num(pristine.quantity, edited.quantity);
        overlay.unit_multiplier =
            delta_num(pristine.unit_multiplier, edited.unit_multiplier);
        self.commit(key, overlay)
    }

    fn current(&self, key: VirtualKey) -> LocationOverlay {
        self.overlays
            .get(&key)
            .cloned()
            .unwrap_or_else(|| LocationOverlay::new(key))
    }

    fn commit(&mut self, key: VirtualKey, overlay: LocationOverlay) -> Result<(), OverlayError> {
        if overlay.is_empty() {
            if self.overlays.remove(&key).is_none() {
                // Nothing was stored and nothing needs storing.
                return Ok(());
            }
        } else {
            self.overlays.upsert(key, overlay);
        }
        self.persist()
    }

    fn persist(&mut self) -> Result<(), OverlayError> {
        let all: Vec<LocationOverlay> =
            self.overlays.iter().map(|(_, o)| o.clone()).collect();
        self.persistence.save(&all)
    }
}

/// `Some(edited)` when the edited string differs from the source.
fn delta_str(source: &str, edited: &str) -> Option<String> {
    if source == edited {
        None
    } else {
        Some(edited.to_owned())
    }
}

/// `Some(edited)` when the edited number differs from the source beyond
/// [`NUMERIC_TOLERANCE`].
fn delta_num(source: i32, edited: i32) -> Option<i32> {
    if (f64::from(source) - f64::from(edited)).abs() <= NUMERIC_TOLERANCE {
        None
    } else {
        Some(edited)
    }
}

/// Projects a virtual function row through its overlay, if any.
#[must_use]
pub fn apply_function_overlay(
    loc: &FunctionLocation,
    overlay: Option<&LocationOverlay>,
) -> FunctionLocation {
    let mut out = loc.clone();
    if let Some(overlay) = overlay {
        if let Some(description) = &overlay.description {
            out.description = description.clone();
        }
        if let Some(remarks) = &overlay.remarks {
            out.remarks = remarks.clone();
        }
        if let Some(unit_multiplier) = overlay.unit_multiplier {
            out.unit_multiplier = unit_multiplier;
        }
    }
    out
}

/// Projects a virtual material row through its overlay, if any.
#[must_use]
pub fn apply_material_overlay(
    material: &MaterialLocation,
    overlay: Option<&LocationOverlay>,
) -> MaterialLocation {
    let mut out = material.clone();
    if let Some(overlay) = overlay {
        if let Some(code) = &overlay.code {
            out.code = code.clone();
        }
        if let Some(quantity) = overlay.quantity {
            out.quantity = quantity;
        }
        if let Some(unit_multiplier) = overlay.unit_multiplier {
            out.unit_multiplier = unit_multiplier;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantloc_model::{CompoundKey, FunctionKind};

    fn key() -> VirtualKey {
        VirtualKey::new(CompoundKey::shape(0, 20), CompoundKey::shape(0, 11))
    }

    fn pristine() -> FunctionLocation {
        let mut loc =
            FunctionLocation::new(CompoundKey::virtual_shape(1), FunctionKind::Equipment);
        loc.description = "pump".to_owned();
        loc.is_virtual = true;
        loc
    }

    #[test]
    fn differing_field_is_captured() {
        let mut store = OverlayStore::load(MemoryOverlayPersistence::new()).expect("load");
        let mut edited = pristine();
        edited.description = "spare pump".to_owned();
        store
            .reconcile_function(key(), &pristine(), &edited)
            .expect("reconcile");
        let overlay = store.get(&key()).expect("overlay stored");
        assert_eq!(overlay.description.as_deref(), Some("spare pump"));
        assert_eq!(overlay.remarks, None);
    }

    #[test]
    fn editing_back_to_source_deletes_the_overlay() {
        let mut store = OverlayStore::load(MemoryOverlayPersistence::new()).expect("load");
        let mut edited = pristine();
        edited.description = "spare pump".to_owned();
        store
            .reconcile_function(key(), &pristine(), &edited)
            .expect("reconcile");
        assert!(store.get(&key()).is_some());

        store
            .reconcile_function(key(), &pristine(), &pristine())
            .expect("reconcile");
        assert!(store.get(&key()).is_none());
    }

    #[test]
    fn overlays_survive_a_reload() {
        let mut backend = MemoryOverlayPersistence::new();
        {
            let mut store = OverlayStore::load(&mut backend).expect("load");
            let mut edited = pristine();
            edited.remarks = "check seals".to_owned();
            store
                .reconcile_function(key(), &pristine(), &edited)
                .expect("reconcile");
        }
        let store = OverlayStore::load(&mut backend).expect("reload");
        assert_eq!(
            store.get(&key()).and_then(|o| o.remarks.as_deref()),
            Some("check seals")
        );
    }

    #[test]
    fn discard_drops_the_overlay_and_its_persisted_copy() {
        let mut backend = MemoryOverlayPersistence::new();
        {
            let mut store = OverlayStore::load(&mut backend).expect("load");
            let mut edited = pristine();
            edited.description = "spare pump".to_owned();
            store
                .reconcile_function(key(), &pristine(), &edited)
                .expect("reconcile");

            store.discard(&key()).expect("discard");
            assert!(store.get(&key()).is_none());
            // Discarding an absent overlay is a no-op, not an error.
            store.discard(&key()).expect("discard again");
        }
        let store = OverlayStore::load(&mut backend).expect("reload");
        assert!(store.get(&key()).is_none(), "discard reached the backend");
    }

    #[test]
    fn material_reconciliation_covers_code_and_quantity() {
        let mut store = OverlayStore::load(MemoryOverlayPersistence::new()).expect("load");
        let mut source = MaterialLocation::new(CompoundKey::virtual_shape(1));
        source.code = "MAT-1".to_owned();
        source.quantity = 4;
        source.unit_multiplier = 2;
        let mut edited = source.clone();
        edited.code = "MAT-2".to_owned();
        edited.quantity = 6;

        store
            .reconcile_material(key(), &source, &edited)
            .expect("reconcile");
        let overlay = store.get(&key()).expect("overlay stored");
        assert_eq!(overlay.code.as_deref(), Some("MAT-2"));
        assert_eq!(overlay.quantity, Some(6));
        assert_eq!(overlay.unit_multiplier, None, "unchanged field stays clear");
    }

    #[test]
    fn application_overrides_only_live_fields() {
        let mut overlay = LocationOverlay::new(key());
        overlay.description = Some("spare pump".to_owned());
        let projected = apply_function_overlay(&pristine(), Some(&overlay));
        assert_eq!(projected.description, "spare pump");
        assert_eq!(projected.remarks, pristine().remarks);

        let untouched = apply_function_overlay(&pristine(), None);
        assert_eq!(untouched, pristine());
    }

    #[test]
    fn persistence_failure_keeps_the_in_memory_edit() {
        struct FailingSave;
        impl OverlayPersistence for FailingSave {
            fn load(&mut self) -> Result<Vec<LocationOverlay>, OverlayError> {
                Ok(Vec::new())
            }
            fn save(&mut self, _: &[LocationOverlay]) -> Result<(), OverlayError> {
                Err(OverlayError::persistence("disk full"))
            }
        }

        let mut store = OverlayStore::load(FailingSave).expect("load");
        let mut edited = pristine();
        edited.description = "spare pump".to_owned();
        let result = store.reconcile_function(key(), &pristine(), &edited);
        assert!(result.is_err());
        assert!(store.get(&key()).is_some(), "edit stays in memory");
    }
}
