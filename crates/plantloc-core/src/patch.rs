// SPDX-License-Identifier: Apache-2.0
//! Edit write-back: routes edited rows either to host property patches or
//! to the overlay store.
//!
//! Real rows map back to ordered property patches against their own shape.
//! Virtual rows have no shape; their edits reconcile into overlays against
//! the pristine (pre-overlay) derived record, and the host is never touched.

use plantloc_model::{
    props, CompoundKey, FunctionLocation, MaterialLocation, PropertyPatch, VirtualKey,
};
use thiserror::Error;

use crate::derive::location_patches;
use crate::overlay::{OverlayError, OverlayPersistence, OverlayStore};
use crate::shape::{HostError, ShapeHost};
use crate::store::KeyedStore;

/// Error from the edit write-back path.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The host rejected a property patch.
    #[error(transparent)]
    Host(#[from] HostError),
    /// Overlay reconciliation failed to persist.
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    /// An edited virtual row carries no mirror identity, or its pristine
    /// record is gone from the derived feed.
    #[error("edited virtual row {0:?} has no pristine mirror")]
    MissingMirror(CompoundKey),
}

/// Writes edited function rows back to their owning layer.
///
/// `pristine` is the generator's pre-overlay output store; virtual edits are
/// reconciled against it so an edit equal to the mirrored source clears the
/// overlay instead of storing a redundant delta.
pub fn write_function_edits<H: ShapeHost, P: OverlayPersistence>(
    edits: &[FunctionLocation],
    pristine: &KeyedStore<CompoundKey, FunctionLocation>,
    host: &mut H,
    overlays: &mut OverlayStore<P>,
) -> Result<(), WriteError> {
    for edit in edits {
        if edit.is_virtual {
            let key = mirror_key(edit.proxy_group_id, edit.target_id)
                .ok_or(WriteError::MissingMirror(edit.id))?;
            let source = pristine
                .get(&edit.id)
                .ok_or(WriteError::MissingMirror(edit.id))?;
            overlays.reconcile_function(key, source, edit)?;
        } else {
            host.write_properties(&location_patches(edit))?;
        }
    }
    Ok(())
}

/// Writes edited material rows back to their owning layer.
pub fn write_material_edits<H: ShapeHost, P: OverlayPersistence>(
    edits: &[MaterialLocation],
    pristine: &KeyedStore<CompoundKey, MaterialLocation>,
    host: &mut H,
    overlays: &mut OverlayStore<P>,
) -> Result<(), WriteError> {
    for edit in edits {
        if edit.is_virtual {
            let key = mirror_key(edit.proxy_group_id, edit.target_id)
                .ok_or(WriteError::MissingMirror(edit.id))?;
            let source = pristine
                .get(&edit.id)
                .ok_or(WriteError::MissingMirror(edit.id))?;
            overlays.reconcile_material(key, source, edit)?;
        } else {
            host.write_properties(&material_patches(edit))?;
        }
    }
    Ok(())
}

/// Ordered property patches for an edited (non-virtual) material row.
///
/// The unit multiplier is derived, not stored, so it is never written back.
#[must_use]
pub fn material_patches(material: &MaterialLocation) -> Vec<PropertyPatch> {
    let id = material.id;
    vec![
        PropertyPatch::set(id, props::PROP_MATERIAL_CODE, material.code.clone()),
        PropertyPatch::set(id, props::PROP_QUANTITY, material.quantity.to_string()),
        PropertyPatch::set(id, props::PROP_MATERIAL_TYPE, material.material_type.clone()),
        PropertyPatch::set(
            id,
            props::PROP_KEY_PARAMETERS,
            material.key_parameters.clone(),
        ),
    ]
}

fn mirror_key(
    proxy: Option<CompoundKey>,
    target: Option<CompoundKey>,
) -> Option<VirtualKey> {
    Some(VirtualKey::new(proxy?, target?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::MemoryOverlayPersistence;
    use crate::shape::{MemoryHost, ShapeRecord};
    use plantloc_model::FunctionKind;

    fn store_with(loc: FunctionLocation) -> KeyedStore<CompoundKey, FunctionLocation> {
        let mut store = KeyedStore::new();
        store.upsert(loc.id, loc);
        store
    }

    fn stencil_shape(id: CompoundKey, rows: &[&str]) -> ShapeRecord {
        let mut record = ShapeRecord::new(id);
        for name in rows {
            record.properties.insert((*name).to_owned(), String::new());
        }
        record
    }

    #[test]
    fn real_edit_patches_the_host_shape() {
        let id = CompoundKey::shape(0, 1);
        let mut host = MemoryHost::new();
        host.put(stencil_shape(
            id,
            &[props::PROP_ELEMENT, props::PROP_DESCRIPTION],
        ));
        let mut overlays = OverlayStore::load(MemoryOverlayPersistence::new()).expect("load");

        let mut edit = FunctionLocation::new(id, FunctionKind::Instrument);
        edit.element = "FIC-220".to_owned();
        edit.description = "flow controller".to_owned();
        write_function_edits(&[edit], &KeyedStore::new(), &mut host, &mut overlays)
            .expect("write");

        assert_eq!(
            host.shape(&id)
                .and_then(|s| s.property(props::PROP_ELEMENT)),
            Some("FIC-220")
        );
        assert!(overlays.overlays().is_empty(), "no overlay for real rows");
    }

    #[test]
    fn structured_patches_skip_shapes_without_the_stencil_rows() {
        let id = CompoundKey::shape(0, 2);
        let mut host = MemoryHost::new();
        host.put(ShapeRecord::new(id));
        let mut overlays = OverlayStore::load(MemoryOverlayPersistence::new()).expect("load");

        let mut edit = FunctionLocation::new(id, FunctionKind::Instrument);
        edit.element = "FIC-220".to_owned();
        edit.remarks = "check range".to_owned();
        write_function_edits(&[edit], &KeyedStore::new(), &mut host, &mut overlays)
            .expect("write");

        // No stencil row, no write; only the forced remarks row appears.
        assert_eq!(
            host.shape(&id).and_then(|s| s.property(props::PROP_ELEMENT)),
            None
        );
        assert_eq!(
            host.shape(&id)
                .and_then(|s| s.property(props::PROP_REMARKS)),
            Some("check range")
        );
    }

    #[test]
    fn virtual_edit_lands_in_the_overlay_store_only() {
        let vid = CompoundKey::virtual_shape(1);
        let mut pristine = FunctionLocation::new(vid, FunctionKind::Equipment);
        pristine.is_virtual = true;
        pristine.proxy_group_id = Some(CompoundKey::shape(0, 20));
        pristine.target_id = Some(CompoundKey::shape(0, 11));
        pristine.description = "pump".to_owned();

        let mut edit = pristine.clone();
        edit.description = "spare pump".to_owned();

        let mut host = MemoryHost::new();
        let mut overlays = OverlayStore::load(MemoryOverlayPersistence::new()).expect("load");
        write_function_edits(
            &[edit],
            &store_with(pristine),
            &mut host,
            &mut overlays,
        )
        .expect("write");

        let key = VirtualKey::new(CompoundKey::shape(0, 20), CompoundKey::shape(0, 11));
        assert_eq!(
            overlays.get(&key).and_then(|o| o.description.as_deref()),
            Some("spare pump")
        );
    }

    #[test]
    fn virtual_edit_without_mirror_identity_is_rejected() {
        let mut edit =
            FunctionLocation::new(CompoundKey::virtual_shape(1), FunctionKind::Equipment);
        edit.is_virtual = true;

        let mut host = MemoryHost::new();
        let mut overlays = OverlayStore::load(MemoryOverlayPersistence::new()).expect("load");
        let result =
            write_function_edits(&[edit], &KeyedStore::new(), &mut host, &mut overlays);
        assert!(matches!(result, Err(WriteError::MissingMirror(_))));
    }

    #[test]
    fn material_patches_skip_the_derived_multiplier() {
        let mut material = MaterialLocation::new(CompoundKey::shape(0, 1));
        material.code = "MAT-1".to_owned();
        material.quantity = 7;
        material.unit_multiplier = 3;
        let patches = material_patches(&material);
        assert!(patches.iter().all(|p| p.name != props::PROP_UNIT_QUANTITY));
        assert!(patches
            .iter()
            .any(|p| p.name == props::PROP_QUANTITY && p.value == "7"));
    }
}
