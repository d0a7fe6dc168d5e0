// SPDX-License-Identifier: Apache-2.0
//! Material derivation: per-location material rows read from the backing
//! host shape.

use plantloc_model::{props, CompoundKey, FunctionLocation, MaterialLocation};

use crate::shape::ShapeHost;

/// Derives the material row for a function location, or `None` for kinds
/// that carry no material.
///
/// Property reads always target the *backing* shape: the location's own key
/// for real rows, its mirror target for virtual rows. Virtual rows therefore
/// start out byte-identical to their source's material data; per-row
/// divergence is layered on afterwards from the overlay store.
pub fn derive_material_location<H: ShapeHost>(
    loc: &FunctionLocation,
    host: &H,
) -> Option<MaterialLocation> {
    if !loc.kind.carries_material() {
        return None;
    }
    let backing = backing_shape(loc);
    let read = |name: &str| host.property(&backing, name).unwrap_or_default();

    let quantity = parse_quantity(host.property(&backing, props::PROP_QUANTITY).as_deref());
    let unit_quantity =
        parse_quantity(host.property(&backing, props::PROP_UNIT_QUANTITY).as_deref());

    let mut material = MaterialLocation::new(loc.id);
    material.code = read(props::PROP_MATERIAL_CODE);
    material.material_type = read(props::PROP_MATERIAL_TYPE);
    material.key_parameters = read(props::PROP_KEY_PARAMETERS);
    material.quantity = quantity.floor() as i32;
    // A zero unit quantity means "not unitized"; a multiplier of 1 keeps
    // totals equal to raw quantity instead of dividing by zero.
    material.unit_multiplier = if unit_quantity == 0.0 {
        1
    } else {
        (quantity / unit_quantity).floor() as i32
    };
    material.is_virtual = loc.is_virtual;
    material.proxy_group_id = loc.proxy_group_id;
    material.target_id = loc.target_id;
    Some(material)
}

/// The shape whose property bag backs this location's material data.
pub fn backing_shape(loc: &FunctionLocation) -> CompoundKey {
    if loc.is_virtual {
        loc.target_id.unwrap_or(loc.id)
    } else {
        loc.id
    }
}

fn parse_quantity(raw: Option<&str>) -> f64 {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or_default()
}
