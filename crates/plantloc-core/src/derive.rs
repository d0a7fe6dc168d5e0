// SPDX-License-Identifier: Apache-2.0
//! Real function-location derivation: classification, parent resolution,
//! field maps, and the reverse edit-to-patch mapping.

use plantloc_model::{props, CompoundKey, FunctionKind, FunctionLocation, PropertyPatch};
use thiserror::Error;

use crate::shape::ShapeRecord;
use crate::store::KeyedStore;

/// A shape's category set matched no known function kind.
///
/// Fatal to that single shape's derivation: the shape is dropped from the
/// derived feed and the error surfaced in the pump report. It never aborts
/// the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("shape {key:?} matches no function kind (categories: {categories:?})")]
pub struct ClassifyError {
    /// The unclassifiable shape.
    pub key: CompoundKey,
    /// Its category tags, for the observability sink.
    pub categories: Vec<String>,
}

/// Classifies a shape by its category tags.
///
/// Fixed precedence: ProcessZone > FunctionUnit > FunctionGroup > Equipment
/// > Instrument > FunctionElement.
pub fn classify(shape: &ShapeRecord) -> Result<FunctionKind, ClassifyError> {
    const PRECEDENCE: [(&str, FunctionKind); 6] = [
        (props::CAT_PROCESS_ZONE, FunctionKind::ProcessZone),
        (props::CAT_FUNCTION_UNIT, FunctionKind::FunctionUnit),
        (props::CAT_FUNCTION_GROUP, FunctionKind::FunctionGroup),
        (props::CAT_EQUIPMENT, FunctionKind::Equipment),
        (props::CAT_INSTRUMENT, FunctionKind::Instrument),
        (props::CAT_FUNCTION_ELEMENT, FunctionKind::FunctionElement),
    ];
    PRECEDENCE
        .iter()
        .find(|(tag, _)| shape.categories.contains(*tag))
        .map(|(_, kind)| *kind)
        .ok_or_else(|| ClassifyError {
            key: shape.id,
            categories: shape.categories.iter().cloned().collect(),
        })
}

/// Derives the typed function location for one shape snapshot.
///
/// `shapes` is the current raw shape store, consulted for container nesting
/// depth during parent resolution.
pub fn derive_function_location(
    shape: &ShapeRecord,
    shapes: &KeyedStore<CompoundKey, ShapeRecord>,
) -> Result<FunctionLocation, ClassifyError> {
    let kind = classify(shape)?;
    let mut loc = FunctionLocation::new(shape.id, kind);

    let is_proxy = kind == FunctionKind::FunctionGroup && shape.callout_target.is_some();
    loc.is_proxy = is_proxy;

    loc.parent_id = match kind {
        FunctionKind::ProcessZone => None,
        FunctionKind::FunctionGroup if is_proxy => {
            loc.target_id = shape.callout_target;
            Some(CompoundKey::root())
        }
        FunctionKind::FunctionElement => shape.callout_target,
        FunctionKind::FunctionGroup
        | FunctionKind::FunctionUnit
        | FunctionKind::Equipment
        | FunctionKind::Instrument => deepest_container(shape, shapes),
    };
    // A node without a resolvable parent would make downstream tree-building
    // ambiguous; everything below the zone level hangs off the sentinel root.
    if loc.parent_id.is_none() && kind != FunctionKind::ProcessZone {
        loc.parent_id = Some(CompoundKey::root());
    }

    let read = |name: &str| shape.property(name).unwrap_or_default().to_owned();
    match kind {
        FunctionKind::ProcessZone => {
            loc.zone = read(props::PROP_ZONE);
            loc.zone_name = read(props::PROP_ZONE_NAME);
            loc.zone_name_en = read(props::PROP_ZONE_NAME_EN);
        }
        FunctionKind::FunctionGroup => {
            loc.zone = read(props::PROP_ZONE);
            loc.zone_name = read(props::PROP_ZONE_NAME);
            loc.zone_name_en = read(props::PROP_ZONE_NAME_EN);
            loc.group = read(props::PROP_GROUP);
            loc.group_name = read(props::PROP_GROUP_NAME);
            loc.group_name_en = read(props::PROP_GROUP_NAME_EN);
        }
        FunctionKind::FunctionUnit
        | FunctionKind::Equipment
        | FunctionKind::Instrument
        | FunctionKind::FunctionElement => {
            loc.element = read(props::PROP_ELEMENT);
        }
    }
    loc.description = read(props::PROP_DESCRIPTION);
    loc.remarks = read(props::PROP_REMARKS);
    loc.function_id = shape
        .property(props::PROP_FUNCTION_ID)
        .and_then(|raw| raw.trim().parse::<i32>().ok());
    loc.unit_multiplier = if kind == FunctionKind::FunctionUnit {
        parse_count(shape.property(props::PROP_UNIT_QUANTITY)).max(1)
    } else {
        1
    };
    loc.included_in_project = shape
        .property(props::PROP_INCLUDE_IN_PROJECT)
        .map_or(true, parse_flag);

    Ok(loc)
}

/// Resolves the most specific enclosing grouping: among the shape's direct
/// containers still present in the shape store, the one with the greatest
/// number of containing containers of its own. Ties break toward the
/// smallest key for determinism. Container ids pointing at deleted shapes
/// are ignored; a member whose containers are all gone falls back to the
/// sentinel root, which is what reparents it out of any mirrored subtree.
fn deepest_container(
    shape: &ShapeRecord,
    shapes: &KeyedStore<CompoundKey, ShapeRecord>,
) -> Option<CompoundKey> {
    shape
        .containers
        .iter()
        .filter_map(|id| shapes.get(id).map(|c| (c.containers.len(), *id)))
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, id)| id)
}

/// Parses a host count property (floored float), 0 on absence or garbage.
fn parse_count(raw: Option<&str>) -> i32 {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .map_or(0, |v| v.floor() as i32)
}

/// Parses a host boolean property; only explicit falsy values disable.
fn parse_flag(raw: &str) -> bool {
    !matches!(raw.trim(), "0" | "false" | "FALSE" | "False")
}

/// Maps an edited (non-virtual) location back to its ordered property
/// patches.
///
/// The element write-back is kind-specific: Equipment keeps only the digits
/// of the element tag, Instrument writes the full tag, FunctionElement the
/// suffix after the last `-`. The remarks patch always forces the row into
/// existence so clearing remarks sticks.
#[must_use]
pub fn location_patches(loc: &FunctionLocation) -> Vec<PropertyPatch> {
    let id = loc.id;
    let mut patches = match loc.kind {
        FunctionKind::ProcessZone => vec![
            PropertyPatch::set(id, props::PROP_ZONE, loc.zone.clone()),
            PropertyPatch::set(id, props::PROP_ZONE_NAME, loc.zone_name.clone()),
            PropertyPatch::set(id, props::PROP_ZONE_NAME_EN, loc.zone_name_en.clone()),
        ],
        FunctionKind::FunctionGroup => vec![
            PropertyPatch::set(id, props::PROP_GROUP, loc.group.clone()),
            PropertyPatch::set(id, props::PROP_GROUP_NAME, loc.group_name.clone()),
            PropertyPatch::set(id, props::PROP_GROUP_NAME_EN, loc.group_name_en.clone()),
            PropertyPatch::set(id, props::PROP_DESCRIPTION, loc.description.clone()),
        ],
        FunctionKind::FunctionUnit => vec![
            PropertyPatch::set(id, props::PROP_ELEMENT, loc.element.clone()),
            PropertyPatch::set(id, props::PROP_DESCRIPTION, loc.description.clone()),
            PropertyPatch::set(id, props::PROP_UNIT_QUANTITY, loc.unit_multiplier.to_string()),
        ],
        FunctionKind::Equipment => vec![
            PropertyPatch::set(id, props::PROP_ELEMENT, digits_of(&loc.element)),
            PropertyPatch::set(id, props::PROP_DESCRIPTION, loc.description.clone()),
        ],
        FunctionKind::Instrument => vec![
            PropertyPatch::set(id, props::PROP_ELEMENT, loc.element.clone()),
            PropertyPatch::set(id, props::PROP_DESCRIPTION, loc.description.clone()),
        ],
        FunctionKind::FunctionElement => vec![
            PropertyPatch::set(id, props::PROP_ELEMENT, tag_suffix(&loc.element)),
            PropertyPatch::set(id, props::PROP_DESCRIPTION, loc.description.clone()),
        ],
    };
    if let Some(function_id) = loc.function_id {
        patches.push(PropertyPatch::set(
            id,
            props::PROP_FUNCTION_ID,
            function_id.to_string(),
        ));
    }
    patches.push(PropertyPatch::upsert(
        id,
        props::PROP_REMARKS,
        loc.remarks.clone(),
    ));
    patches
}

/// Digits-only extraction for equipment tags (`"P-1203A"` -> `"1203"`).
fn digits_of(element: &str) -> String {
    element.chars().filter(char::is_ascii_digit).collect()
}

/// Suffix after the last `-` for element tags (`"FIC-220-01"` -> `"01"`).
fn tag_suffix(element: &str) -> String {
    element
        .rsplit_once('-')
        .map_or(element, |(_, suffix)| suffix)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn tagged(id: CompoundKey, tags: &[&str]) -> ShapeRecord {
        let mut shape = ShapeRecord::new(id);
        shape.categories = tags.iter().map(|t| (*t).to_owned()).collect();
        shape
    }

    #[test]
    fn classification_precedence_prefers_zone_then_unit() {
        let shape = tagged(
            CompoundKey::shape(0, 1),
            &[props::CAT_FUNCTION_GROUP, props::CAT_PROCESS_ZONE],
        );
        assert_eq!(classify(&shape), Ok(FunctionKind::ProcessZone));

        let shape = tagged(
            CompoundKey::shape(0, 2),
            &[props::CAT_EQUIPMENT, props::CAT_FUNCTION_UNIT],
        );
        assert_eq!(classify(&shape), Ok(FunctionKind::FunctionUnit));
    }

    #[test]
    fn unknown_categories_fail_classification() {
        let shape = tagged(CompoundKey::shape(0, 3), &["Pipe"]);
        let err = classify(&shape).expect_err("no kind matches");
        assert_eq!(err.key, CompoundKey::shape(0, 3));
        assert_eq!(err.categories, vec!["Pipe".to_owned()]);
    }

    #[test]
    fn empty_category_set_fails_classification() {
        let shape = ShapeRecord {
            categories: BTreeSet::new(),
            ..ShapeRecord::new(CompoundKey::shape(0, 4))
        };
        assert!(classify(&shape).is_err());
    }

    #[test]
    fn parent_is_the_deepest_direct_container() {
        let zone = CompoundKey::shape(0, 1);
        let unit = CompoundKey::shape(0, 2);
        let mut shapes = KeyedStore::new();
        shapes.upsert(zone, tagged(zone, &[props::CAT_PROCESS_ZONE]));
        let mut unit_shape = tagged(unit, &[props::CAT_FUNCTION_UNIT]);
        unit_shape.containers = vec![zone];
        shapes.upsert(unit, unit_shape);

        // Equipment contained in both the zone (depth 0) and the unit
        // (depth 1, it is itself contained): the unit wins.
        let mut equip = tagged(CompoundKey::shape(0, 3), &[props::CAT_EQUIPMENT]);
        equip.containers = vec![zone, unit];
        let loc = derive_function_location(&equip, &shapes).expect("derive");
        assert_eq!(loc.parent_id, Some(unit));
    }

    #[test]
    fn containers_missing_from_the_store_never_anchor_the_parent() {
        let zone = CompoundKey::shape(0, 1);
        let gone = CompoundKey::shape(0, 2);
        let mut shapes = KeyedStore::new();
        shapes.upsert(zone, tagged(zone, &[props::CAT_PROCESS_ZONE]));

        // One live container and one pointing at a deleted shape: the live
        // one wins regardless of key order.
        let mut equip = tagged(CompoundKey::shape(0, 3), &[props::CAT_EQUIPMENT]);
        equip.containers = vec![gone, zone];
        let loc = derive_function_location(&equip, &shapes).expect("derive");
        assert_eq!(loc.parent_id, Some(zone));

        // All containers gone: sentinel root, not the stale id.
        let mut orphan = tagged(CompoundKey::shape(0, 4), &[props::CAT_EQUIPMENT]);
        orphan.containers = vec![gone];
        let loc = derive_function_location(&orphan, &shapes).expect("derive");
        assert_eq!(loc.parent_id, Some(CompoundKey::root()));
    }

    #[test]
    fn proxy_group_gets_sentinel_parent_and_callout_target() {
        let target = CompoundKey::shape(0, 10);
        let shapes = KeyedStore::new();
        let mut proxy = tagged(CompoundKey::shape(0, 20), &[props::CAT_FUNCTION_GROUP]);
        proxy.callout_target = Some(target);
        let loc = derive_function_location(&proxy, &shapes).expect("derive");
        assert!(loc.is_proxy);
        assert_eq!(loc.parent_id, Some(CompoundKey::root()));
        assert_eq!(loc.target_id, Some(target));
    }

    #[test]
    fn function_element_parents_on_its_callout_target() {
        let target = CompoundKey::shape(0, 5);
        let shapes = KeyedStore::new();
        let mut element = tagged(CompoundKey::shape(0, 6), &[props::CAT_FUNCTION_ELEMENT]);
        element.callout_target = Some(target);
        let loc = derive_function_location(&element, &shapes).expect("derive");
        assert_eq!(loc.parent_id, Some(target));
    }

    #[test]
    fn orphan_equipment_is_normalized_to_the_sentinel_root() {
        let shapes = KeyedStore::new();
        let equip = tagged(CompoundKey::shape(0, 7), &[props::CAT_EQUIPMENT]);
        let loc = derive_function_location(&equip, &shapes).expect("derive");
        assert_eq!(loc.parent_id, Some(CompoundKey::root()));
    }

    #[test]
    fn zone_has_no_parent() {
        let shapes = KeyedStore::new();
        let zone = tagged(CompoundKey::shape(0, 8), &[props::CAT_PROCESS_ZONE]);
        let loc = derive_function_location(&zone, &shapes).expect("derive");
        assert_eq!(loc.parent_id, None);
    }

    #[test]
    fn missing_fields_default_not_error() {
        let shapes = KeyedStore::new();
        let equip = tagged(CompoundKey::shape(0, 9), &[props::CAT_EQUIPMENT]);
        let loc = derive_function_location(&equip, &shapes).expect("derive");
        assert_eq!(loc.element, "");
        assert_eq!(loc.description, "");
        assert!(loc.included_in_project, "defaults true when absent");
        assert_eq!(loc.unit_multiplier, 1);
    }

    #[test]
    fn unit_quantity_only_applies_to_function_units() {
        let shapes = KeyedStore::new();
        let mut unit = tagged(CompoundKey::shape(0, 11), &[props::CAT_FUNCTION_UNIT]);
        unit.properties
            .insert(props::PROP_UNIT_QUANTITY.to_owned(), "3".to_owned());
        let loc = derive_function_location(&unit, &shapes).expect("derive");
        assert_eq!(loc.unit_multiplier, 3);

        let mut equip = tagged(CompoundKey::shape(0, 12), &[props::CAT_EQUIPMENT]);
        equip
            .properties
            .insert(props::PROP_UNIT_QUANTITY.to_owned(), "3".to_owned());
        let loc = derive_function_location(&equip, &shapes).expect("derive");
        assert_eq!(loc.unit_multiplier, 1);
    }

    #[test]
    fn equipment_patch_extracts_digits_only() {
        let mut loc = FunctionLocation::new(CompoundKey::shape(0, 1), FunctionKind::Equipment);
        loc.element = "P-1203A".to_owned();
        let patches = location_patches(&loc);
        assert_eq!(patches[0].name, props::PROP_ELEMENT);
        assert_eq!(patches[0].value, "1203");
    }

    #[test]
    fn element_patch_keeps_suffix_after_last_separator() {
        let mut loc =
            FunctionLocation::new(CompoundKey::shape(0, 1), FunctionKind::FunctionElement);
        loc.element = "FIC-220-01".to_owned();
        let patches = location_patches(&loc);
        assert_eq!(patches[0].value, "01");
    }

    #[test]
    fn remarks_patch_always_creates_the_row() {
        let loc = FunctionLocation::new(CompoundKey::shape(0, 1), FunctionKind::Instrument);
        let patches = location_patches(&loc);
        let remarks = patches
            .iter()
            .find(|p| p.name == props::PROP_REMARKS)
            .expect("remarks patch present");
        assert!(remarks.create_if_missing);
    }

    #[test]
    fn function_id_is_appended_when_present() {
        let mut loc = FunctionLocation::new(CompoundKey::shape(0, 1), FunctionKind::ProcessZone);
        loc.function_id = Some(42);
        let patches = location_patches(&loc);
        assert!(patches
            .iter()
            .any(|p| p.name == props::PROP_FUNCTION_ID && p.value == "42"));
    }

    #[test]
    fn group_writes_four_fields_zone_writes_three() {
        let group = FunctionLocation::new(CompoundKey::shape(0, 1), FunctionKind::FunctionGroup);
        // 4 named fields + remarks.
        assert_eq!(location_patches(&group).len(), 5);
        let zone = FunctionLocation::new(CompoundKey::shape(0, 2), FunctionKind::ProcessZone);
        // 3 named fields + remarks.
        assert_eq!(location_patches(&zone).len(), 4);
    }
}
