// SPDX-License-Identifier: Apache-2.0
//! Function location records: the typed nodes of the derived location forest.

use serde::{Deserialize, Serialize};

use crate::key::CompoundKey;

/// Classification of a function location node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    /// Top-level process zone; the only kind without a parent.
    ProcessZone,
    /// Grouping node; may act as a proxy mirroring another group's subtree.
    FunctionGroup,
    /// Unit node carrying an explicit unit quantity.
    FunctionUnit,
    /// Equipment leaf.
    Equipment,
    /// Instrument leaf.
    Instrument,
    /// Free-standing function element annotating another shape.
    FunctionElement,
}

impl FunctionKind {
    /// Returns `true` for the kinds that produce material locations.
    #[must_use]
    pub fn carries_material(self) -> bool {
        matches!(
            self,
            Self::Equipment | Self::Instrument | Self::FunctionElement
        )
    }
}

/// Immutable value record for one node of the function location forest.
///
/// Records are replaced wholesale on change; stores key them by [`id`]
/// (`CompoundKey`), never by field contents.
///
/// Invariant: at most one of `is_proxy` and `is_virtual` is true. A proxy is
/// a real node that stands in for another group; a virtual node is generated
/// from a proxy and is never itself a proxy.
///
/// [`id`]: FunctionLocation::id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionLocation {
    /// The node's own identity. Synthetic for virtual nodes.
    pub id: CompoundKey,
    /// Parent node id. `None` only for `ProcessZone`; every other kind is
    /// normalized to the sentinel root when no parent resolves.
    pub parent_id: Option<CompoundKey>,
    /// Node classification.
    pub kind: FunctionKind,
    /// Optional catalog function identifier.
    pub function_id: Option<i32>,
    /// Zone code.
    pub zone: String,
    /// Zone display name.
    pub zone_name: String,
    /// Zone English display name.
    pub zone_name_en: String,
    /// Group code.
    pub group: String,
    /// Group display name.
    pub group_name: String,
    /// Group English display name.
    pub group_name_en: String,
    /// Element code (equipment/instrument/element tag).
    pub element: String,
    /// Free-text description.
    pub description: String,
    /// Free-text remarks.
    pub remarks: String,
    /// Unit multiplier; the explicit unit quantity for `FunctionUnit`, 1
    /// otherwise.
    pub unit_multiplier: i32,
    /// Whether the node participates in project bookkeeping. Defaults true
    /// when the host property is absent.
    pub included_in_project: bool,
    /// True only for `FunctionGroup` nodes acting as a mirror point.
    pub is_proxy: bool,
    /// For proxy nodes: the real group the proxy stands in for. For virtual
    /// nodes: the real source node being mirrored.
    pub target_id: Option<CompoundKey>,
    /// For virtual nodes: the proxy group they were generated under.
    pub proxy_group_id: Option<CompoundKey>,
    /// True for nodes synthesized by the mirror generator.
    pub is_virtual: bool,
}

impl FunctionLocation {
    /// A blank record of the given identity and kind; string fields empty,
    /// `unit_multiplier` 1, `included_in_project` true.
    #[must_use]
    pub fn new(id: CompoundKey, kind: FunctionKind) -> Self {
        Self {
            id,
            parent_id: None,
            kind,
            function_id: None,
            zone: String::new(),
            zone_name: String::new(),
            zone_name_en: String::new(),
            group: String::new(),
            group_name: String::new(),
            group_name_en: String::new(),
            element: String::new(),
            description: String::new(),
            remarks: String::new(),
            unit_multiplier: 1,
            included_in_project: true,
            is_proxy: false,
            target_id: None,
            proxy_group_id: None,
            is_virtual: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_defaults() {
        let loc = FunctionLocation::new(CompoundKey::shape(0, 1), FunctionKind::Equipment);
        assert_eq!(loc.unit_multiplier, 1);
        assert!(loc.included_in_project);
        assert!(!loc.is_proxy);
        assert!(!loc.is_virtual);
        assert!(loc.parent_id.is_none());
    }

    #[test]
    fn material_kinds() {
        assert!(FunctionKind::Equipment.carries_material());
        assert!(FunctionKind::Instrument.carries_material());
        assert!(FunctionKind::FunctionElement.carries_material());
        assert!(!FunctionKind::FunctionGroup.carries_material());
        assert!(!FunctionKind::ProcessZone.carries_material());
        assert!(!FunctionKind::FunctionUnit.carries_material());
    }
}
