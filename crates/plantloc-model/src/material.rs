// SPDX-License-Identifier: Apache-2.0
//! Material (BOM) location records derived from material-carrying function
//! locations.

use serde::{Deserialize, Serialize};

use crate::key::CompoundKey;

/// Immutable value record for one material location.
///
/// Shares the function location identity discipline: keyed by `id`, replaced
/// wholesale on change, with the same real/virtual split (`is_virtual`,
/// `proxy_group_id`, `target_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialLocation {
    /// Identity of the owning function location node.
    pub id: CompoundKey,
    /// Material (catalog) code.
    pub code: String,
    /// Quantity read from the backing shape.
    pub quantity: i32,
    /// Quantity per unit: `quantity / unit_quantity` with floor semantics,
    /// 1 when the unit quantity is zero.
    pub unit_multiplier: i32,
    /// Material type classification string.
    pub material_type: String,
    /// Key engineering parameters (free text).
    pub key_parameters: String,
    /// True for rows derived from virtual function locations.
    pub is_virtual: bool,
    /// For virtual rows: the owning proxy group.
    pub proxy_group_id: Option<CompoundKey>,
    /// For virtual rows: the real node whose backing shape supplies the
    /// material properties.
    pub target_id: Option<CompoundKey>,
}

impl MaterialLocation {
    /// A blank record for `id`; quantity 0, unit multiplier 1.
    #[must_use]
    pub fn new(id: CompoundKey) -> Self {
        Self {
            id,
            code: String::new(),
            quantity: 0,
            unit_multiplier: 1,
            material_type: String::new(),
            key_parameters: String::new(),
            is_virtual: false,
            proxy_group_id: None,
            target_id: None,
        }
    }
}
