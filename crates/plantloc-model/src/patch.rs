// SPDX-License-Identifier: Apache-2.0
//! Named property patches applied to the host's per-shape property store.

use serde::{Deserialize, Serialize};

use crate::key::CompoundKey;

/// One named property write against a host shape.
///
/// Patches are applied in list order by the host write sink. Patches are
/// never emitted for virtual targets; edits to virtual locations are routed
/// into the overlay store instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPatch {
    /// Shape the property belongs to.
    pub target: CompoundKey,
    /// Host property name (see [`crate::props`]).
    pub name: String,
    /// New raw value.
    pub value: String,
    /// Create the property row when the shape does not carry it yet.
    pub create_if_missing: bool,
    /// Optional label formula installed alongside the value.
    pub label_formula: Option<String>,
}

impl PropertyPatch {
    /// A plain value patch that requires the property row to exist.
    #[must_use]
    pub fn set(target: CompoundKey, name: &str, value: impl Into<String>) -> Self {
        Self {
            target,
            name: name.to_owned(),
            value: value.into(),
            create_if_missing: false,
            label_formula: None,
        }
    }

    /// A value patch that creates the property row when absent.
    #[must_use]
    pub fn upsert(target: CompoundKey, name: &str, value: impl Into<String>) -> Self {
        Self {
            create_if_missing: true,
            ..Self::set(target, name, value)
        }
    }
}
