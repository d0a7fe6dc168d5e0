// SPDX-License-Identifier: Apache-2.0
//! Per-field override records for virtual locations.

use serde::{Deserialize, Serialize};

use crate::key::VirtualKey;

/// User-entered exceptions for one virtual location, keyed by
/// (proxy, target).
///
/// Every field is a nullable delta: `None` means "use the mirrored value",
/// `Some` wins over it. An overlay whose fields are all `None` carries no
/// information and is deleted from the store and from persisted state.
///
/// Function locations use `description`/`remarks`/`unit_multiplier`; material
/// locations use `quantity`/`code`/`unit_multiplier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationOverlay {
    /// (proxy, target) identity of the virtual location this overlay amends.
    pub key: VirtualKey,
    /// Description override.
    pub description: Option<String>,
    /// Remarks override.
    pub remarks: Option<String>,
    /// Unit multiplier override.
    pub unit_multiplier: Option<i32>,
    /// Material quantity override.
    pub quantity: Option<i32>,
    /// Material code override.
    pub code: Option<String>,
}

impl LocationOverlay {
    /// An empty overlay for `key` (all fields `None`).
    #[must_use]
    pub fn new(key: VirtualKey) -> Self {
        Self {
            key,
            description: None,
            remarks: None,
            unit_multiplier: None,
            quantity: None,
            code: None,
        }
    }

    /// `true` when no field overrides the mirrored value; such an overlay
    /// may be deleted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.remarks.is_none()
            && self.unit_multiplier.is_none()
            && self.quantity.is_none()
            && self.code.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CompoundKey;

    #[test]
    fn empty_detection() {
        let key = VirtualKey::new(CompoundKey::shape(0, 1), CompoundKey::shape(0, 2));
        let mut overlay = LocationOverlay::new(key);
        assert!(overlay.is_empty());
        overlay.quantity = Some(4);
        assert!(!overlay.is_empty());
        overlay.quantity = None;
        assert!(overlay.is_empty());
    }

    #[test]
    fn survives_json_round_trip() {
        let key = VirtualKey::new(CompoundKey::shape(0, 1), CompoundKey::shape(2, 3));
        let mut overlay = LocationOverlay::new(key);
        overlay.description = Some("replacement pump".to_owned());
        let blob = serde_json::to_vec(&overlay).expect("serialize");
        let back: LocationOverlay = serde_json::from_slice(&blob).expect("deserialize");
        assert_eq!(back, overlay);
    }
}
