// SPDX-License-Identifier: Apache-2.0
//! Identity keys for real, proxy, and virtual location entities.

use serde::{Deserialize, Serialize};

/// Reserved page identifier for synthetic (virtual) shape keys.
///
/// Host pages are numbered from zero upward, so no real shape key can ever
/// carry this page id. Virtual keys minted by the mirror generator therefore
/// never collide with host-backed keys.
pub const VIRTUAL_PAGE: i64 = -1;

/// Discriminated identifier used as the primary key for every entity in the
/// location stores and as the target of property patches.
///
/// Equality, ordering, and hashing are by variant plus fields, so keys are
/// usable directly in `BTreeMap`/`FxHashSet` collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompoundKey {
    /// A shape on a page of the host document.
    Shape {
        /// Host page identifier.
        page: i64,
        /// Shape identifier within the page.
        shape: i64,
    },
    /// A master (stencil) entry.
    Master {
        /// Base identifier of the master.
        base: i64,
    },
    /// A page of the host document.
    Page {
        /// Host page identifier.
        page: i64,
    },
    /// The document itself.
    Document {
        /// Document identifier.
        document: i64,
    },
}

impl CompoundKey {
    /// Sentinel parent for top-level nodes.
    ///
    /// Tree consumers treat this key as the forest root; it is never the id
    /// of an actual entity.
    #[must_use]
    pub fn root() -> Self {
        Self::Document { document: 0 }
    }

    /// Key for a real shape on a host page.
    #[must_use]
    pub fn shape(page: i64, shape: i64) -> Self {
        Self::Shape { page, shape }
    }

    /// Synthetic key for a virtual (non-host-backed) node.
    ///
    /// Uses the reserved [`VIRTUAL_PAGE`] namespace so it can never equal a
    /// real shape key.
    #[must_use]
    pub fn virtual_shape(id: i64) -> Self {
        Self::Shape {
            page: VIRTUAL_PAGE,
            shape: id,
        }
    }

    /// Returns `true` when this key lives in the synthetic namespace.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        matches!(self, Self::Shape { page, .. } if *page == VIRTUAL_PAGE)
    }
}

/// Natural key of a virtual node: which proxy it hangs under and which real
/// node it mirrors.
///
/// Serves two roles: the overlay store key (user overrides are addressed by
/// proxy/target, so they survive re-derivation), and the mirror generator's
/// position key for not-yet-materialized virtual nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VirtualKey {
    /// The proxy group the virtual node is generated under.
    pub proxy_id: CompoundKey,
    /// The real node being mirrored.
    pub target_id: CompoundKey,
}

impl VirtualKey {
    /// Builds a key from its two halves.
    #[must_use]
    pub fn new(proxy_id: CompoundKey, target_id: CompoundKey) -> Self {
        Self {
            proxy_id,
            target_id,
        }
    }
}
