// SPDX-License-Identifier: Apache-2.0
//! plantloc-model: pure data types for the derived P&ID location model.
//!
//! Identity keys, function/material location records, per-field overlay
//! deltas, and host property patches. No derivation logic lives here; the
//! types are plain values with deterministic ordering and serde support so
//! stores and persistence layers can treat them uniformly.
#![forbid(unsafe_code)]

mod format;
mod function;
mod key;
mod material;
mod overlay;
mod patch;

/// Category tags and host property names shared by derivation and write-back.
pub mod props;

pub use format::apply_display_format;
pub use function::{FunctionKind, FunctionLocation};
pub use key::{CompoundKey, VirtualKey, VIRTUAL_PAGE};
pub use material::MaterialLocation;
pub use overlay::LocationOverlay;
pub use patch::PropertyPatch;
