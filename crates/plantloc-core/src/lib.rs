// SPDX-License-Identifier: Apache-2.0
//! Incremental derivation engine for hierarchical plant locations.
//!
//! The crate turns a live feed of raw diagram shapes into two derived,
//! continuously maintained data sets: the function-location tree (process
//! zones down to function elements, including virtual rows mirrored under
//! proxy groups) and the flat material-location list. Everything is built
//! from one primitive, the reactive [`store::KeyedStore`], composed through
//! explicit view stages and pumped by [`pipeline::LocationPipeline`].
//!
//! Determinism rules the design: ordered maps everywhere, value-equality
//! no-op upserts, and a monotone synthetic-key allocator make re-derivation
//! idempotent and virtual identities stable for the process lifetime.

#![forbid(unsafe_code)]

pub mod derive;
pub mod material;
pub mod overlay;
pub mod patch;
pub mod pipeline;
pub mod shape;
pub mod store;
pub mod view;
pub mod virtualize;

pub use derive::{classify, derive_function_location, location_patches, ClassifyError};
pub use material::derive_material_location;
pub use overlay::{
    apply_function_overlay, apply_material_overlay, MemoryOverlayPersistence, OverlayError,
    OverlayPersistence, OverlayStore, NUMERIC_TOLERANCE,
};
pub use patch::{material_patches, WriteError};
pub use pipeline::{LocationPipeline, PumpReport};
pub use shape::{HostError, MemoryHost, ShapeHost, ShapeRecord};
pub use store::{ChangeReason, ChangeRecord, Connection, KeyedStore};
pub use view::{FilterView, JoinView, MergeView, RekeyView, TransformView};
pub use virtualize::{SyntheticKeys, VirtualLocationGenerator};
