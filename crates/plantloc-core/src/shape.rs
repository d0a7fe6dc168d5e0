// SPDX-License-Identifier: Apache-2.0
//! Host shape records and the host port.
//!
//! The diagramming host is an external collaborator: the pipeline sees it as
//! a feed of per-shape snapshots plus a synchronous property read/write port.
//! Nothing in this crate talks to a real host; adapters implement
//! [`ShapeHost`] at the application boundary.

use std::collections::{BTreeMap, BTreeSet};

use plantloc_model::{CompoundKey, PropertyPatch};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Snapshot of one host shape, as delivered by the shape feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeRecord {
    /// Shape identity.
    pub id: CompoundKey,
    /// Category tags assigned by the host stencil.
    pub categories: BTreeSet<String>,
    /// Raw property bag (property name -> raw string value).
    pub properties: BTreeMap<String, String>,
    /// Direct structural containers of this shape, in host order.
    pub containers: Vec<CompoundKey>,
    /// Reference target when this shape is an annotation/callout.
    pub callout_target: Option<CompoundKey>,
}

impl ShapeRecord {
    /// A bare record with the given identity and no tags or properties.
    #[must_use]
    pub fn new(id: CompoundKey) -> Self {
        Self {
            id,
            categories: BTreeSet::new(),
            properties: BTreeMap::new(),
            containers: Vec::new(),
            callout_target: None,
        }
    }

    /// Raw property value, if the shape carries the row.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Error from the host property write sink.
#[derive(Debug, Error)]
pub enum HostError {
    /// The patch target does not exist in the host document.
    #[error("unknown patch target {0:?}")]
    UnknownTarget(CompoundKey),
    /// The host rejected the write.
    #[error("host rejected write: {0}")]
    Rejected(String),
}

/// Synchronous host port: property reads and the patch write sink.
///
/// Injected into the pipeline constructor; no ambient host state exists
/// anywhere in the crate.
pub trait ShapeHost {
    /// Raw property value of a shape, `None` when the shape or row is
    /// missing. Missing properties are a default, never an error.
    fn property(&self, id: &CompoundKey, name: &str) -> Option<String>;

    /// Property value rendered through the host's display format.
    fn formatted_property(&self, id: &CompoundKey, name: &str) -> Option<String>;

    /// Applies an ordered list of property patches.
    ///
    /// A patch without `create_if_missing` only updates rows the shape
    /// already carries; the skip is silent. Stencil shapes carry their
    /// structured rows from the moment they are dropped, so in practice
    /// only free-form rows (remarks) ever need forcing into existence.
    fn write_properties(&mut self, patches: &[PropertyPatch]) -> Result<(), HostError>;
}

/// In-memory [`ShapeHost`] backed by a map of [`ShapeRecord`]s.
///
/// Used by the test suites and by embedders that already hold a full shape
/// snapshot. Writes mutate the backing records; the embedder is responsible
/// for feeding the resulting shape updates back into the pipeline.
#[derive(Debug, Default)]
pub struct MemoryHost {
    shapes: BTreeMap<CompoundKey, ShapeRecord>,
    formats: BTreeMap<(CompoundKey, String), String>,
}

impl MemoryHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a shape record.
    pub fn put(&mut self, record: ShapeRecord) {
        self.shapes.insert(record.id, record);
    }

    /// Removes a shape record.
    pub fn delete(&mut self, id: &CompoundKey) -> Option<ShapeRecord> {
        self.shapes.remove(id)
    }

    /// Returns the backing record for `id`.
    pub fn shape(&self, id: &CompoundKey) -> Option<&ShapeRecord> {
        self.shapes.get(id)
    }

    /// Installs a display format pattern for one property row.
    pub fn set_format(&mut self, id: CompoundKey, name: &str, pattern: &str) {
        self.formats.insert((id, name.to_owned()), pattern.to_owned());
    }
}

impl ShapeHost for MemoryHost {
    fn property(&self, id: &CompoundKey, name: &str) -> Option<String> {
        self.shapes
            .get(id)
            .and_then(|shape| shape.property(name))
            .map(str::to_owned)
    }

    fn formatted_property(&self, id: &CompoundKey, name: &str) -> Option<String> {
        let raw = self.property(id, name)?;
        let pattern = self.formats.get(&(*id, name.to_owned()));
        Some(pattern.map_or(raw.clone(), |p| {
            plantloc_model::apply_display_format(&raw, p)
        }))
    }

    fn write_properties(&mut self, patches: &[PropertyPatch]) -> Result<(), HostError> {
        for patch in patches {
            let shape = self
                .shapes
                .get_mut(&patch.target)
                .ok_or(HostError::UnknownTarget(patch.target))?;
            if !patch.create_if_missing && !shape.properties.contains_key(&patch.name) {
                continue;
            }
            shape
                .properties
                .insert(patch.name.clone(), patch.value.clone());
        }
        Ok(())
    }
}
