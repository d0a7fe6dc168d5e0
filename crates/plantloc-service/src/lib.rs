// SPDX-License-Identifier: Apache-2.0
//! Host-facing runtime for the plantloc derivation pipeline.
//!
//! Wraps [`plantloc_core::LocationPipeline`] in a tokio background worker
//! with event coalescing and broadcast fan-out, and provides the concrete
//! persistence pieces the core crate only declares ports for: JSON file
//! overlay storage, worker preferences, and the catalog recommendation
//! client port.

#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod persist;
pub mod worker;

pub use catalog::{CatalogClient, CatalogContext, CatalogError, RankedMaterial};
pub use config::{FsPrefsStore, PrefsError, PrefsService, PrefsStore, WorkerPrefs, WORKER_PREFS_KEY};
pub use persist::JsonOverlayStore;
pub use worker::{FeedUpdate, PipelineWorker, ShapeEvent, WorkerRequest};
