// SPDX-License-Identifier: Apache-2.0
//! Background pipeline worker: event intake, time-window coalescing, and
//! fan-out of derived feed updates.

use plantloc_core::{
    ChangeRecord, LocationPipeline, OverlayPersistence, ShapeHost, ShapeRecord,
};
use plantloc_model::{CompoundKey, FunctionLocation, MaterialLocation};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{debug, warn};

use crate::config::WorkerPrefs;

/// One raw shape change from the host document.
#[derive(Debug, Clone)]
pub enum ShapeEvent {
    /// A shape was added or modified.
    Upserted(ShapeRecord),
    /// A shape was deleted.
    Removed(CompoundKey),
}

/// Everything the worker accepts over its intake channel.
#[derive(Debug, Clone)]
pub enum WorkerRequest {
    /// A host shape change.
    Shape(ShapeEvent),
    /// Edited function rows to write back.
    WriteFunctions(Vec<FunctionLocation>),
    /// Edited material rows to write back.
    WriteMaterials(Vec<MaterialLocation>),
}

/// One coalesced batch of derived-feed changes, fanned out to subscribers.
#[derive(Debug, Clone)]
pub struct FeedUpdate {
    /// Unified function feed changes since the previous update.
    pub functions: Vec<ChangeRecord<CompoundKey, FunctionLocation>>,
    /// Unified material feed changes since the previous update.
    pub materials: Vec<ChangeRecord<CompoundKey, MaterialLocation>>,
}

impl FeedUpdate {
    /// `true` when neither feed changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.materials.is_empty()
    }
}

/// Handle to the background worker task.
///
/// The worker owns the pipeline for its whole life; all interaction goes
/// through the request channel and the broadcast feed. Lifecycle is
/// drop/close only: closing the request channel lets the worker finish its
/// current batch and exit.
#[derive(Debug)]
pub struct PipelineWorker {
    requests: mpsc::Sender<WorkerRequest>,
    updates: broadcast::Sender<FeedUpdate>,
    task: JoinHandle<()>,
}

impl PipelineWorker {
    /// Spawns the worker around an already-built pipeline.
    pub fn spawn<H, P>(pipeline: LocationPipeline<H, P>, prefs: &WorkerPrefs) -> Self
    where
        H: ShapeHost + Send + 'static,
        P: OverlayPersistence + Send + 'static,
    {
        let (requests, rx) = mpsc::channel(256);
        let (updates, _) = broadcast::channel(64);
        let window = Duration::from_millis(prefs.coalesce_window_ms);
        let fan_out = updates.clone();
        let task = tokio::spawn(run(pipeline, rx, fan_out, window));
        Self {
            requests,
            updates,
            task,
        }
    }

    /// A sender for the worker's intake channel.
    pub fn requests(&self) -> mpsc::Sender<WorkerRequest> {
        self.requests.clone()
    }

    /// Subscribes to coalesced feed updates.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedUpdate> {
        self.updates.subscribe()
    }

    /// Closes the intake channel and waits for the worker to drain and exit.
    pub async fn shutdown(self) {
        drop(self.requests);
        let _ = self.task.await;
    }
}

async fn run<H, P>(
    mut pipeline: LocationPipeline<H, P>,
    mut rx: mpsc::Receiver<WorkerRequest>,
    updates: broadcast::Sender<FeedUpdate>,
    window: Duration,
) where
    H: ShapeHost + Send + 'static,
    P: OverlayPersistence + Send + 'static,
{
    let mut functions = pipeline.connect_functions();
    let mut materials = pipeline.connect_materials();

    while let Some(first) = rx.recv().await {
        // Absorb everything arriving within one window of the first event;
        // bursts of host notifications become a single pump.
        let mut batch = vec![first];
        let deadline = Instant::now() + window;
        let mut closed = false;
        loop {
            match timeout_at(deadline, rx.recv()).await {
                Ok(Some(request)) => batch.push(request),
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        let coalesced = batch.len();
        for request in batch {
            match request {
                WorkerRequest::Shape(ShapeEvent::Upserted(shape)) => {
                    pipeline.upsert_shape(shape);
                }
                WorkerRequest::Shape(ShapeEvent::Removed(id)) => {
                    pipeline.remove_shape(&id);
                }
                WorkerRequest::WriteFunctions(edits) => {
                    if let Err(err) = pipeline.write_function_edits(&edits) {
                        warn!(error = %err, "function edit write-back failed");
                    }
                }
                WorkerRequest::WriteMaterials(edits) => {
                    if let Err(err) = pipeline.write_material_edits(&edits) {
                        warn!(error = %err, "material edit write-back failed");
                    }
                }
            }
        }

        let report = pipeline.refresh();
        for error in &report.errors {
            warn!(
                key = ?error.key,
                categories = ?error.categories,
                "shape failed classification"
            );
        }

        let update = FeedUpdate {
            functions: pipeline.function_changes(&mut functions),
            materials: pipeline.material_changes(&mut materials),
        };
        debug!(
            requests = coalesced,
            functions = update.functions.len(),
            materials = update.materials.len(),
            "pump complete"
        );
        if !update.is_empty() {
            // No live subscribers is fine; the next one starts from a
            // connect-time snapshot anyway.
            let _ = updates.send(update);
        }

        if closed {
            break;
        }
    }
}
