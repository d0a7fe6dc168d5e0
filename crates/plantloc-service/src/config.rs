// SPDX-License-Identifier: Apache-2.0
//! Preferences service and storage port for the pipeline worker.

use std::fs;
use std::path::PathBuf;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Storage port for raw preference blobs (keyed by logical name).
pub trait PrefsStore {
    /// Load a raw blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, PrefsError>;
    /// Persist a raw blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), PrefsError>;
}

/// Error type for preference operations.
#[derive(Debug, Error)]
pub enum PrefsError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Thin service that serializes preference values and delegates storage to a
/// [`PrefsStore`].
pub struct PrefsService<S> {
    store: S,
}

impl<S> PrefsService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> PrefsService<S>
where
    S: PrefsStore,
{
    /// Load and deserialize a value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, PrefsError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            Err(PrefsError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), PrefsError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

/// Store preference blobs as JSON files under a caller-supplied directory.
pub struct FsPrefsStore {
    base: PathBuf,
}

impl FsPrefsStore {
    /// Create a store rooted at `base`, creating the directory when needed.
    pub fn new(base: PathBuf) -> Result<Self, PrefsError> {
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl PrefsStore for FsPrefsStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, PrefsError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(PrefsError::NotFound),
            Err(err) => Err(PrefsError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), PrefsError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

/// Preference key for [`WorkerPrefs`].
pub const WORKER_PREFS_KEY: &str = "worker";

/// Tunables of the background pipeline worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPrefs {
    /// Shape-event coalescing window, in milliseconds.
    pub coalesce_window_ms: u64,
}

impl Default for WorkerPrefs {
    fn default() -> Self {
        Self {
            coalesce_window_ms: 250,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_loads_as_none() {
        let dir = std::env::temp_dir().join(format!("plantloc-prefs-{}", std::process::id()));
        let service = PrefsService::new(FsPrefsStore::new(dir).expect("store"));
        let loaded: Option<WorkerPrefs> = service.load("absent").expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn prefs_round_trip_through_the_store() {
        let dir =
            std::env::temp_dir().join(format!("plantloc-prefs-rt-{}", std::process::id()));
        let service = PrefsService::new(FsPrefsStore::new(dir).expect("store"));
        let prefs = WorkerPrefs {
            coalesce_window_ms: 40,
        };
        service.save(WORKER_PREFS_KEY, &prefs).expect("save");
        let loaded: WorkerPrefs = service
            .load(WORKER_PREFS_KEY)
            .expect("load")
            .expect("present");
        assert_eq!(loaded.coalesce_window_ms, 40);
    }
}
