// SPDX-License-Identifier: Apache-2.0
//! JSON file persistence for the overlay set.

use std::fs;
use std::path::PathBuf;

use plantloc_core::{OverlayError, OverlayPersistence};
use plantloc_model::LocationOverlay;

/// File-backed overlay persistence with full-replace save semantics.
///
/// The whole overlay set is one pretty-printed JSON array; overlay counts
/// are small (one row per user-touched virtual location), so rewriting the
/// file on every edit is the simple and sufficient strategy.
#[derive(Debug)]
pub struct JsonOverlayStore {
    path: PathBuf,
}

impl JsonOverlayStore {
    /// Creates a store backed by `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The backing file path.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl OverlayPersistence for JsonOverlayStore {
    fn load(&mut self) -> Result<Vec<LocationOverlay>, OverlayError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(OverlayError::persistence)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(OverlayError::persistence(err)),
        }
    }

    fn save(&mut self, overlays: &[LocationOverlay]) -> Result<(), OverlayError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(OverlayError::persistence)?;
        }
        let data = serde_json::to_vec_pretty(overlays).map_err(OverlayError::persistence)?;
        fs::write(&self.path, data).map_err(OverlayError::persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantloc_model::{CompoundKey, VirtualKey};

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "plantloc-overlays-{tag}-{}.json",
            std::process::id()
        ))
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let mut store = JsonOverlayStore::new(temp_path("missing"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn overlays_round_trip_through_the_file() {
        let path = temp_path("roundtrip");
        let mut store = JsonOverlayStore::new(path.clone());

        let key = VirtualKey::new(CompoundKey::shape(0, 20), CompoundKey::shape(0, 11));
        let mut overlay = LocationOverlay::new(key);
        overlay.description = Some("standby pump".to_owned());
        store.save(&[overlay]).expect("save");

        let mut reopened = JsonOverlayStore::new(path.clone());
        let loaded = reopened.load().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].key, key);
        assert_eq!(loaded[0].description.as_deref(), Some("standby pump"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn save_is_full_replace() {
        let path = temp_path("replace");
        let mut store = JsonOverlayStore::new(path.clone());
        let key = VirtualKey::new(CompoundKey::shape(0, 1), CompoundKey::shape(0, 2));
        let mut overlay = LocationOverlay::new(key);
        overlay.remarks = Some("x".to_owned());
        store.save(&[overlay]).expect("save");
        store.save(&[]).expect("save empty");
        assert!(store.load().expect("load").is_empty());
        let _ = fs::remove_file(path);
    }
}
