// SPDX-License-Identifier: Apache-2.0
//! Material catalog recommendation port.
//!
//! The catalog lives in an external service; this crate defines only the
//! client-side port and its data shapes. Transport implementations plug in
//! at the application boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the catalog gets to rank against: the descriptive fields of the
/// location being filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogContext {
    /// Free-text location description.
    pub description: String,
    /// Material type classifier, when known.
    pub material_type: String,
    /// Key sizing parameters, when known.
    pub key_parameters: String,
    /// Plant zone code of the location.
    pub zone: String,
}

/// One ranked catalog hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMaterial {
    /// Catalog material code.
    pub code: String,
    /// Catalog description.
    pub description: String,
    /// Relevance score, higher is better.
    pub score: f64,
}

/// Error from a catalog client.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog endpoint could not be reached.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    /// The catalog rejected the request.
    #[error("catalog rejected request: {0}")]
    Rejected(String),
}

/// Client port for material recommendations.
// Recommendation calls happen on the embedder's UI task; no Send bound is
// imposed on the returned future.
#[allow(async_fn_in_trait)]
pub trait CatalogClient {
    /// Ranked material suggestions for the given location context.
    async fn recommendations(
        &self,
        context: &CatalogContext,
    ) -> Result<Vec<RankedMaterial>, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCatalog(Vec<RankedMaterial>);

    impl CatalogClient for FixedCatalog {
        async fn recommendations(
            &self,
            _context: &CatalogContext,
        ) -> Result<Vec<RankedMaterial>, CatalogError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn port_is_implementable_with_plain_async_fns() {
        let catalog = FixedCatalog(vec![RankedMaterial {
            code: "MAT-1".to_owned(),
            description: "centrifugal pump".to_owned(),
            score: 0.9,
        }]);
        let context = CatalogContext {
            description: "feed pump".to_owned(),
            material_type: String::new(),
            key_parameters: String::new(),
            zone: "A".to_owned(),
        };
        let hits = catalog.recommendations(&context).await.expect("hits");
        assert_eq!(hits[0].code, "MAT-1");
    }
}
