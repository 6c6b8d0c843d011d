//! Model viewer provider contract
//!
//! The pipeline talks to the 3D viewer only through [`ViewerProvider`]. Every call is
//! asynchronous and may fail independently; callers decide whether a failure is fatal.
//!
//! - [`supplemental`]: best-effort enrichment lookups built on the contract.
//! - [`selection`]: turns the viewer selection into decoded records.
//! - [`memory`]: an in-memory provider backed by a JSON snapshot.

pub mod memory;
pub mod selection;
pub mod supplemental;

use async_trait::async_trait;
use propmark_model::{MarkupId, ObjectId, ProviderError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use memory::{ProviderSnapshot, SnapshotProvider};
pub use selection::{load_selection, SelectedRecord};
pub use supplemental::SupplementalDataFetcher;

// ============================================================================
// Wire types
// ============================================================================

/// Objects selected in one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSelection {
    pub model_id: String,
    #[serde(rename = "objects")]
    pub object_ids: Vec<ObjectId>,
}

/// Reference information for one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub global_id: Option<String>,
    pub file: Option<String>,
    pub common_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

/// Axis-aligned bounding box in model units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vector3,
    pub max: Vector3,
}

impl BoundingBox {
    pub fn midpoint(&self) -> Vector3 {
        Vector3::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectBoundingBox {
    pub object_id: ObjectId,
    pub bounding_box: BoundingBox,
}

/// Point-style label placement; both endpoints are the same point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub start: Vector3,
    pub end: Vector3,
}

impl Anchor {
    pub fn point(at: Vector3) -> Self {
        Self { start: at, end: at }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupRequest {
    pub text: String,
    pub model_id: String,
    pub object_id: ObjectId,
    pub anchor: Option<Anchor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyQuery {
    pub include_hidden: bool,
}

// ============================================================================
// Provider contract
// ============================================================================

#[async_trait]
pub trait ViewerProvider: Send + Sync {
    async fn selected_objects(&self) -> Result<Vec<ModelSelection>, ProviderError>;

    /// Raw property records; the response is a single record or an array.
    async fn object_properties(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
        query: PropertyQuery,
    ) -> Result<Value, ProviderError>;

    /// One entry per requested id, in request order.
    async fn object_metadata(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
    ) -> Result<Vec<ObjectMetadata>, ProviderError>;

    /// Layer names per requested id, in request order.
    async fn presentation_layers(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
    ) -> Result<Vec<Vec<String>>, ProviderError>;

    /// External (IFC) identifier per requested id, in request order.
    async fn convert_to_external_ids(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
    ) -> Result<Vec<String>, ProviderError>;

    async fn loaded_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;

    async fn loaded_model(&self, model_id: &str) -> Result<ModelInfo, ProviderError>;

    async fn project_name(&self) -> Result<String, ProviderError>;

    /// Providers without 3D point placement keep the default.
    async fn bounding_boxes(
        &self,
        _model_id: &str,
        _object_ids: &[ObjectId],
    ) -> Result<Vec<ObjectBoundingBox>, ProviderError> {
        Err(ProviderError::Unsupported("bounding boxes"))
    }

    async fn create_markup(&self, request: MarkupRequest) -> Result<MarkupId, ProviderError>;

    async fn remove_markups(&self, ids: &[MarkupId]) -> Result<(), ProviderError>;
}

/// Pad or truncate a positional response to `len` entries.
pub(crate) fn align<T>(len: usize, items: Vec<T>) -> Vec<Option<T>> {
    let mut out: Vec<Option<T>> = items.into_iter().take(len).map(Some).collect();
    out.resize_with(len, || None);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_is_box_center() {
        let bbox = BoundingBox {
            min: Vector3::new(0.0, -2.0, 1.0),
            max: Vector3::new(4.0, 2.0, 3.0),
        };
        assert_eq!(bbox.midpoint(), Vector3::new(2.0, 0.0, 2.0));
        assert_eq!(bbox.midpoint().scale(1000.0), Vector3::new(2000.0, 0.0, 2000.0));
    }

    #[test]
    fn align_pads_and_truncates() {
        assert_eq!(align(3, vec![1, 2]), vec![Some(1), Some(2), None]);
        assert_eq!(align(1, vec![1, 2]), vec![Some(1)]);
    }
}
