//! In-memory provider backed by a JSON snapshot.
//!
//! Used by the CLI to run the pipeline offline and by tests. Individual calls can be
//! made to fail, and every call yields once to the scheduler the way a real RPC would.

use crate::{
    BoundingBox, MarkupRequest, ModelInfo, ModelSelection, ObjectBoundingBox, ObjectMetadata,
    PropertyQuery, ViewerProvider,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use propmark_model::{MarkupId, ObjectId, ProviderError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderSnapshot {
    pub project_name: Option<String>,
    pub models: Vec<SnapshotModel>,
    /// Defaults to every object of every model.
    pub selection: Option<Vec<ModelSelection>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotModel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the model shows up in the loaded-model listing.
    #[serde(default = "default_listed")]
    pub listed: bool,
    #[serde(default)]
    pub objects: Vec<SnapshotObject>,
}

fn default_listed() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotObject {
    pub id: ObjectId,
    /// Raw property record exactly as the viewer would return it.
    #[serde(default)]
    pub record: Value,
    #[serde(default)]
    pub metadata: Option<ObjectMetadata>,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
}

pub struct SnapshotProvider {
    snapshot: ProviderSnapshot,
    failing_calls: HashSet<String>,
    failing_markups: HashSet<ObjectId>,
    markups: Mutex<BTreeMap<MarkupId, MarkupRequest>>,
    removed: Mutex<Vec<MarkupId>>,
    next_id: AtomicU64,
}

impl SnapshotProvider {
    pub fn new(snapshot: ProviderSnapshot) -> Self {
        Self {
            snapshot,
            failing_calls: HashSet::new(),
            failing_markups: HashSet::new(),
            markups: Mutex::new(BTreeMap::new()),
            removed: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    /// Make every call to the named trait method fail.
    pub fn fail_call(mut self, method: &str) -> Self {
        self.failing_calls.insert(method.to_string());
        self
    }

    /// Make markup creation fail for one object.
    pub fn fail_markup_for(mut self, object_id: ObjectId) -> Self {
        self.failing_markups.insert(object_id);
        self
    }

    /// Markups currently present, by id.
    pub fn markups(&self) -> Vec<(MarkupId, MarkupRequest)> {
        self.markups
            .lock()
            .iter()
            .map(|(id, req)| (*id, req.clone()))
            .collect()
    }

    pub fn removed(&self) -> Vec<MarkupId> {
        self.removed.lock().clone()
    }

    fn model(&self, model_id: &str) -> Result<&SnapshotModel, ProviderError> {
        self.snapshot
            .models
            .iter()
            .find(|m| m.id == model_id)
            .ok_or_else(|| ProviderError::Call(format!("model {model_id} is not loaded")))
    }

    fn object(&self, model_id: &str, object_id: ObjectId) -> Option<&SnapshotObject> {
        self.model(model_id)
            .ok()?
            .objects
            .iter()
            .find(|o| o.id == object_id)
    }

    async fn enter(&self, method: &'static str) -> Result<(), ProviderError> {
        tokio::task::yield_now().await;
        if self.failing_calls.contains(method) {
            return Err(ProviderError::Call(format!("{method} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl ViewerProvider for SnapshotProvider {
    async fn selected_objects(&self) -> Result<Vec<ModelSelection>, ProviderError> {
        self.enter("selected_objects").await?;
        if let Some(selection) = &self.snapshot.selection {
            return Ok(selection.clone());
        }
        Ok(self
            .snapshot
            .models
            .iter()
            .filter(|m| !m.objects.is_empty())
            .map(|m| ModelSelection {
                model_id: m.id.clone(),
                object_ids: m.objects.iter().map(|o| o.id).collect(),
            })
            .collect())
    }

    async fn object_properties(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
        _query: PropertyQuery,
    ) -> Result<Value, ProviderError> {
        self.enter("object_properties").await?;
        let model = self.model(model_id)?;
        let records = object_ids
            .iter()
            .filter_map(|id| model.objects.iter().find(|o| o.id == *id))
            .map(|object| {
                let mut record = match &object.record {
                    Value::Object(map) => map.clone(),
                    _ => serde_json::Map::new(),
                };
                record
                    .entry("id")
                    .or_insert_with(|| Value::from(object.id));
                Value::Object(record)
            })
            .collect();
        Ok(Value::Array(records))
    }

    async fn object_metadata(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
    ) -> Result<Vec<ObjectMetadata>, ProviderError> {
        self.enter("object_metadata").await?;
        Ok(object_ids
            .iter()
            .map(|id| {
                self.object(model_id, *id)
                    .and_then(|o| o.metadata.clone())
                    .unwrap_or_default()
            })
            .collect())
    }

    async fn presentation_layers(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
    ) -> Result<Vec<Vec<String>>, ProviderError> {
        self.enter("presentation_layers").await?;
        Ok(object_ids
            .iter()
            .map(|id| {
                self.object(model_id, *id)
                    .map(|o| o.layers.clone())
                    .unwrap_or_default()
            })
            .collect())
    }

    async fn convert_to_external_ids(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
    ) -> Result<Vec<String>, ProviderError> {
        self.enter("convert_to_external_ids").await?;
        Ok(object_ids
            .iter()
            .map(|id| {
                self.object(model_id, *id)
                    .and_then(|o| o.external_id.clone())
                    .unwrap_or_default()
            })
            .collect())
    }

    async fn loaded_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        self.enter("loaded_models").await?;
        Ok(self
            .snapshot
            .models
            .iter()
            .filter(|m| m.listed)
            .map(|m| ModelInfo {
                id: m.id.clone(),
                name: m.name.clone(),
            })
            .collect())
    }

    async fn loaded_model(&self, model_id: &str) -> Result<ModelInfo, ProviderError> {
        self.enter("loaded_model").await?;
        let model = self.model(model_id)?;
        Ok(ModelInfo {
            id: model.id.clone(),
            name: model.name.clone(),
        })
    }

    async fn project_name(&self) -> Result<String, ProviderError> {
        self.enter("project_name").await?;
        Ok(self.snapshot.project_name.clone().unwrap_or_default())
    }

    async fn bounding_boxes(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
    ) -> Result<Vec<ObjectBoundingBox>, ProviderError> {
        self.enter("bounding_boxes").await?;
        let model = self.model(model_id)?;
        if model.objects.iter().all(|o| o.bounding_box.is_none()) {
            return Err(ProviderError::Unsupported("bounding boxes"));
        }
        Ok(object_ids
            .iter()
            .filter_map(|id| {
                let object = model.objects.iter().find(|o| o.id == *id)?;
                Some(ObjectBoundingBox {
                    object_id: object.id,
                    bounding_box: object.bounding_box?,
                })
            })
            .collect())
    }

    async fn create_markup(&self, request: MarkupRequest) -> Result<MarkupId, ProviderError> {
        self.enter("create_markup").await?;
        if self.failing_markups.contains(&request.object_id) {
            return Err(ProviderError::Call(format!(
                "markup rejected for object {}",
                request.object_id
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.markups.lock().insert(id, request);
        Ok(id)
    }

    async fn remove_markups(&self, ids: &[MarkupId]) -> Result<(), ProviderError> {
        self.enter("remove_markups").await?;
        let mut markups = self.markups.lock();
        let mut removed = self.removed.lock();
        for id in ids {
            if markups.remove(id).is_some() {
                removed.push(*id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> SnapshotProvider {
        SnapshotProvider::from_json(
            &json!({
                "models": [{ "id": "m1", "objects": [
                    { "id": 5, "record": { "name": "Beam" } },
                    { "id": 6 }
                ]}]
            })
            .to_string(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn default_selection_is_every_object() {
        let selection = provider().selected_objects().await.unwrap();
        assert_eq!(
            selection,
            vec![ModelSelection {
                model_id: "m1".into(),
                object_ids: vec![5, 6]
            }]
        );
    }

    #[tokio::test]
    async fn properties_inject_missing_ids() {
        let value = provider()
            .object_properties("m1", &[6, 5, 99], PropertyQuery { include_hidden: true })
            .await
            .unwrap();
        assert_eq!(value, json!([{ "id": 6 }, { "id": 5, "name": "Beam" }]));
    }

    #[tokio::test]
    async fn markups_are_created_and_removed() {
        let provider = provider().fail_markup_for(6);
        let request = |object_id| MarkupRequest {
            text: "x".into(),
            model_id: "m1".into(),
            object_id,
            anchor: None,
        };
        let id = provider.create_markup(request(5)).await.unwrap();
        assert!(provider.create_markup(request(6)).await.is_err());
        provider.remove_markups(&[id, 42]).await.unwrap();
        assert!(provider.markups().is_empty());
        assert_eq!(provider.removed(), vec![id]);
    }

    #[tokio::test]
    async fn bounding_boxes_unsupported_without_geometry() {
        let err = provider().bounding_boxes("m1", &[5]).await.unwrap_err();
        assert_eq!(err, ProviderError::Unsupported("bounding boxes"));
    }
}
