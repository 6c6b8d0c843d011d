//! Best-effort enrichment lookups.
//!
//! Every operation here swallows provider failures: the caller gets an empty or
//! partial result and a [`PipelineEvent`] describes what went missing. Nothing retries,
//! and no operation waits on another.

use crate::{align, ObjectMetadata, ViewerProvider};
use futures::future::join_all;
use propmark_model::{EventSink, ObjectId, PipelineEvent};
use std::collections::HashMap;
use std::sync::Arc;

pub struct SupplementalDataFetcher {
    provider: Arc<dyn ViewerProvider>,
    events: Arc<dyn EventSink>,
}

impl SupplementalDataFetcher {
    pub fn new(provider: Arc<dyn ViewerProvider>, events: Arc<dyn EventSink>) -> Self {
        Self { provider, events }
    }

    /// Metadata per object id, aligned with `object_ids`.
    pub async fn fetch_reference_info(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
    ) -> Vec<Option<ObjectMetadata>> {
        if object_ids.is_empty() {
            return Vec::new();
        }
        match self.provider.object_metadata(model_id, object_ids).await {
            Ok(items) => align(object_ids.len(), items),
            Err(err) => {
                self.step_failed("reference_info", model_id, err.to_string());
                vec![None; object_ids.len()]
            }
        }
    }

    /// Distinct layer names per object id, aligned with `object_ids`.
    pub async fn fetch_presentation_layers(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
    ) -> Vec<Option<Vec<String>>> {
        if object_ids.is_empty() {
            return Vec::new();
        }
        match self.provider.presentation_layers(model_id, object_ids).await {
            Ok(items) => align(object_ids.len(), items)
                .into_iter()
                .map(|layers| layers.map(dedup_layers))
                .collect(),
            Err(err) => {
                self.step_failed("presentation_layers", model_id, err.to_string());
                vec![None; object_ids.len()]
            }
        }
    }

    /// External identifier per object id, aligned with `object_ids`.
    pub async fn fetch_external_ids(
        &self,
        model_id: &str,
        object_ids: &[ObjectId],
    ) -> Vec<Option<String>> {
        if object_ids.is_empty() {
            return Vec::new();
        }
        match self.provider.convert_to_external_ids(model_id, object_ids).await {
            Ok(items) => align(object_ids.len(), items)
                .into_iter()
                .map(|id| id.filter(|s| !s.trim().is_empty()))
                .collect(),
            Err(err) => {
                self.step_failed("external_ids", model_id, err.to_string());
                vec![None; object_ids.len()]
            }
        }
    }

    /// Project name, or `""` when the provider cannot say.
    pub async fn fetch_project_name(&self) -> String {
        match self.provider.project_name().await {
            Ok(name) => name,
            Err(err) => {
                self.events.emit(PipelineEvent::SupplementalFailed {
                    call: "project_name",
                    message: err.to_string(),
                });
                String::new()
            }
        }
    }

    /// `model id -> model name` for `model_ids`.
    ///
    /// Starts from the loaded-model listing and asks for each model still missing a
    /// name individually. Models nobody can name are left out.
    pub async fn build_model_name_map(&self, model_ids: &[String]) -> HashMap<String, String> {
        let mut names = HashMap::new();
        match self.provider.loaded_models().await {
            Ok(models) => {
                for model in models {
                    if let Some(name) = model.name.filter(|n| !n.trim().is_empty()) {
                        names.insert(model.id, name);
                    }
                }
            }
            Err(err) => self.events.emit(PipelineEvent::SupplementalFailed {
                call: "loaded_models",
                message: err.to_string(),
            }),
        }

        let mut missing: Vec<&String> = Vec::new();
        for id in model_ids {
            if !names.contains_key(id) && !missing.contains(&id) {
                missing.push(id);
            }
        }
        let lookups = missing.iter().map(|id| self.provider.loaded_model(id));
        for (id, result) in missing.iter().zip(join_all(lookups).await) {
            match result {
                Ok(model) => {
                    if let Some(name) = model.name.filter(|n| !n.trim().is_empty()) {
                        names.insert((*id).clone(), name);
                    }
                }
                Err(err) => self.events.emit(PipelineEvent::SupplementalFailed {
                    call: "loaded_model",
                    message: err.to_string(),
                }),
            }
        }
        names
    }

    fn step_failed(&self, step: &'static str, model_id: &str, message: String) {
        self.events.emit(PipelineEvent::EnrichmentFailed {
            step,
            model_id: model_id.to_string(),
            message,
        });
    }
}

fn dedup_layers(layers: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(layers.len());
    for layer in layers {
        let layer = layer.trim().to_string();
        if !layer.is_empty() && !out.contains(&layer) {
            out.push(layer);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ProviderSnapshot, SnapshotProvider};
    use propmark_model::MemorySink;
    use serde_json::json;

    fn snapshot() -> ProviderSnapshot {
        serde_json::from_value(json!({
            "projectName": "Harbour Bridge",
            "models": [
                { "id": "m1", "name": "frame.ifc", "objects": [
                    { "id": 1, "metadata": { "globalId": "0YvctVUKr0kugbFTf53O9L", "file": "frame.ifc" },
                      "layers": ["Steel", " Steel", "Beams"], "externalId": "0YvctVUKr0kugbFTf53O9L" },
                    { "id": 2 }
                ]},
                { "id": "m2", "listed": false, "name": "slabs.ifc", "objects": [] }
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn lookups_align_with_requested_ids() {
        let events = MemorySink::new();
        let fetcher =
            SupplementalDataFetcher::new(Arc::new(SnapshotProvider::new(snapshot())), events.clone());

        let info = fetcher.fetch_reference_info("m1", &[1, 2]).await;
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].as_ref().and_then(|m| m.file.as_deref()), Some("frame.ifc"));
        assert_eq!(info[1], Some(ObjectMetadata::default()));

        let layers = fetcher.fetch_presentation_layers("m1", &[1, 2]).await;
        assert_eq!(layers[0], Some(vec!["Steel".to_string(), "Beams".to_string()]));
        assert_eq!(layers[1], Some(vec![]));

        let external = fetcher.fetch_external_ids("m1", &[1, 2]).await;
        assert_eq!(external, vec![Some("0YvctVUKr0kugbFTf53O9L".to_string()), None]);
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn failures_degrade_to_empty_and_are_reported() {
        let events = MemorySink::new();
        let provider = SnapshotProvider::new(snapshot())
            .fail_call("object_metadata")
            .fail_call("project_name");
        let fetcher = SupplementalDataFetcher::new(Arc::new(provider), events.clone());

        assert_eq!(fetcher.fetch_reference_info("m1", &[1]).await, vec![None]);
        assert_eq!(fetcher.fetch_project_name().await, "");
        let events = events.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            PipelineEvent::EnrichmentFailed { step: "reference_info", model_id, .. } if model_id == "m1"
        ));
    }

    #[tokio::test]
    async fn model_names_fall_back_to_single_lookup() {
        let fetcher = SupplementalDataFetcher::new(
            Arc::new(SnapshotProvider::new(snapshot())),
            MemorySink::new(),
        );
        let names = fetcher
            .build_model_name_map(&["m1".to_string(), "m2".to_string(), "m9".to_string()])
            .await;
        assert_eq!(names.get("m1").map(String::as_str), Some("frame.ifc"));
        assert_eq!(names.get("m2").map(String::as_str), Some("slabs.ifc"));
        assert!(!names.contains_key("m9"));
    }
}
