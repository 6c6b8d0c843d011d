//! MarkupApplier: composed text → markups in the viewer.
//!
//! Each pass first removes the markups the previous pass created, then creates one
//! markup per object with text. Creation runs concurrently and a failed object is
//! reported without stopping the others. The ids a pass created become the "previous"
//! set of the next pass.

use futures::future::join_all;
use parking_lot::Mutex;
use propmark_model::{
    EventSink, InFlight, MarkupId, MarkupResult, MarkupStatus, ObjectId, PipelineError,
    PipelineEvent, Position,
};
use propmark_provider::{Anchor, BoundingBox, MarkupRequest, Vector3, ViewerProvider};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// One object and the text composed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupTarget {
    pub model_id: String,
    pub object_id: ObjectId,
    pub result: MarkupResult,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// `(object, markup)` pairs created by this pass.
    pub created: Vec<(ObjectId, MarkupId)>,
    pub failed: Vec<(ObjectId, String)>,
    /// Objects without text.
    pub skipped: usize,
    /// Markups of the previous pass that were removed.
    pub removed: usize,
    /// Input results with their final status, in input order.
    pub results: Vec<MarkupResult>,
}

impl ApplyReport {
    /// "Markup applied to K objects"
    pub fn summary(&self) -> String {
        format!("Markup applied to {} objects", self.created.len())
    }

    /// Per-object failures as errors.
    pub fn errors(&self) -> Vec<PipelineError> {
        self.failed
            .iter()
            .map(|(object_id, message)| PipelineError::PerObjectMarkup {
                object_id: *object_id,
                message: message.clone(),
            })
            .collect()
    }
}

/// Anchor placement settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorSettings {
    pub position: Position,
    /// Model units to markup units.
    pub scale: f64,
}

impl Default for AnchorSettings {
    fn default() -> Self {
        Self {
            position: Position::Center,
            scale: 1000.0,
        }
    }
}

impl AnchorSettings {
    pub fn anchor_for(&self, bbox: &BoundingBox) -> Anchor {
        let mid = bbox.midpoint();
        let at = match self.position {
            Position::Center => mid,
            Position::Top => Vector3::new(mid.x, mid.y, bbox.max.z),
        };
        Anchor::point(at.scale(self.scale))
    }
}

pub struct MarkupApplier {
    provider: Arc<dyn ViewerProvider>,
    events: Arc<dyn EventSink>,
    previous: Mutex<Vec<MarkupId>>,
    in_flight: AtomicBool,
}

impl MarkupApplier {
    pub fn new(provider: Arc<dyn ViewerProvider>, events: Arc<dyn EventSink>) -> Self {
        Self {
            provider,
            events,
            previous: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Markups created by the last pass, plus any the last removal could not delete.
    pub fn previous(&self) -> Vec<MarkupId> {
        self.previous.lock().clone()
    }

    pub async fn apply(
        &self,
        targets: &[MarkupTarget],
        anchors: AnchorSettings,
    ) -> Result<ApplyReport, PipelineError> {
        let _guard = InFlight::acquire(&self.in_flight).ok_or(PipelineError::Busy("apply"))?;

        let mut report = ApplyReport {
            results: targets.iter().map(|t| t.result.clone()).collect(),
            ..ApplyReport::default()
        };
        let leftover = self.remove_previous(&mut report).await;

        let mut live = Vec::with_capacity(targets.len());
        for (idx, target) in targets.iter().enumerate() {
            if target.result.status != MarkupStatus::NotFound && !target.result.text.is_empty() {
                live.push(idx);
                continue;
            }
            report.skipped += 1;
            report.results[idx].status = MarkupStatus::NotFound;
            self.events.emit(PipelineEvent::ObjectSkipped {
                object_id: target.object_id,
            });
        }

        let boxes = self.bounding_boxes(targets, &live).await;
        let requests = live.iter().map(|&idx| {
            let target = &targets[idx];
            let anchor = boxes
                .get(&(target.model_id.as_str(), target.object_id))
                .map(|bbox| anchors.anchor_for(bbox));
            self.provider.create_markup(MarkupRequest {
                text: target.result.text.clone(),
                model_id: target.model_id.clone(),
                object_id: target.object_id,
                anchor,
            })
        });
        let outcomes = join_all(requests).await;

        for (&idx, outcome) in live.iter().zip(outcomes) {
            let object_id = targets[idx].object_id;
            match outcome {
                Ok(markup_id) => {
                    report.created.push((object_id, markup_id));
                    report.results[idx].status = MarkupStatus::Found;
                    self.events.emit(PipelineEvent::MarkupCreated {
                        object_id,
                        markup_id,
                    });
                }
                Err(err) => {
                    report.failed.push((object_id, err.to_string()));
                    report.results[idx].status = MarkupStatus::Partial;
                    self.events.emit(PipelineEvent::MarkupFailed {
                        object_id,
                        message: err.to_string(),
                    });
                }
            }
        }

        let mut next: Vec<MarkupId> = report.created.iter().map(|(_, id)| *id).collect();
        next.extend(leftover);
        *self.previous.lock() = next;

        self.events.emit(PipelineEvent::ApplyFinished {
            created: report.created.len(),
            failed: report.failed.len(),
            skipped: report.skipped,
        });
        Ok(report)
    }

    /// Remove the previous pass's markups. Returns the ids still present afterwards.
    async fn remove_previous(&self, report: &mut ApplyReport) -> Vec<MarkupId> {
        let previous = self.previous.lock().clone();
        if previous.is_empty() {
            return Vec::new();
        }
        match self.provider.remove_markups(&previous).await {
            Ok(()) => {
                report.removed = previous.len();
                self.events.emit(PipelineEvent::MarkupsRemoved {
                    count: previous.len(),
                });
                Vec::new()
            }
            Err(err) => {
                self.events.emit(PipelineEvent::MarkupRemovalFailed {
                    count: previous.len(),
                    message: err.to_string(),
                });
                previous
            }
        }
    }

    /// Bounding boxes of the live targets, fetched once per model.
    async fn bounding_boxes<'t>(
        &self,
        targets: &'t [MarkupTarget],
        live: &[usize],
    ) -> HashMap<(&'t str, ObjectId), BoundingBox> {
        let mut by_model: Vec<(&'t str, Vec<ObjectId>)> = Vec::new();
        for &idx in live {
            let target = &targets[idx];
            match by_model.iter_mut().find(|(m, _)| *m == target.model_id) {
                Some((_, ids)) => ids.push(target.object_id),
                None => by_model.push((target.model_id.as_str(), vec![target.object_id])),
            }
        }

        let lookups = by_model
            .iter()
            .map(|(model_id, ids)| self.provider.bounding_boxes(model_id, ids));
        let mut boxes = HashMap::new();
        for ((model_id, _), result) in by_model.iter().zip(join_all(lookups).await) {
            match result {
                Ok(found) => {
                    for item in found {
                        boxes.insert((*model_id, item.object_id), item.bounding_box);
                    }
                }
                Err(err) => self.events.emit(PipelineEvent::AnchorUnavailable {
                    model_id: model_id.to_string(),
                    message: err.to_string(),
                }),
            }
        }
        boxes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propmark_model::MemorySink;
    use propmark_provider::{ProviderSnapshot, SnapshotProvider};
    use serde_json::json;

    fn snapshot(with_boxes: bool) -> ProviderSnapshot {
        let bbox = if with_boxes {
            json!({ "min": { "x": 0.0, "y": 0.0, "z": 0.0 }, "max": { "x": 2.0, "y": 4.0, "z": 6.0 } })
        } else {
            json!(null)
        };
        serde_json::from_value(json!({
            "models": [{ "id": "m1", "objects": [
                { "id": 1, "boundingBox": bbox },
                { "id": 2 },
                { "id": 3 }
            ]}]
        }))
        .unwrap()
    }

    fn target(object_id: ObjectId, text: &str) -> MarkupTarget {
        let status = if text.is_empty() {
            MarkupStatus::NotFound
        } else {
            MarkupStatus::Found
        };
        MarkupTarget {
            model_id: "m1".into(),
            object_id,
            result: MarkupResult::new(text, status),
        }
    }

    #[test]
    fn anchor_positions() {
        let bbox = BoundingBox {
            min: Vector3::new(0.0, 0.0, 0.0),
            max: Vector3::new(2.0, 4.0, 6.0),
        };
        let center = AnchorSettings::default().anchor_for(&bbox);
        assert_eq!(center, Anchor::point(Vector3::new(1000.0, 2000.0, 3000.0)));
        let top = AnchorSettings {
            position: Position::Top,
            scale: 1.0,
        }
        .anchor_for(&bbox);
        assert_eq!(top.start, Vector3::new(1.0, 2.0, 6.0));
        assert_eq!(top.start, top.end);
    }

    #[tokio::test]
    async fn creates_markups_with_anchors_and_skips_empty() {
        let provider = Arc::new(SnapshotProvider::new(snapshot(true)));
        let events = MemorySink::new();
        let applier = MarkupApplier::new(provider.clone(), events.clone());

        let report = applier
            .apply(&[target(1, "B1"), target(2, ""), target(3, "B3")], AnchorSettings::default())
            .await
            .unwrap();

        assert_eq!(report.created.len(), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.summary(), "Markup applied to 2 objects");
        let markups = provider.markups();
        assert_eq!(markups.len(), 2);
        let first = &markups[0].1;
        assert_eq!(first.object_id, 1);
        assert_eq!(first.anchor, Some(Anchor::point(Vector3::new(1000.0, 2000.0, 3000.0))));
        assert_eq!(markups[1].1.anchor, None);
        assert_eq!(applier.previous().len(), 2);
        assert!(events
            .events()
            .contains(&PipelineEvent::ObjectSkipped { object_id: 2 }));
    }

    #[tokio::test]
    async fn skipped_targets_keep_result_alignment() {
        let provider = Arc::new(SnapshotProvider::new(snapshot(false)));
        let applier = MarkupApplier::new(provider, MemorySink::new());

        let report = applier
            .apply(&[target(1, ""), target(2, "B2"), target(3, "B3")], AnchorSettings::default())
            .await
            .unwrap();

        let statuses: Vec<_> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            [MarkupStatus::NotFound, MarkupStatus::Found, MarkupStatus::Found]
        );
        assert_eq!(report.skipped, 1);
        assert_eq!(report.created.iter().map(|(id, _)| *id).collect::<Vec<_>>(), [2, 3]);
    }

    #[tokio::test]
    async fn reapply_replaces_previous_markups() {
        let provider = Arc::new(SnapshotProvider::new(snapshot(false)));
        let events = MemorySink::new();
        let applier = MarkupApplier::new(provider.clone(), events.clone());
        let targets = [target(1, "B1"), target(3, "B3")];

        let first = applier.apply(&targets, AnchorSettings::default()).await.unwrap();
        let second = applier.apply(&targets, AnchorSettings::default()).await.unwrap();

        assert_eq!(second.removed, 2);
        assert_eq!(provider.markups().len(), 2);
        let mut removed = provider.removed();
        removed.sort_unstable();
        let mut first_ids: Vec<_> = first.created.iter().map(|(_, id)| *id).collect();
        first_ids.sort_unstable();
        assert_eq!(removed, first_ids);
        assert!(events.events().iter().any(|e| matches!(
            e,
            PipelineEvent::AnchorUnavailable { model_id, .. } if model_id == "m1"
        )));
    }

    #[tokio::test]
    async fn failed_object_does_not_stop_the_batch() {
        let provider = Arc::new(SnapshotProvider::new(snapshot(false)).fail_markup_for(3));
        let applier = MarkupApplier::new(provider.clone(), MemorySink::new());
        let report = applier
            .apply(&[target(1, "B1"), target(3, "B3")], AnchorSettings::default())
            .await
            .unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.results[1].status, MarkupStatus::Partial);
        assert!(matches!(
            report.errors()[0],
            PipelineError::PerObjectMarkup { object_id: 3, .. }
        ));
    }

    #[tokio::test]
    async fn failed_removal_is_retried_next_pass() {
        let provider = Arc::new(SnapshotProvider::new(snapshot(false)).fail_call("remove_markups"));
        let applier = MarkupApplier::new(provider.clone(), MemorySink::new());
        let targets = [target(1, "B1")];
        applier.apply(&targets, AnchorSettings::default()).await.unwrap();
        let second = applier.apply(&targets, AnchorSettings::default()).await.unwrap();
        assert_eq!(second.removed, 0);
        assert_eq!(applier.previous().len(), 2);
    }

    #[tokio::test]
    async fn overlapping_apply_is_rejected() {
        let provider = Arc::new(SnapshotProvider::new(snapshot(false)));
        let applier = MarkupApplier::new(provider.clone(), MemorySink::new());
        let targets = [target(1, "B1")];
        let (first, second) = tokio::join!(
            applier.apply(&targets, AnchorSettings::default()),
            applier.apply(&targets, AnchorSettings::default())
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(PipelineError::Busy("apply"))));
        assert_eq!(provider.markups().len(), 1);
    }
}
