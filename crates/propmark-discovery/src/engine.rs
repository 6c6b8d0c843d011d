//! FieldDiscoveryEngine: selection → ranked candidate fields.
//!
//! A pass flattens every selected record, enriches them per model, and aggregates key
//! statistics across the batch. One pass may run at a time per engine. Every pass gets a
//! generation number; [`FieldDiscoveryEngine::invalidate`] bumps it so a pass that is
//! still running when the selection changes finishes without publishing.

use crate::enrich::Enricher;
use crate::flatten::{FlattenContext, PropertyFlattener};
use futures::future::join_all;
use indexmap::IndexMap;
use parking_lot::Mutex;
use propmark_model::field::frequency_percent;
use propmark_model::{
    DiscoveredField, DiscoveryConfig, EnrichmentToggles, EventSink, FlattenedRecord, InFlight,
    ObjectId, PipelineError, PipelineEvent,
};
use propmark_provider::{SelectedRecord, SupplementalDataFetcher};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// One flattened object of a discovery pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedObject {
    pub model_id: String,
    pub object_id: Option<ObjectId>,
    pub record: FlattenedRecord,
}

/// Result of a discovery pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOutcome {
    pub generation: u64,
    /// In selection order.
    pub objects: Vec<FlattenedObject>,
    /// Every key seen, ranked by frequency.
    pub fields: Vec<DiscoveredField>,
}

impl DiscoveryOutcome {
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// "N fields discovered from M objects"
    pub fn summary(&self) -> String {
        format!(
            "{} fields discovered from {} objects",
            self.fields.len(),
            self.objects.len()
        )
    }
}

pub struct FieldDiscoveryEngine {
    flattener: PropertyFlattener,
    config: DiscoveryConfig,
    toggles: EnrichmentToggles,
    events: Arc<dyn EventSink>,
    in_flight: AtomicBool,
    generation: AtomicU64,
    current: Mutex<Option<Arc<DiscoveryOutcome>>>,
}

impl FieldDiscoveryEngine {
    pub fn new(
        flattener: PropertyFlattener,
        config: DiscoveryConfig,
        toggles: EnrichmentToggles,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            flattener,
            config,
            toggles,
            events,
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// Run one discovery pass over `records`.
    ///
    /// Returns [`PipelineError::Busy`] if a pass is already running. A pass superseded
    /// by [`invalidate`](Self::invalidate) still returns its outcome, but it is not
    /// published to [`current`](Self::current).
    pub async fn discover(
        &self,
        fetcher: &SupplementalDataFetcher,
        records: &[SelectedRecord],
    ) -> Result<Arc<DiscoveryOutcome>, PipelineError> {
        let _guard = InFlight::acquire(&self.in_flight).ok_or(PipelineError::Busy("discovery"))?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.emit(PipelineEvent::DiscoveryStarted {
            generation,
            objects: records.len(),
        });

        let objects = self.flatten_all(fetcher, records).await;
        let flat: Vec<&FlattenedRecord> = objects.iter().map(|o| &o.record).collect();
        let fields = aggregate(&flat, self.config.max_samples);
        let outcome = Arc::new(DiscoveryOutcome {
            generation,
            objects,
            fields,
        });

        if self.generation.load(Ordering::SeqCst) != generation {
            self.events.emit(PipelineEvent::DiscoveryStale { generation });
            return Ok(outcome);
        }
        self.events.emit(PipelineEvent::DiscoveryFinished {
            generation,
            objects: outcome.objects.len(),
            fields: outcome.fields.len(),
        });
        *self.current.lock() = Some(outcome.clone());
        Ok(outcome)
    }

    /// Mark any running pass as stale and drop the published outcome.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.current.lock() = None;
    }

    /// Outcome of the latest pass that was not superseded.
    pub fn current(&self) -> Option<Arc<DiscoveryOutcome>> {
        self.current.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// The list offered for selection: denylisted keys removed, top `top_n`, and the
    /// default fields when nothing qualifies.
    pub fn selectable_fields(&self, fields: &[DiscoveredField]) -> Vec<DiscoveredField> {
        let selectable: Vec<DiscoveredField> = fields
            .iter()
            .filter(|f| !self.config.denylist.iter().any(|d| d == &f.key))
            .take(self.config.top_n)
            .cloned()
            .collect();
        if !selectable.is_empty() {
            return selectable;
        }
        self.events.emit(PipelineEvent::FallbackFields {
            count: self.config.default_fields.len(),
        });
        self.config
            .default_fields
            .iter()
            .map(|key| DiscoveredField::new(key))
            .collect()
    }

    async fn flatten_all(
        &self,
        fetcher: &SupplementalDataFetcher,
        records: &[SelectedRecord],
    ) -> Vec<FlattenedObject> {
        if records.is_empty() {
            return Vec::new();
        }

        let mut model_ids: Vec<String> = Vec::new();
        for r in records {
            if !model_ids.contains(&r.model_id) {
                model_ids.push(r.model_id.clone());
            }
        }
        let (project_name, model_names) = futures::join!(
            fetcher.fetch_project_name(),
            fetcher.build_model_name_map(&model_ids)
        );

        let passes = model_ids.iter().map(|model_id| {
            self.flatten_model(fetcher, model_id, &project_name, &model_names, records)
        });
        let mut by_position: Vec<(usize, FlattenedObject)> =
            join_all(passes).await.into_iter().flatten().collect();
        by_position.sort_by_key(|(idx, _)| *idx);
        by_position.into_iter().map(|(_, object)| object).collect()
    }

    /// Flatten and enrich the records of one model; keeps each record's input position.
    async fn flatten_model(
        &self,
        fetcher: &SupplementalDataFetcher,
        model_id: &str,
        project_name: &str,
        model_names: &HashMap<String, String>,
        records: &[SelectedRecord],
    ) -> Vec<(usize, FlattenedObject)> {
        let ctx = FlattenContext {
            model_id,
            project_name,
            model_names,
        };
        let mut local: Vec<(usize, FlattenedObject)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.model_id == model_id)
            .map(|(idx, r)| {
                let record = self.flattener.flatten_local(&r.record, &ctx);
                let object = FlattenedObject {
                    model_id: model_id.to_string(),
                    object_id: r.record.id,
                    record,
                };
                (idx, object)
            })
            .collect();

        let targets: Vec<(usize, ObjectId)> = local
            .iter()
            .enumerate()
            .filter_map(|(pos, (_, o))| o.object_id.map(|id| (pos, id)))
            .collect();
        let enrichment = {
            let batch: Vec<(ObjectId, &FlattenedRecord)> = targets
                .iter()
                .map(|&(pos, id)| (id, &local[pos].1.record))
                .collect();
            Enricher::new(fetcher, self.toggles)
                .enrich_model(model_id, &batch)
                .await
        };
        tracing::debug!(
            model_id,
            objects = local.len(),
            enriched = targets.len(),
            "model flattened"
        );
        for ((pos, _), found) in targets.into_iter().zip(enrichment) {
            self.flattener
                .apply_enrichment(&mut local[pos].1.record, &found);
        }
        local
    }
}

/// Aggregate key statistics over flattened records.
///
/// Keys appear in first-seen order, then a stable sort ranks them by frequency.
pub fn aggregate(records: &[&FlattenedRecord], max_samples: usize) -> Vec<DiscoveredField> {
    let mut stats: IndexMap<&str, DiscoveredField> = IndexMap::new();
    for record in records {
        for (key, value) in record.iter() {
            let field = stats.entry(key).or_insert_with(|| match record.origin(key) {
                Some(origin) => {
                    DiscoveredField::with_origin(key, &origin.set_name, &origin.property_name)
                }
                None => DiscoveredField::new(key),
            });
            field.occurrences += 1;
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            field.objects_with_value += 1;
            if field.value_samples.len() < max_samples
                && !field.value_samples.iter().any(|s| s == value)
            {
                field.value_samples.push(value.to_string());
            }
        }
    }

    let total = records.len();
    let mut fields: Vec<DiscoveredField> = stats
        .into_values()
        .map(|mut f| {
            f.frequency = frequency_percent(f.objects_with_value, total);
            f
        })
        .collect();
    fields.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    fields
}
