//! Provider enrichment steps.
//!
//! Three independent lookups, each gated by a "needed?" predicate on the locally
//! flattened record. Per model, each step is issued once for all objects that need it
//! and the three steps run concurrently. Results are merged by
//! [`PropertyFlattener::apply_enrichment`](crate::PropertyFlattener::apply_enrichment).

use propmark_model::{keys, EnrichmentToggles, FlattenedRecord, ObjectId};
use propmark_provider::{ObjectMetadata, SupplementalDataFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStep {
    ReferenceInfo,
    PresentationLayers,
    ExternalIds,
}

impl EnrichmentStep {
    pub const ALL: [EnrichmentStep; 3] = [
        EnrichmentStep::ReferenceInfo,
        EnrichmentStep::PresentationLayers,
        EnrichmentStep::ExternalIds,
    ];

    pub fn enabled(self, toggles: EnrichmentToggles) -> bool {
        match self {
            EnrichmentStep::ReferenceInfo => toggles.reference_info,
            EnrichmentStep::PresentationLayers => toggles.presentation_layers,
            EnrichmentStep::ExternalIds => toggles.external_ids,
        }
    }

    /// Whether the step could still fill something in `record`.
    pub fn needed(self, record: &FlattenedRecord) -> bool {
        let blank = |key| record.non_empty(key).is_none();
        match self {
            EnrichmentStep::ReferenceInfo => {
                blank(keys::GUID_IFC)
                    || blank(keys::GUID_MS)
                    || blank(keys::FILE_NAME)
                    || record.non_empty(keys::TYPE).map_or(true, |t| t == keys::UNKNOWN_TYPE)
            }
            EnrichmentStep::PresentationLayers => blank(keys::PRESENTATION_LAYERS),
            EnrichmentStep::ExternalIds => blank(keys::GUID_IFC),
        }
    }
}

/// Lookup results for one object. `None` means not requested or nothing returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub reference: Option<ObjectMetadata>,
    pub layers: Option<Vec<String>>,
    pub external_id: Option<String>,
}

pub struct Enricher<'a> {
    fetcher: &'a SupplementalDataFetcher,
    toggles: EnrichmentToggles,
}

impl<'a> Enricher<'a> {
    pub fn new(fetcher: &'a SupplementalDataFetcher, toggles: EnrichmentToggles) -> Self {
        Self { fetcher, toggles }
    }

    /// Enrich the objects of one model. The result is aligned with `objects`.
    pub async fn enrich_model(
        &self,
        model_id: &str,
        objects: &[(ObjectId, &FlattenedRecord)],
    ) -> Vec<Enrichment> {
        let mut out = vec![Enrichment::default(); objects.len()];
        if objects.is_empty() || !self.toggles.any() {
            return out;
        }

        let reference = self.wanted(EnrichmentStep::ReferenceInfo, objects);
        let layers = self.wanted(EnrichmentStep::PresentationLayers, objects);
        let external = self.wanted(EnrichmentStep::ExternalIds, objects);

        let reference_ids = ids(objects, &reference);
        let layer_ids = ids(objects, &layers);
        let external_ids = ids(objects, &external);
        let (reference_res, layers_res, external_res) = futures::join!(
            self.fetcher.fetch_reference_info(model_id, &reference_ids),
            self.fetcher.fetch_presentation_layers(model_id, &layer_ids),
            self.fetcher.fetch_external_ids(model_id, &external_ids),
        );

        for (idx, value) in reference.into_iter().zip(reference_res) {
            out[idx].reference = value;
        }
        for (idx, value) in layers.into_iter().zip(layers_res) {
            out[idx].layers = value;
        }
        for (idx, value) in external.into_iter().zip(external_res) {
            out[idx].external_id = value;
        }
        out
    }

    /// Positions in `objects` the step should be issued for.
    fn wanted(&self, step: EnrichmentStep, objects: &[(ObjectId, &FlattenedRecord)]) -> Vec<usize> {
        if !step.enabled(self.toggles) {
            return Vec::new();
        }
        objects
            .iter()
            .enumerate()
            .filter(|(_, (_, record))| step.needed(record))
            .map(|(idx, _)| idx)
            .collect()
    }
}

fn ids(objects: &[(ObjectId, &FlattenedRecord)], positions: &[usize]) -> Vec<ObjectId> {
    positions.iter().map(|&idx| objects[idx].0).collect()
}
