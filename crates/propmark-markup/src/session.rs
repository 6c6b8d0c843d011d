//! End-to-end session: selection → discovery → composition → markups → summary.

use crate::applier::{AnchorSettings, ApplyReport, MarkupApplier, MarkupTarget};
use crate::composer::MarkupComposer;
use crate::condenser::{condense, CondensedSummary};
use crate::sink::SummarySink;
use propmark_discovery::{DiscoveryOutcome, FieldDiscoveryEngine, PropertyFlattener};
use propmark_model::{
    DiscoveredField, EventSink, FieldSelection, MarkupConfig, PipelineConfig, PipelineError,
    PipelineEvent, SinkError,
};
use propmark_provider::{load_selection, PropertyQuery, SupplementalDataFetcher, ViewerProvider};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub outcome: Arc<DiscoveryOutcome>,
    /// Fields offered for selection.
    pub selectable: Vec<DiscoveredField>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ApplySummary {
    pub report: ApplyReport,
    pub condensed: CondensedSummary,
    pub message: String,
}

struct Connected {
    provider: Arc<dyn ViewerProvider>,
    fetcher: SupplementalDataFetcher,
    applier: MarkupApplier,
}

pub struct MarkupSession {
    connected: Option<Connected>,
    config: PipelineConfig,
    events: Arc<dyn EventSink>,
    engine: FieldDiscoveryEngine,
}

impl MarkupSession {
    /// `provider` is `None` when the viewer connection is missing; every pass then
    /// fails with [`PipelineError::ProviderUnavailable`].
    pub fn new(
        provider: Option<Arc<dyn ViewerProvider>>,
        config: PipelineConfig,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, PipelineError> {
        let engine = FieldDiscoveryEngine::new(
            PropertyFlattener::new()?,
            config.discovery.clone(),
            config.enrichment,
            events.clone(),
        );
        let connected = provider.map(|provider| Connected {
            fetcher: SupplementalDataFetcher::new(provider.clone(), events.clone()),
            applier: MarkupApplier::new(provider.clone(), events.clone()),
            provider,
        });
        Ok(Self {
            connected,
            config,
            events,
            engine,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine(&self) -> &FieldDiscoveryEngine {
        &self.engine
    }

    /// The viewer selection changed; results of a running discovery pass are dropped.
    pub fn selection_changed(&self) {
        self.engine.invalidate();
    }

    /// Discover fields over the current viewer selection.
    pub async fn discover(&self) -> Result<DiscoveryReport, PipelineError> {
        let connected = self.connected()?;
        let query = PropertyQuery {
            include_hidden: self.config.include_hidden,
        };
        let records =
            load_selection(connected.provider.as_ref(), query, self.events.as_ref()).await?;
        let outcome = self.engine.discover(&connected.fetcher, &records).await?;
        let selectable = self.engine.selectable_fields(&outcome.fields);
        let message = outcome.summary();
        tracing::debug!(
            generation = outcome.generation,
            selectable = selectable.len(),
            "field list ready"
        );
        Ok(DiscoveryReport {
            outcome,
            selectable,
            message,
        })
    }

    /// Compose one target per flattened object.
    pub fn compose(
        &self,
        outcome: &DiscoveryOutcome,
        selection: &FieldSelection,
        markup: &MarkupConfig,
    ) -> Vec<MarkupTarget> {
        let composer = MarkupComposer::new(selection.clone(), markup.clone());
        let mut targets = Vec::with_capacity(outcome.objects.len());
        for object in &outcome.objects {
            let Some(object_id) = object.object_id else {
                continue;
            };
            targets.push(MarkupTarget {
                model_id: object.model_id.clone(),
                object_id,
                result: composer.compose(&object.record),
            });
        }
        targets
    }

    /// Label the selected objects with `selection`, replacing the previous labels.
    ///
    /// Reuses the last published discovery outcome, or runs discovery first.
    pub async fn apply(
        &self,
        selection: &FieldSelection,
        markup: &MarkupConfig,
    ) -> Result<ApplySummary, PipelineError> {
        let connected = self.connected()?;
        let outcome = match self.engine.current() {
            Some(outcome) => outcome,
            None => self.discover().await?.outcome,
        };
        let targets = self.compose(&outcome, selection, markup);
        let anchors = AnchorSettings {
            position: markup.position,
            scale: self.config.anchor_scale,
        };
        let report = connected.applier.apply(&targets, anchors).await?;
        let condensed = condense(&report.results);
        let message = report.summary();
        Ok(ApplySummary {
            report,
            condensed,
            message,
        })
    }

    /// Hand the condensed summary to `sink`. Failure is reported and returned.
    pub fn write_summary(
        &self,
        summary: &CondensedSummary,
        sink: &dyn SummarySink,
    ) -> Result<(), SinkError> {
        match sink.write_summary(&summary.render()) {
            Ok(()) => {
                self.events.emit(PipelineEvent::SummaryWritten {
                    groups: summary.len(),
                });
                Ok(())
            }
            Err(err) => {
                self.events.emit(PipelineEvent::SummaryFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn connected(&self) -> Result<&Connected, PipelineError> {
        self.connected
            .as_ref()
            .ok_or(PipelineError::ProviderUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{FileSink, WriterSink};
    use propmark_model::MemorySink;
    use propmark_provider::SnapshotProvider;
    use serde_json::json;

    fn provider() -> Arc<dyn ViewerProvider> {
        let snapshot = serde_json::from_value(json!({
            "models": [{ "id": "m1", "name": "frame.ifc", "objects": [
                { "id": 1, "record": { "name": "B1", "type": "IfcBeam" } },
                { "id": 2, "record": { "name": "B2", "type": "IfcBeam" } },
                { "id": 3, "record": {} }
            ]}]
        }))
        .unwrap();
        Arc::new(SnapshotProvider::new(snapshot))
    }

    #[tokio::test]
    async fn missing_provider_fails_fast() {
        let session = MarkupSession::new(None, PipelineConfig::default(), MemorySink::new()).unwrap();
        assert!(matches!(
            session.discover().await,
            Err(PipelineError::ProviderUnavailable)
        ));
        assert!(matches!(
            session
                .apply(&FieldSelection::new(["Name"]), &MarkupConfig::default())
                .await,
            Err(PipelineError::ProviderUnavailable)
        ));
    }

    #[tokio::test]
    async fn apply_runs_discovery_when_needed() {
        let session =
            MarkupSession::new(Some(provider()), PipelineConfig::default(), MemorySink::new())
                .unwrap();
        let summary = session
            .apply(&FieldSelection::new(["Type"]), &MarkupConfig::default())
            .await
            .unwrap();

        // object 3 has Type "Unknown"
        assert_eq!(summary.message, "Markup applied to 3 objects");
        assert_eq!(summary.condensed.render(), "IfcBeam - 2tk\nUnknown - 1tk");
        assert!(session.engine().current().is_some());
    }

    #[tokio::test]
    async fn discovery_report_offers_selectable_fields() {
        let session =
            MarkupSession::new(Some(provider()), PipelineConfig::default(), MemorySink::new()).unwrap();
        let report = session.discover().await.unwrap();
        assert!(report.message.ends_with("fields discovered from 3 objects"));
        assert!(report.selectable.iter().all(|f| f.key != "ObjectId"));
        let keys: Vec<_> = report.selectable.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["Type", "Name", "GUID", "GUID_IFC", "GUID_MS"]);
    }

    #[test]
    fn summary_sink_results_are_reported() {
        let events = MemorySink::new();
        let session = MarkupSession::new(None, PipelineConfig::default(), events.clone()).unwrap();
        let summary = condense(&[propmark_model::MarkupResult::new(
            "A",
            propmark_model::MarkupStatus::Found,
        )]);

        let writer = WriterSink::new(Vec::new());
        session.write_summary(&summary, &writer).unwrap();
        let bad = FileSink::new("/nonexistent-dir/summary.txt");
        assert!(session.write_summary(&summary, &bad).is_err());

        let events = events.events();
        assert_eq!(events[0], PipelineEvent::SummaryWritten { groups: 1 });
        assert!(matches!(events[1], PipelineEvent::SummaryFailed { .. }));
    }
}
