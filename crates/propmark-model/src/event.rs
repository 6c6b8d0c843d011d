//! Injected event sink.
//!
//! Components never log through a global; they receive an `Arc<dyn EventSink>` and
//! emit typed [`PipelineEvent`]s. [`TracingSink`] forwards to `tracing`,
//! [`MemorySink`] keeps events in order for tests.

use crate::field::MarkupId;
use crate::raw::ObjectId;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PipelineEvent {
    SelectionLoaded {
        models: usize,
        objects: usize,
    },
    PropertyFetchFailed {
        model_id: String,
        message: String,
    },
    /// Project name or model-name lookup failed; processing continued without it.
    SupplementalFailed {
        call: &'static str,
        message: String,
    },
    EnrichmentFailed {
        step: &'static str,
        model_id: String,
        message: String,
    },
    DiscoveryStarted {
        generation: u64,
        objects: usize,
    },
    DiscoveryFinished {
        generation: u64,
        objects: usize,
        fields: usize,
    },
    /// A pass finished after being superseded; its result was dropped.
    DiscoveryStale {
        generation: u64,
    },
    FallbackFields {
        count: usize,
    },
    ObjectSkipped {
        object_id: ObjectId,
    },
    AnchorUnavailable {
        model_id: String,
        message: String,
    },
    MarkupsRemoved {
        count: usize,
    },
    MarkupRemovalFailed {
        count: usize,
        message: String,
    },
    MarkupCreated {
        object_id: ObjectId,
        markup_id: MarkupId,
    },
    MarkupFailed {
        object_id: ObjectId,
        message: String,
    },
    ApplyFinished {
        created: usize,
        failed: usize,
        skipped: usize,
    },
    SummaryWritten {
        groups: usize,
    },
    SummaryFailed {
        message: String,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Forwards events to the `tracing` dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn shared() -> Arc<dyn EventSink> {
        Arc::new(Self)
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        use PipelineEvent::*;
        match event {
            SelectionLoaded { models, objects } => {
                tracing::info!(models, objects, "selection loaded")
            }
            PropertyFetchFailed { model_id, message } => {
                tracing::warn!(model_id = %model_id, error = %message, "property fetch failed")
            }
            SupplementalFailed { call, message } => {
                tracing::warn!(call, error = %message, "supplemental lookup failed")
            }
            EnrichmentFailed {
                step,
                model_id,
                message,
            } => tracing::debug!(step, model_id = %model_id, error = %message, "enrichment step failed"),
            DiscoveryStarted {
                generation,
                objects,
            } => tracing::debug!(generation, objects, "discovery started"),
            DiscoveryFinished {
                generation,
                objects,
                fields,
            } => tracing::info!(generation, "{fields} fields discovered from {objects} objects"),
            DiscoveryStale { generation } => {
                tracing::debug!(generation, "superseded discovery result ignored")
            }
            FallbackFields { count } => {
                tracing::info!(count, "no fields qualified; offering default fields")
            }
            ObjectSkipped { object_id } => {
                tracing::debug!(object_id, "no selected field has a value; object skipped")
            }
            AnchorUnavailable { model_id, message } => {
                tracing::debug!(model_id = %model_id, error = %message, "markups placed without anchor")
            }
            MarkupsRemoved { count } => tracing::debug!(count, "previous markups removed"),
            MarkupRemovalFailed { count, message } => {
                tracing::warn!(count, error = %message, "previous markups could not be removed")
            }
            MarkupCreated {
                object_id,
                markup_id,
            } => tracing::trace!(object_id, markup_id, "markup created"),
            MarkupFailed { object_id, message } => {
                tracing::warn!(object_id, error = %message, "markup creation failed")
            }
            ApplyFinished {
                created,
                failed,
                skipped,
            } => tracing::info!(failed, skipped, "markup applied to {created} objects"),
            SummaryWritten { groups } => tracing::debug!(groups, "summary written"),
            SummaryFailed { message } => {
                tracing::warn!(error = %message, "summary could not be written")
            }
        }
    }
}

/// Records events in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: PipelineEvent) {
        self.events.lock().push(event);
    }
}

/// Sends every event to each inner sink.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: PipelineEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}
