//! Propmark data model
//!
//! Shared types for the property-to-markup pipeline:
//!
//! ```text
//!  provider JSON ──► RawRecord ──► FlattenedRecord ──► DiscoveredField[]
//!                    (closed union)  (dotted keys)        (ranked)
//!                                          │
//!                                          ▼
//!                     FieldSelection + MarkupConfig ──► MarkupResult
//! ```
//!
//! - [`raw`] decodes the provider's loosely-shaped records at the boundary.
//! - [`guid`] classifies IFC and MS identifiers.
//! - [`rules`] holds the ordered key-pattern tables used by the flattener.
//! - [`event`] is the injected logging interface shared by every component.

pub mod config;
pub mod error;
pub mod event;
pub mod field;
pub mod guard;
pub mod guid;
pub mod raw;
pub mod record;
pub mod rules;

pub use config::{DiscoveryConfig, EnrichmentToggles, PipelineConfig};
pub use error::{ModelError, PipelineError, ProviderError, SinkError};
pub use event::{EventSink, FanoutSink, MemorySink, PipelineEvent, TracingSink};
pub use field::{
    DiscoveredField, FieldSelection, Layout, MarkupConfig, MarkupId, MarkupResult, MarkupStatus,
    Position,
};
pub use guard::InFlight;
pub use guid::GuidKind;
pub use raw::{ObjectId, Property, PropertyPayload, PropertySet, RawRecord};
pub use record::{keys, FlattenedRecord, KeyOrigin};
pub use rules::{CanonicalField, FieldRule, FieldRules};
