//! Property flattening and field discovery
//!
//! Turns decoded viewer records into flat `key -> value` maps and ranks the keys of a
//! selection by how many objects carry a value for them.
//!
//! ```text
//!  SelectedRecord[] ──► flatten_local ──► enrich (per model, batched) ──► aggregate
//!                                                                         │
//!                                                    DiscoveredField[] ◄──┘
//! ```

pub mod engine;
pub mod enrich;
pub mod flatten;

pub use engine::{aggregate, DiscoveryOutcome, FieldDiscoveryEngine, FlattenedObject};
pub use enrich::{Enricher, Enrichment, EnrichmentStep};
pub use flatten::{property_key, sanitize_key, FlattenContext, PropertyFlattener};
