//! Markup composition and application
//!
//! - [`composer`]: selected fields of a flattened record → label text.
//! - [`applier`]: label text → viewer markups, replacing the previous pass's markups.
//! - [`condenser`]: identical texts → `"<text> - <count>tk"` lines.
//! - [`sink`]: where the condensed summary goes.
//! - [`session`]: the whole flow against one viewer connection.

pub mod applier;
pub mod composer;
pub mod condenser;
pub mod session;
pub mod sink;

pub use applier::{AnchorSettings, ApplyReport, MarkupApplier, MarkupTarget};
pub use composer::MarkupComposer;
pub use condenser::{condense, CondensedSummary};
pub use session::{ApplySummary, DiscoveryReport, MarkupSession};
pub use sink::{FileSink, SummarySink, WriterSink};
