//! Error taxonomy.
//!
//! Only [`PipelineError::ProviderUnavailable`], [`PipelineError::EmptySelection`] and
//! [`PipelineError::Busy`] abort a whole operation. Per-object variants are produced at
//! the object boundary, reported, and never stop a batch.

use crate::raw::ObjectId;

/// Failure of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider call failed: {0}")]
    Call(String),
    #[error("provider does not support {0}")]
    Unsupported(&'static str),
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("model viewer connection is not available")]
    ProviderUnavailable,
    #[error("no objects selected")]
    EmptySelection,
    #[error("a {0} pass is already running")]
    Busy(&'static str),
    #[error("could not read object {object_id} in model {model_id}: {message}")]
    PerObjectFetch {
        model_id: String,
        object_id: ObjectId,
        message: String,
    },
    #[error("could not create markup for object {object_id}: {message}")]
    PerObjectMarkup { object_id: ObjectId, message: String },
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Failure writing a summary to its destination (clipboard, file, ...).
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("could not write summary: {0}")]
    Io(#[from] std::io::Error),
    #[error("summary destination unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),
}
