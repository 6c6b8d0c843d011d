//! Viewer selection → decoded records.

use crate::{PropertyQuery, ViewerProvider};
use futures::future::join_all;
use propmark_model::{EventSink, PipelineError, PipelineEvent, RawRecord};

/// One selected object's raw record, tagged with its owning model.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRecord {
    pub model_id: String,
    pub record: RawRecord,
}

/// Read the current selection and fetch every selected object's properties.
///
/// Models are fetched concurrently. A model whose property call fails is reported and
/// skipped; an empty selection aborts with [`PipelineError::EmptySelection`].
pub async fn load_selection(
    provider: &dyn ViewerProvider,
    query: PropertyQuery,
    events: &dyn EventSink,
) -> Result<Vec<SelectedRecord>, PipelineError> {
    let selection = provider.selected_objects().await?;
    let selection: Vec<_> = selection
        .into_iter()
        .filter(|s| !s.object_ids.is_empty())
        .collect();
    let total: usize = selection.iter().map(|s| s.object_ids.len()).sum();
    if total == 0 {
        return Err(PipelineError::EmptySelection);
    }

    let fetches = selection
        .iter()
        .map(|s| provider.object_properties(&s.model_id, &s.object_ids, query));
    let responses = join_all(fetches).await;

    let mut records = Vec::with_capacity(total);
    for (model, response) in selection.iter().zip(responses) {
        let value = match response {
            Ok(value) => value,
            Err(err) => {
                events.emit(PipelineEvent::PropertyFetchFailed {
                    model_id: model.model_id.clone(),
                    message: err.to_string(),
                });
                continue;
            }
        };
        let decoded = RawRecord::batch_from_value(&value);
        let positional = decoded.len() == model.object_ids.len();
        for (idx, mut record) in decoded.into_iter().enumerate() {
            if record.id.is_none() && positional {
                record.id = Some(model.object_ids[idx]);
            }
            records.push(SelectedRecord {
                model_id: model.model_id.clone(),
                record,
            });
        }
    }

    events.emit(PipelineEvent::SelectionLoaded {
        models: selection.len(),
        objects: records.len(),
    });
    Ok(records)
}
