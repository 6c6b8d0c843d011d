//! ResultCondenser: identical label texts → one line with a count.

use propmark_model::{MarkupResult, MarkupStatus};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CondensedSummary {
    /// Distinct texts in first-seen order.
    pub groups: Vec<MarkupResult>,
}

impl CondensedSummary {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// One `"<text> - <count>tk"` line per group.
    pub fn render(&self) -> String {
        self.groups
            .iter()
            .map(|g| format!("{} - {}tk", g.text, g.count))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Group results by exact text. Results without text are left out.
pub fn condense<'a, I>(results: I) -> CondensedSummary
where
    I: IntoIterator<Item = &'a MarkupResult>,
{
    let mut groups: Vec<MarkupResult> = Vec::new();
    for result in results {
        if result.status == MarkupStatus::NotFound || result.text.is_empty() {
            continue;
        }
        match groups.iter_mut().find(|g| g.text == result.text) {
            Some(group) => group.count += result.count,
            None => groups.push(MarkupResult {
                text: result.text.clone(),
                count: result.count,
                status: result.status,
            }),
        }
    }
    CondensedSummary { groups }
}
