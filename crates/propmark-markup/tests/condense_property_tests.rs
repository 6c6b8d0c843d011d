//! Property tests for composition and condensing.

use propmark_markup::{condense, MarkupComposer};
use propmark_model::{FieldSelection, FlattenedRecord, MarkupConfig, MarkupResult, MarkupStatus};
use proptest::prelude::*;

fn result_strategy() -> impl Strategy<Value = MarkupResult> {
    prop_oneof![
        4 => prop::sample::select(vec!["A", "B", "C"]).prop_map(|t| MarkupResult::new(t, MarkupStatus::Found)),
        1 => Just(MarkupResult::new("", MarkupStatus::NotFound)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn groups_are_distinct_and_counts_add_up(results in prop::collection::vec(result_strategy(), 0..30)) {
        let summary = condense(&results);
        let labelled = results.iter().filter(|r| r.status != MarkupStatus::NotFound).count();
        prop_assert_eq!(summary.groups.iter().map(|g| g.count).sum::<usize>(), labelled);
        for (i, group) in summary.groups.iter().enumerate() {
            prop_assert!(summary.groups[i + 1..].iter().all(|g| g.text != group.text));
        }
        let first_seen: Vec<&str> = results
            .iter()
            .filter(|r| r.status != MarkupStatus::NotFound)
            .fold(Vec::new(), |mut seen, r| {
                if !seen.contains(&r.text.as_str()) {
                    seen.push(r.text.as_str());
                }
                seen
            });
        let order: Vec<&str> = summary.groups.iter().map(|g| g.text.as_str()).collect();
        prop_assert_eq!(order, first_seen);
    }

    #[test]
    fn composed_text_follows_selection_order(
        values in prop::collection::vec(prop::option::of("[a-z]{1,4}"), 1..6),
    ) {
        let mut record = FlattenedRecord::new();
        let keys: Vec<String> = (0..values.len()).map(|i| format!("K{i}")).collect();
        for (key, value) in keys.iter().zip(&values) {
            record.set(key, value.clone().unwrap_or_default());
        }
        let config = MarkupConfig { separator: "|".into(), ..MarkupConfig::default() };
        let reversed = FieldSelection::new(keys.iter().rev().cloned());
        let result = MarkupComposer::new(reversed, config).compose(&record);

        let expected: Vec<String> = values.iter().rev().flatten().cloned().collect();
        if expected.is_empty() {
            prop_assert_eq!(result.status, MarkupStatus::NotFound);
        } else {
            prop_assert_eq!(result.status, MarkupStatus::Found);
            prop_assert_eq!(result.text, expected.join("|"));
        }
    }
}
