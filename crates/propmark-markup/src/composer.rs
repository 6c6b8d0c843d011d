//! MarkupComposer: selected fields of one record → label text.

use propmark_model::{
    DiscoveredField, FieldSelection, FlattenedRecord, MarkupConfig, MarkupResult, MarkupStatus,
};

#[derive(Debug, Clone)]
pub struct MarkupComposer {
    selection: FieldSelection,
    config: MarkupConfig,
}

impl MarkupComposer {
    pub fn new(selection: FieldSelection, config: MarkupConfig) -> Self {
        Self { selection, config }
    }

    pub fn selection(&self) -> &FieldSelection {
        &self.selection
    }

    pub fn config(&self) -> &MarkupConfig {
        &self.config
    }

    /// Join the record's values for the selected keys, in selection order.
    ///
    /// Missing and blank values are dropped. With nothing left the result is
    /// [`MarkupStatus::NotFound`] with empty text.
    pub fn compose(&self, record: &FlattenedRecord) -> MarkupResult {
        let values: Vec<&str> = self
            .selection
            .keys()
            .iter()
            .filter_map(|key| record.non_empty(key))
            .map(str::trim)
            .collect();
        if values.is_empty() {
            return MarkupResult::new("", MarkupStatus::NotFound);
        }
        let text = format!(
            "{}{}",
            self.config.prefix,
            values.join(self.config.effective_separator())
        );
        MarkupResult::new(text, MarkupStatus::Found)
    }

    /// Sample label for the field picker: each selected field's first sample value, or
    /// its property name when discovery saw no value.
    pub fn preview(&self, fields: &[DiscoveredField]) -> String {
        let parts: Vec<String> = self
            .selection
            .keys()
            .iter()
            .map(|key| match fields.iter().find(|f| &f.key == key) {
                Some(field) => field
                    .value_samples
                    .first()
                    .cloned()
                    .unwrap_or_else(|| field.property_name.clone()),
                None => key.clone(),
            })
            .collect();
        if parts.is_empty() {
            return String::new();
        }
        format!("{}{}", self.config.prefix, parts.join(self.config.effective_separator()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propmark_model::Layout;

    fn record(pairs: &[(&str, &str)]) -> FlattenedRecord {
        let mut r = FlattenedRecord::new();
        for (k, v) in pairs {
            r.set(k, *v);
        }
        r
    }

    fn composer(keys: &[&str], config: MarkupConfig) -> MarkupComposer {
        MarkupComposer::new(FieldSelection::new(keys.iter().copied()), config)
    }

    #[test]
    fn caller_order_wins_and_blanks_drop() {
        let config = MarkupConfig {
            separator: " | ".into(),
            prefix: "ID: ".into(),
            ..MarkupConfig::default()
        };
        let record = record(&[("A", "1"), ("B", "  "), ("C", "3")]);
        let result = composer(&["C", "B", "Missing", "A"], config).compose(&record);
        assert_eq!(result, MarkupResult::new("ID: 3 | 1", MarkupStatus::Found));
    }

    #[test]
    fn nothing_to_show_is_not_found() {
        let result = composer(&["A"], MarkupConfig::default()).compose(&record(&[("A", "")]));
        assert_eq!(result.status, MarkupStatus::NotFound);
        assert!(result.text.is_empty());
    }

    #[test]
    fn line_break_overrides_separator() {
        let config = MarkupConfig {
            separator: ";".into(),
            line_break: true,
            ..MarkupConfig::default()
        };
        let record = record(&[("A", "1"), ("B", "2")]);
        assert_eq!(composer(&["A", "B"], config).compose(&record).text, "1\n2");

        let lines = MarkupConfig {
            layout: Layout::Lines,
            ..MarkupConfig::default()
        };
        assert_eq!(composer(&["A", "B"], lines).compose(&record).text, "1\n2");
    }

    #[test]
    fn preview_uses_first_sample_or_name() {
        let mut weight = DiscoveredField::new("Pset1.Weight");
        weight.value_samples = vec!["120".into(), "80".into()];
        let name = DiscoveredField::new("Pset1.Name");
        let preview = composer(&["Pset1.Name", "Pset1.Weight", "Other"], MarkupConfig::default())
            .preview(&[weight, name]);
        assert_eq!(preview, "Name, 120, Other");
    }
}
