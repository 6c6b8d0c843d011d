//! Discovery output, field selection and markup configuration.

use serde::{Deserialize, Serialize};

/// Identifier the provider assigns to a created markup.
pub type MarkupId = u64;

/// One candidate field produced by a discovery pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredField {
    /// Flattened record key, e.g. `Pset1.Name`.
    pub key: String,
    /// Property set the key came from; empty for top-level keys.
    pub set_name: String,
    pub property_name: String,
    pub display_name: String,
    /// Percentage of objects with a non-empty value, `0..=100`.
    pub frequency: u8,
    /// Up to two distinct non-empty values, first seen first.
    pub value_samples: Vec<String>,
    pub objects_with_value: usize,
    /// Objects whose record carries the key at all, empty or not.
    pub occurrences: usize,
}

impl DiscoveredField {
    /// Field for a key of unknown origin, split at its first `.`.
    ///
    /// Set names can contain `.` themselves; prefer [`DiscoveredField::with_origin`] when
    /// the flattener recorded where the key came from.
    pub fn new(key: &str) -> Self {
        match key.split_once('.') {
            Some((set, prop)) => Self::with_origin(key, set, prop),
            None => Self::with_origin(key, "", key),
        }
    }

    pub fn with_origin(key: &str, set_name: &str, property_name: &str) -> Self {
        let set_name = set_name.to_string();
        let property_name = property_name.to_string();
        let display_name = if set_name.is_empty() {
            property_name.clone()
        } else {
            format!("{set_name} > {property_name}")
        };
        Self {
            key: key.to_string(),
            set_name,
            property_name,
            display_name,
            frequency: 0,
            value_samples: Vec::new(),
            objects_with_value: 0,
            occurrences: 0,
        }
    }
}

/// `round(100 * with_value / total)` with halves rounded up; `0` when `total == 0`.
pub fn frequency_percent(with_value: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let with_value = with_value.min(total) as u128;
    let total = total as u128;
    ((200 * with_value + total) / (2 * total)) as u8
}

/// Ordered field keys chosen by the user. Order here wins over discovery rank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSelection(Vec<String>);

impl FieldSelection {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selection = Self::default();
        for key in keys {
            selection.push(key);
        }
        selection
    }

    /// Append a key unless it is already selected.
    pub fn push(&mut self, key: impl Into<String>) {
        let key = key.into();
        if !self.0.contains(&key) {
            self.0.push(key);
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|k| k != key);
        self.0.len() != before
    }

    /// Move the key at `from` to position `to`.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from >= self.0.len() || to >= self.0.len() || from == to {
            return;
        }
        let key = self.0.remove(from);
        self.0.insert(to, key);
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Inline,
    Lines,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Center,
    Top,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    pub prefix: String,
    pub separator: String,
    pub line_break: bool,
    pub layout: Layout,
    pub position: Position,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            separator: ", ".to_string(),
            line_break: false,
            layout: Layout::Inline,
            position: Position::Center,
        }
    }
}

impl MarkupConfig {
    /// Separator actually used: line breaks win over the configured one.
    pub fn effective_separator(&self) -> &str {
        if self.line_break || self.layout == Layout::Lines {
            "\n"
        } else {
            &self.separator
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupStatus {
    /// Text composed and, when applied, a markup was created.
    Found,
    /// Text composed but the markup could not be created.
    Partial,
    /// No selected field had a value.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupResult {
    pub text: String,
    pub count: usize,
    pub status: MarkupStatus,
}

impl MarkupResult {
    pub fn new(text: impl Into<String>, status: MarkupStatus) -> Self {
        Self {
            text: text.into(),
            count: 1,
            status,
        }
    }
}
