//! Flattened per-object records.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved and canonical keys.
pub mod keys {
    pub const GUID: &str = "GUID";
    pub const GUID_IFC: &str = "GUID_IFC";
    pub const GUID_MS: &str = "GUID_MS";
    pub const PROJECT: &str = "Project";
    pub const MODEL_ID: &str = "ModelId";
    pub const FILE_NAME: &str = "FileName";
    pub const NAME: &str = "Name";
    pub const TYPE: &str = "Type";
    pub const OBJECT_ID: &str = "ObjectId";
    pub const PRODUCT_NAME: &str = "ProductName";
    pub const PRODUCT_DESCRIPTION: &str = "ProductDescription";
    pub const PRODUCT_TYPE: &str = "ProductType";
    pub const PRESENTATION_LAYERS: &str = "Presentation_Layers";

    /// Keys every flattened record carries.
    pub const RESERVED: [&str; 8] = [
        GUID, GUID_IFC, GUID_MS, PROJECT, MODEL_ID, FILE_NAME, NAME, TYPE,
    ];

    /// Keys the flattener fills from top-level record fields. Properties never land on them.
    pub const CANONICAL: [&str; 4] = [OBJECT_ID, PRODUCT_NAME, PRODUCT_DESCRIPTION, PRODUCT_TYPE];

    pub const UNKNOWN_TYPE: &str = "Unknown";
}

/// Property set and property name a flattened key was built from, both sanitized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOrigin {
    /// Empty when the property had no usable set name.
    pub set_name: String,
    pub property_name: String,
}

impl KeyOrigin {
    pub fn new(set_name: impl Into<String>, property_name: impl Into<String>) -> Self {
        Self {
            set_name: set_name.into(),
            property_name: property_name.into(),
        }
    }

    /// `set.property`, or just `property` without a set.
    pub fn key(&self) -> String {
        if self.set_name.is_empty() {
            self.property_name.clone()
        } else {
            format!("{}.{}", self.set_name, self.property_name)
        }
    }
}

/// Single-level `key -> value` view of one object, in first-seen key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedRecord {
    fields: IndexMap<String, String>,
    #[serde(skip)]
    occurrences: HashMap<String, usize>,
    #[serde(skip)]
    origins: HashMap<String, KeyOrigin>,
}

impl FlattenedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Value for `key` if present and non-blank.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Set `key`, overwriting any existing value and keeping its position.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Set `key` only when it is absent or blank. Returns whether it was written.
    pub fn fill(&mut self, key: &str, value: impl Into<String>) -> bool {
        if self.non_empty(key).is_some() {
            return false;
        }
        let value = value.into();
        if value.trim().is_empty() {
            return false;
        }
        self.set(key, value);
        true
    }

    /// Insert under `base`, suffixing `_<n>` on repeats so keys stay unique.
    ///
    /// `n` counts the earlier occurrences of the same base key. A suffixed key that is
    /// already taken, or one of [`keys::CANONICAL`], keeps counting up. Returns the key
    /// actually used.
    pub fn insert_unique(&mut self, base: &str, value: impl Into<String>) -> String {
        let count = self.occurrences.entry(base.to_string()).or_insert(0);
        let mut key = if *count == 0 {
            base.to_string()
        } else {
            format!("{base}_{count}")
        };
        *count += 1;
        while self.fields.contains_key(&key) || keys::CANONICAL.contains(&key.as_str()) {
            key = format!("{base}_{count}");
            *count += 1;
        }
        self.fields.insert(key.clone(), value.into());
        key
    }

    /// Insert a property value under its origin's key and remember where it came from.
    ///
    /// A collision suffix stays on the property name: `Pset.Name_1` has origin
    /// `Pset` / `Name_1`.
    pub fn insert_property(&mut self, origin: KeyOrigin, value: impl Into<String>) -> String {
        let key = self.insert_unique(&origin.key(), value);
        let property_name = if origin.set_name.is_empty() {
            key.clone()
        } else {
            key.strip_prefix(origin.set_name.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .map_or_else(|| origin.property_name.clone(), str::to_string)
        };
        self.origins
            .insert(key.clone(), KeyOrigin::new(origin.set_name, property_name));
        key
    }

    /// Origin of a key written by [`FlattenedRecord::insert_property`].
    pub fn origin(&self, key: &str) -> Option<&KeyOrigin> {
        self.origins.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_unique_suffixes_in_first_seen_order() {
        let mut record = FlattenedRecord::new();
        assert_eq!(record.insert_unique("Pset.Name", "a"), "Pset.Name");
        assert_eq!(record.insert_unique("Pset.Name", "b"), "Pset.Name_1");
        assert_eq!(record.insert_unique("Pset.Name", "c"), "Pset.Name_2");
        let keys: Vec<_> = record.keys().collect();
        assert_eq!(keys, ["Pset.Name", "Pset.Name_1", "Pset.Name_2"]);
    }

    #[test]
    fn insert_unique_skips_taken_suffixes_and_reserved_keys() {
        let mut record = FlattenedRecord::new();
        record.set(keys::NAME, "");
        record.insert_unique("A_1", "x");
        assert_eq!(record.insert_unique("Name", "n"), "Name_1");
        assert_eq!(record.insert_unique("A", "1"), "A");
        assert_eq!(record.insert_unique("A", "2"), "A_2");
        assert_eq!(record.len(), 5);
    }

    #[test]
    fn canonical_keys_are_never_taken_by_properties() {
        let mut record = FlattenedRecord::new();
        assert_eq!(record.insert_unique(keys::OBJECT_ID, "TEKLA-77"), "ObjectId_1");
        assert_eq!(record.insert_unique(keys::PRODUCT_NAME, "from-property"), "ProductName_1");
        assert_eq!(record.insert_unique(keys::PRODUCT_NAME, "again"), "ProductName_2");
        assert!(!record.contains_key(keys::OBJECT_ID));
    }

    #[test]
    fn insert_property_keeps_dotted_set_names() {
        let mut record = FlattenedRecord::new();
        let key = record.insert_property(KeyOrigin::new("Pset.1", "Weight"), "7");
        assert_eq!(key, "Pset.1.Weight");
        assert_eq!(record.origin(&key), Some(&KeyOrigin::new("Pset.1", "Weight")));

        let key = record.insert_property(KeyOrigin::new("Pset.1", "Weight"), "8");
        assert_eq!(key, "Pset.1.Weight_1");
        assert_eq!(record.origin(&key).map(|o| o.property_name.as_str()), Some("Weight_1"));

        let key = record.insert_property(KeyOrigin::new("", "Note"), "n");
        assert_eq!(record.origin(&key), Some(&KeyOrigin::new("", "Note")));
        assert_eq!(record.origin(keys::NAME), None);
    }

    #[test]
    fn fill_only_writes_missing_values() {
        let mut record = FlattenedRecord::new();
        record.set(keys::FILE_NAME, "");
        assert!(record.fill(keys::FILE_NAME, "model.ifc"));
        assert!(!record.fill(keys::FILE_NAME, "other.ifc"));
        assert!(!record.fill(keys::TYPE, "  "));
        assert_eq!(record.get(keys::FILE_NAME), Some("model.ifc"));
    }
}
