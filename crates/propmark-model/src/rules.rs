//! Ordered key-pattern tables.
//!
//! Flattened keys are matched against these tables to find identifier candidates
//! and to back-fill product fields. Order matters: the first matching key wins.

use crate::error::ModelError;
use crate::record::keys;
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    /// Value is a global identifier candidate; its kind decides the target key.
    Guid,
    ProductName,
    ProductDescription,
    ProductType,
}

impl CanonicalField {
    /// Record key the rule fills, if it maps to exactly one.
    pub fn key(self) -> Option<&'static str> {
        match self {
            CanonicalField::Guid => None,
            CanonicalField::ProductName => Some(keys::PRODUCT_NAME),
            CanonicalField::ProductDescription => Some(keys::PRODUCT_DESCRIPTION),
            CanonicalField::ProductType => Some(keys::PRODUCT_TYPE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub target: CanonicalField,
}

impl FieldRule {
    fn new(name: &'static str, pattern: &str, target: CanonicalField) -> Result<Self, ModelError> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            name,
            pattern,
            target,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.pattern.is_match(key)
    }
}

#[derive(Debug, Clone)]
pub struct FieldRules {
    rules: Vec<FieldRule>,
}

impl FieldRules {
    /// Identifier and product rules used by the flattener.
    pub fn standard() -> Result<Self, ModelError> {
        Ok(Self {
            rules: vec![
                FieldRule::new("guid", r"guid|globalid|tekla_guid|id_guid", CanonicalField::Guid)?,
                FieldRule::new(
                    "product_name",
                    r"product[\s_.\-]*name",
                    CanonicalField::ProductName,
                )?,
                FieldRule::new(
                    "product_description",
                    r"product[\s_.\-]*description",
                    CanonicalField::ProductDescription,
                )?,
                FieldRule::new(
                    "product_object_type",
                    r"product[\s_.\-]*object[\s_.\-]*type",
                    CanonicalField::ProductType,
                )?,
            ],
        })
    }

    pub fn from_rules(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldRule> {
        self.rules.iter()
    }

    pub fn for_target(&self, target: CanonicalField) -> impl Iterator<Item = &FieldRule> {
        self.rules.iter().filter(move |r| r.target == target)
    }

    /// True if any rule for `target` matches `key`.
    pub fn matches(&self, target: CanonicalField, key: &str) -> bool {
        self.for_target(target).any(|r| r.matches(key))
    }
}
