//! Pipeline configuration.
//!
//! Loaded from JSON (every field optional) and overridable through `PROPMARK_*`
//! environment variables.

use crate::field::MarkupConfig;
use crate::record::keys;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub discovery: DiscoveryConfig,
    pub enrichment: EnrichmentToggles,
    /// Ask the provider for hidden properties as well.
    pub include_hidden: bool,
    pub markup: MarkupConfig,
    /// Model units to markup units (metres to millimetres).
    pub anchor_scale: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            enrichment: EnrichmentToggles::default(),
            include_hidden: true,
            markup: MarkupConfig::default(),
            anchor_scale: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub max_samples: usize,
    /// Size of the ranked list offered for selection.
    pub top_n: usize,
    /// Keys never offered for selection.
    pub denylist: Vec<String>,
    /// Offered when nothing else qualifies.
    pub default_fields: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_samples: 2,
            top_n: 20,
            denylist: [keys::OBJECT_ID, keys::PROJECT, keys::MODEL_ID, keys::FILE_NAME]
                .map(String::from)
                .to_vec(),
            default_fields: [keys::NAME, keys::TYPE, keys::GUID, keys::GUID_IFC, keys::GUID_MS]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Switches for the independent enrichment steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentToggles {
    pub reference_info: bool,
    pub presentation_layers: bool,
    pub external_ids: bool,
}

impl Default for EnrichmentToggles {
    fn default() -> Self {
        Self {
            reference_info: true,
            presentation_layers: true,
            external_ids: true,
        }
    }
}

impl EnrichmentToggles {
    pub fn none() -> Self {
        Self {
            reference_info: false,
            presentation_layers: false,
            external_ids: false,
        }
    }

    pub fn any(&self) -> bool {
        self.reference_info || self.presentation_layers || self.external_ids
    }
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Defaults with process environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `PROPMARK_*` overrides from `lookup`. Unparseable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(prefix) = lookup("PROPMARK_PREFIX") {
            self.markup.prefix = prefix;
        }
        if let Some(separator) = lookup("PROPMARK_SEPARATOR") {
            self.markup.separator = separator;
        }
        if let Some(flag) = lookup("PROPMARK_LINE_BREAK").and_then(|v| parse_flag(&v)) {
            self.markup.line_break = flag;
        }
        if let Some(flag) = lookup("PROPMARK_INCLUDE_HIDDEN").and_then(|v| parse_flag(&v)) {
            self.include_hidden = flag;
        }
        if let Some(n) = lookup("PROPMARK_TOP_N").and_then(|v| v.trim().parse().ok()) {
            self.discovery.top_n = n;
        }
        if let Some(scale) = lookup("PROPMARK_ANCHOR_SCALE").and_then(|v| v.trim().parse().ok()) {
            self.anchor_scale = scale;
        }
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
