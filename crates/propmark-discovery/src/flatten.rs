//! PropertyFlattener: one raw record → one flat `key -> value` map.
//!
//! The local part ([`PropertyFlattener::flatten_local`]) does no I/O. Provider
//! enrichment is layered on top by [`PropertyFlattener::apply_enrichment`], which only
//! fills fields that are still missing, so identifier precedence is
//! explicit property → metadata → external id.

use crate::enrich::{Enricher, Enrichment};
use propmark_model::guid::{self, GuidKind};
use propmark_model::raw::display_value;
use propmark_model::{
    keys, CanonicalField, EnrichmentToggles, FieldRules, FlattenedRecord, KeyOrigin, ModelError,
    PropertyPayload, RawRecord,
};
use propmark_provider::SupplementalDataFetcher;
use std::collections::HashMap;

const DEFAULT_GROUP: &str = "Unknown";
const DEFAULT_PROPERTY: &str = "Unknown";
const MAP_GROUP: &str = "Properties";

/// Record-independent inputs of a flatten call.
#[derive(Debug, Clone, Copy)]
pub struct FlattenContext<'a> {
    pub model_id: &'a str,
    pub project_name: &'a str,
    pub model_names: &'a HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PropertyFlattener {
    rules: FieldRules,
}

impl PropertyFlattener {
    pub fn new() -> Result<Self, ModelError> {
        Ok(Self::with_rules(FieldRules::standard()?))
    }

    pub fn with_rules(rules: FieldRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &FieldRules {
        &self.rules
    }

    /// Flatten and enrich a single record.
    pub async fn flatten(
        &self,
        record: &RawRecord,
        ctx: &FlattenContext<'_>,
        fetcher: &SupplementalDataFetcher,
        toggles: EnrichmentToggles,
    ) -> FlattenedRecord {
        let mut flat = self.flatten_local(record, ctx);
        if let Some(object_id) = record.id {
            let enrichment = Enricher::new(fetcher, toggles)
                .enrich_model(ctx.model_id, &[(object_id, &flat)])
                .await
                .pop()
                .unwrap_or_default();
            self.apply_enrichment(&mut flat, &enrichment);
        }
        flat
    }

    /// Everything except provider enrichment.
    pub fn flatten_local(&self, record: &RawRecord, ctx: &FlattenContext<'_>) -> FlattenedRecord {
        let mut flat = FlattenedRecord::new();

        // 1. reserved keys
        flat.set(keys::PROJECT, ctx.project_name);
        flat.set(keys::MODEL_ID, ctx.model_id);
        flat.set(
            keys::FILE_NAME,
            ctx.model_names
                .get(ctx.model_id)
                .map(String::as_str)
                .unwrap_or_default(),
        );
        flat.set(keys::NAME, "");
        flat.set(keys::TYPE, keys::UNKNOWN_TYPE);
        flat.set(keys::GUID, "");
        flat.set(keys::GUID_IFC, "");
        flat.set(keys::GUID_MS, "");

        // 2. properties
        match &record.properties {
            PropertyPayload::PropertySetArray(sets) => {
                for set in sets {
                    let group = set.name.as_deref().unwrap_or(DEFAULT_GROUP);
                    for property in &set.properties {
                        let name = property.name.as_deref().unwrap_or(DEFAULT_PROPERTY);
                        let value = display_value(&property.value);
                        flat.insert_property(property_origin(group, name), value);
                    }
                }
            }
            PropertyPayload::PropertyObjectMap(entries) => {
                for (name, value) in entries {
                    flat.insert_property(property_origin(MAP_GROUP, name), display_value(value));
                }
            }
            PropertyPayload::Empty => {}
        }

        // 3. canonical top-level fields
        if let Some(id) = record.id {
            flat.set(keys::OBJECT_ID, id.to_string());
        }
        for (key, value) in [
            (keys::NAME, &record.name),
            (keys::TYPE, &record.object_type),
            (keys::PRODUCT_NAME, &record.product.name),
            (keys::PRODUCT_DESCRIPTION, &record.product.description),
            (keys::PRODUCT_TYPE, &record.product.product_type),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                flat.set(key, value);
            }
        }
        for target in [
            CanonicalField::ProductName,
            CanonicalField::ProductDescription,
            CanonicalField::ProductType,
        ] {
            let Some(key) = target.key() else { continue };
            if flat.non_empty(key).is_some() {
                continue;
            }
            if let Some(value) = self.first_match(&flat, target) {
                flat.set(key, value);
            }
        }

        // 4. identifiers found in properties, then the top-level globalId
        let mut candidates: Vec<String> = flat
            .iter()
            .filter(|(k, v)| self.candidate(k, v, CanonicalField::Guid))
            .map(|(_, v)| v.to_string())
            .collect();
        candidates.extend(record.global_id.clone());
        for candidate in candidates {
            fill_guid(&mut flat, &candidate);
        }

        // 5. primary GUID (again after enrichment)
        assign_primary_guid(&mut flat);
        flat
    }

    /// Fill still-missing fields from provider lookups, in precedence order.
    pub fn apply_enrichment(&self, flat: &mut FlattenedRecord, enrichment: &Enrichment) {
        if let Some(reference) = &enrichment.reference {
            if let Some(global_id) = &reference.global_id {
                fill_guid(flat, global_id);
            }
            if let Some(file) = &reference.file {
                flat.fill(keys::FILE_NAME, file.as_str());
            }
            if let Some(common_type) = reference.common_type.as_deref() {
                if type_unknown(flat) && !common_type.trim().is_empty() {
                    flat.set(keys::TYPE, common_type);
                }
            }
        }
        if let Some(layers) = enrichment.layers.as_ref().filter(|l| !l.is_empty()) {
            flat.fill(keys::PRESENTATION_LAYERS, layers.join(" | "));
        }
        if let Some(external_id) = &enrichment.external_id {
            fill_guid(flat, external_id);
        }
        assign_primary_guid(flat);
    }

    fn candidate(&self, key: &str, value: &str, target: CanonicalField) -> bool {
        !is_canonical(key) && !value.trim().is_empty() && self.rules.matches(target, key)
    }

    fn first_match(&self, flat: &FlattenedRecord, target: CanonicalField) -> Option<String> {
        flat.iter()
            .find(|(k, v)| self.candidate(k, v, target))
            .map(|(_, v)| v.to_string())
    }
}

/// `group.name` with both parts sanitized; just `name` when the group sanitizes away.
pub fn property_key(group: &str, name: &str) -> String {
    property_origin(group, name).key()
}

fn property_origin(group: &str, name: &str) -> KeyOrigin {
    let mut name = sanitize_key(name);
    if name.is_empty() {
        name = DEFAULT_PROPERTY.to_string();
    }
    KeyOrigin::new(sanitize_key(group), name)
}

/// Whitespace runs become `_`, `+` becomes `.`, anything outside `[A-Za-z0-9_.-]` is dropped.
pub fn sanitize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    for c in raw.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        let c = if c == '+' { '.' } else { c };
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            out.push(c);
        }
    }
    out
}

fn is_canonical(key: &str) -> bool {
    keys::RESERVED.contains(&key) || keys::CANONICAL.contains(&key)
}

fn type_unknown(flat: &FlattenedRecord) -> bool {
    flat.non_empty(keys::TYPE)
        .map_or(true, |t| t == keys::UNKNOWN_TYPE)
}

/// First-found-wins per identifier kind.
fn fill_guid(flat: &mut FlattenedRecord, candidate: &str) {
    let normalized = guid::normalize(candidate);
    match guid::classify(&normalized) {
        GuidKind::Ifc => {
            flat.fill(keys::GUID_IFC, normalized);
        }
        GuidKind::Ms => {
            flat.fill(keys::GUID_MS, normalized);
        }
        GuidKind::Unknown => {}
    }
}

fn assign_primary_guid(flat: &mut FlattenedRecord) {
    let primary = flat
        .non_empty(keys::GUID_IFC)
        .or_else(|| flat.non_empty(keys::GUID_MS))
        .unwrap_or_default()
        .to_string();
    flat.set(keys::GUID, primary);
}
