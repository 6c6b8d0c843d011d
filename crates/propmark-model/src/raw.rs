//! Boundary decoding of provider records.
//!
//! The provider hands back per-object JSON whose `properties` member is either an
//! array of property sets or a plain key/value object. Records are decoded once,
//! here, into a closed [`PropertyPayload`] so the flattener never shape-sniffs.
//! Decoding is total: anything unrecognised becomes `Empty` or `None`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Runtime identifier of an object inside one model.
pub type ObjectId = u64;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub id: Option<ObjectId>,
    pub name: Option<String>,
    pub object_type: Option<String>,
    pub product: ProductInfo,
    /// Top-level `globalId`, if the provider sent one.
    pub global_id: Option<String>,
    pub properties: PropertyPayload,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductInfo {
    pub name: Option<String>,
    pub description: Option<String>,
    pub product_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PropertyPayload {
    PropertySetArray(Vec<PropertySet>),
    /// Entries of a plain object, in the order the decoder yielded them.
    PropertyObjectMap(Vec<(String, Value)>),
    #[default]
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySet {
    pub name: Option<String>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: Option<String>,
    /// `displayValue` when present and non-null, otherwise `value`.
    pub value: Value,
}

impl RawRecord {
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let product = obj
            .get("product")
            .and_then(Value::as_object)
            .map(|p| ProductInfo {
                name: string_field(p.get("name")),
                description: string_field(p.get("description")),
                product_type: string_field(p.get("type")),
            })
            .unwrap_or_default();

        Self {
            id: id_field(obj.get("id")).or_else(|| id_field(obj.get("runtimeId"))),
            name: string_field(obj.get("name")),
            object_type: string_field(obj.get("type")),
            product,
            global_id: string_field(obj.get("globalId")),
            properties: decode_payload(obj.get("properties")),
        }
    }

    /// Normalize a `RawRecord | RawRecord[]` response into a list.
    pub fn batch_from_value(value: &Value) -> Vec<Self> {
        match value {
            Value::Array(items) => items.iter().map(Self::from_value).collect(),
            Value::Object(_) => vec![Self::from_value(value)],
            _ => Vec::new(),
        }
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

fn decode_payload(value: Option<&Value>) -> PropertyPayload {
    match value {
        Some(Value::Array(sets)) => PropertyPayload::PropertySetArray(
            sets.iter().filter_map(decode_set).collect(),
        ),
        Some(Value::Object(map)) => PropertyPayload::PropertyObjectMap(
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        ),
        _ => PropertyPayload::Empty,
    }
}

fn decode_set(value: &Value) -> Option<PropertySet> {
    let obj = value.as_object()?;
    let properties = obj
        .get("properties")
        .and_then(Value::as_array)
        .map(|props| props.iter().filter_map(decode_property).collect())
        .unwrap_or_default();
    Some(PropertySet {
        name: string_field(obj.get("name")),
        properties,
    })
}

fn decode_property(value: &Value) -> Option<Property> {
    let obj = value.as_object()?;
    let value = match obj.get("displayValue") {
        Some(v) if !v.is_null() => v.clone(),
        _ => obj.get("value").cloned().unwrap_or(Value::Null),
    };
    Some(Property {
        name: string_field(obj.get("name")),
        value,
    })
}

fn string_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn id_field(value: Option<&Value>) -> Option<ObjectId> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Render a property value as label text.
///
/// Arrays join with `" | "`, objects become compact JSON, null becomes `""`.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(" | "),
        Value::Object(_) => value.to_string(),
    }
}
