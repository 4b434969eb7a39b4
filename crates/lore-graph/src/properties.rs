//! Conversion of free-form JSON property maps into values Neo4j can store.
//!
//! Node and relationship properties must be primitives or homogeneous lists
//! of primitives. Nested objects and mixed lists are stored as JSON text;
//! nulls are dropped since `SET n += {k: null}` would delete `k`.

use neo4rs::BoltType;
use serde_json::Value;

use lore_core::entity::Properties;

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    fn kind(&self) -> u8 {
        match self {
            PropertyValue::Str(_) => 0,
            PropertyValue::Int(_) => 1,
            PropertyValue::Float(_) => 2,
            PropertyValue::Bool(_) => 3,
            PropertyValue::List(_) => 4,
        }
    }
}

fn scalar(value: &Value) -> Option<PropertyValue> {
    match value {
        Value::String(s) => Some(PropertyValue::Str(s.clone())),
        Value::Bool(b) => Some(PropertyValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(PropertyValue::Int)
            .or_else(|| n.as_f64().map(PropertyValue::Float)),
        _ => None,
    }
}

pub fn to_property_value(value: &Value) -> Option<PropertyValue> {
    match value {
        Value::Null => None,
        Value::Array(items) => {
            let scalars: Option<Vec<PropertyValue>> = items.iter().map(scalar).collect();
            match scalars {
                Some(list) if list.windows(2).all(|w| w[0].kind() == w[1].kind()) => {
                    Some(PropertyValue::List(list))
                }
                _ => Some(PropertyValue::Str(value.to_string())),
            }
        }
        Value::Object(_) => Some(PropertyValue::Str(value.to_string())),
        other => scalar(other),
    }
}

/// Flatten `properties` into storable pairs, skipping `reserved` keys.
pub fn flatten_properties(properties: &Properties, reserved: &[&str]) -> Vec<(String, PropertyValue)> {
    properties
        .iter()
        .filter(|(key, _)| !reserved.contains(&key.as_str()))
        .filter_map(|(key, value)| to_property_value(value).map(|v| (key.clone(), v)))
        .collect()
}

impl From<PropertyValue> for BoltType {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Str(s) => s.into(),
            PropertyValue::Int(i) => i.into(),
            PropertyValue::Float(f) => f.into(),
            PropertyValue::Bool(b) => b.into(),
            PropertyValue::List(items) => items
                .into_iter()
                .map(BoltType::from)
                .collect::<Vec<BoltType>>()
                .into(),
        }
    }
}
