//! Conversion of parsed JSON into the engine's value universe.
//!
//! Parsing stays with `serde_json`; this module only reshapes its tree.
//! Objects become case-sensitive [`ValueMap`]s, so a JSON payload flows
//! through ordinary mapping adaptation (typically fuzzy, since JSON key
//! casing rarely matches contract member names).

use crate::mapping::{Mapping, ValueMap};
use crate::value::{MapHandle, Value};

/// Convert one parsed JSON value.
///
/// Integral numbers become `Int`, other numbers `Float`. Arrays have no
/// representation in the value universe and convert to `Null`.
pub fn value_from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or(Value::Null),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Object(object) => Value::Map(map_from_json(object)),
        serde_json::Value::Array(_) => Value::Null,
    }
}

/// Convert a JSON object into a case-sensitive mapping.
pub fn map_from_json(object: &serde_json::Map<String, serde_json::Value>) -> MapHandle {
    let mut map = ValueMap::case_sensitive();
    for (key, value) in object {
        map.insert(key, value_from_json(value));
    }
    map.into_handle()
}

/// Mapping handle for a parsed JSON document, `None` when the document
/// is not an object.
pub fn mapping_from_json(json: &serde_json::Value) -> Option<MapHandle> {
    match json {
        serde_json::Value::Object(object) => Some(map_from_json(object)),
        _ => None,
    }
}
