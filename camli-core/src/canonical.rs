//! Canonical JSON: the exact text a signature is computed over.
//!
//! Object keys are sorted recursively and the output is pretty-printed with
//! two-space indentation, so equal values always serialize to equal bytes.

use serde_json::{Map, Value};

use crate::error::Result;

pub fn canonical_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(&sort_keys(value))?)
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}
