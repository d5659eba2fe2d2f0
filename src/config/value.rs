//! Helpers for reading the generic config tree

use serde_json::{Map, Value};

use crate::error::{DeployError, Result};

const FALSE_WORDS: &[&str] = &["0", "false", "", "none", "null", "no"];

/// Interpret a boolean-like scalar; only the documented false words are false
pub fn to_bool(value: &Value) -> bool {
    let text = match value {
        Value::Null => return false,
        Value::Bool(b) => return *b,
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };
    !FALSE_WORDS.contains(&text.as_str())
}

/// Accept a single record or an array of records as a sequence
pub fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

/// Items of a wrapper like `{item: [...]}`, or of a bare list
pub fn items<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    match value {
        Value::Object(map) => map.get(key).map(as_list).unwrap_or_default(),
        other => as_list(other),
    }
}

pub fn as_map<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| DeployError::config(format!("{what} must be a map, got {value}")))
}

pub fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn optional_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(scalar).filter(|s| !s.is_empty())
}

pub fn required_str(map: &Map<String, Value>, key: &str, what: &str) -> Result<String> {
    optional_str(map, key)
        .ok_or_else(|| DeployError::config(format!("{what} is missing required field `{key}`")))
}

pub fn required<'a>(map: &'a Map<String, Value>, key: &str, what: &str) -> Result<&'a Value> {
    map.get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| DeployError::config(format!("{what} is missing required field `{key}`")))
}
