//! Loading of the declarative release document

use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use crate::error::{DeployError, Result};

pub mod value;

pub use value::{as_list, items, to_bool};

/// Key prefixes marking attribute and text origin in converted documents
const SENTINELS: &[char] = &['@', '#'];

const ROOT_WRAPPERS: &[&str] = &["WebDeploy", "web_deploy"];

/// Read a YAML or JSON document and return its normalized `project` section
pub fn load_project_config(path: &Path) -> Result<Value> {
    debug!("Loading release config from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    parse_project_config(&content)
}

pub fn parse_project_config(content: &str) -> Result<Value> {
    let document: Value = serde_yaml::from_str(content)?;
    project_section(normalize_keys(document))
}

/// Strip sentinel prefixes from every map key, recursively
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let key = key.trim_start_matches(SENTINELS).to_string();
                    (key, normalize_keys(value))
                })
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        scalar => scalar,
    }
}

fn project_section(document: Value) -> Result<Value> {
    let mut root = document;
    if let Value::Object(map) = &mut root {
        if let Some(inner) = ROOT_WRAPPERS.iter().find_map(|key| map.remove(*key)) {
            root = inner;
        }
    }

    match root {
        Value::Object(mut map) => match map.remove("project") {
            Some(project @ Value::Object(_)) => Ok(project),
            Some(other) => Err(DeployError::config(format!(
                "`project` must be a map, got {other}"
            ))),
            None => Err(DeployError::config("Config has no `project` section")),
        },
        other => Err(DeployError::config(format!(
            "Config root must be a map, got {other}"
        ))),
    }
}
