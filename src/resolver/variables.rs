//! `${name}` placeholder substitution

use serde_json::Value;
use std::collections::BTreeMap;

/// String form of a variable value: strings verbatim, anything else as compact JSON
pub fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace every `${name}` whose name is in `variables`; unknown names stay as written
pub fn resolve(text: &str, variables: &BTreeMap<String, Value>) -> String {
    if !text.contains("${") {
        return text.to_string();
    }

    let mut resolved = text.to_string();
    for (name, value) in variables {
        let placeholder = format!("${{{name}}}");
        if resolved.contains(&placeholder) {
            resolved = resolved.replace(&placeholder, &plain_text(value));
        }
    }
    resolved
}

/// Resolve string leaves of a JSON structure in place
pub fn resolve_value(value: &mut Value, variables: &BTreeMap<String, Value>) {
    match value {
        Value::String(s) => {
            let resolved = resolve(s, variables);
            *s = resolved;
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                resolve_value(item, variables);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                resolve_value(item, variables);
            }
        }
        _ => {}
    }
}

pub fn resolve_headers(
    headers: &mut BTreeMap<String, String>,
    variables: &BTreeMap<String, Value>,
) {
    for value in headers.values_mut() {
        *value = resolve(value, variables);
    }
}
