//! Network request construction and response interpretation.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use servicepath_core::{is_truthy, value_text, BoundInput, NetworkSpec, RequestMethod, WorkingInputSet};
use servicepath_registry::HttpRequest;

/// Separator for nested request and response keys.
pub const KEY_PATH_SEPARATOR: &str = "->";

/// Message for a response without a body.
pub const EMPTY_BODY: &str = "Empty body";

/// Values of the bound inputs keyed by declared type.
///
/// Inputs bound to `NULL` or missing from the set are left out.
pub fn bound_values(inputs: &[BoundInput], set: &WorkingInputSet) -> IndexMap<String, Value> {
    inputs
        .iter()
        .filter(|input| !input.is_null())
        .filter_map(|input| {
            set.get(&input.source)
                .filter(|value| !value.is_null())
                .map(|value| (input.spec.type_name(), value.clone()))
        })
        .collect()
}

/// Build the HTTP request for a network node.
pub fn build_request(network: &NetworkSpec, inputs: &[BoundInput], set: &WorkingInputSet) -> HttpRequest {
    let values = bound_values(inputs, set);

    let mut path = network.path.clone();
    for (type_name, value) in &values {
        path = path.replace(&format!("{{{}}}", type_name), &value_text(value));
    }
    let url = network.parsed_address().url_for(&path);

    let mut data = Map::new();
    match &network.request_template {
        Some(template) => {
            for (type_name, field) in template {
                let Some(value) = field.value.clone().or_else(|| values.get(type_name).cloned()) else {
                    continue;
                };
                let value = match field.field_type {
                    Some(field_type) => field_type.coerce(value),
                    None => value,
                };
                let key = field.key.as_deref().unwrap_or(type_name);
                set_nested(&mut data, key, value);
            }
        }
        None => {
            for (type_name, value) in values {
                set_nested(&mut data, &type_name, value);
            }
        }
    }

    let mut request = HttpRequest::get(url, network.timeout);
    request.method = network.method;
    request.headers = network.headers.clone();
    match network.method {
        RequestMethod::Get => {
            request.query = data.iter().map(|(k, v)| (k.clone(), value_text(v))).collect();
        }
        RequestMethod::Post => {
            request.body = Some(Value::Object(data));
        }
    }
    request
}

/// Insert a value under a `->` separated key, creating objects on the way.
pub fn set_nested(target: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once(KEY_PATH_SEPARATOR) {
        None => {
            target.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head)
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                set_nested(child, rest, value);
            }
        }
    }
}

/// Follow a `->` separated key. Null steps count as missing.
pub fn extract_path<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    key.split(KEY_PATH_SEPARATOR).try_fold(value, |current, part| {
        current
            .get(part)
            .or_else(|| part.parse::<usize>().ok().and_then(|idx| current.get(idx)))
            .filter(|v| !v.is_null())
    })
}

/// Interpret a response body.
///
/// Non-JSON bodies are kept as strings. Errors carry the message to record.
pub fn interpret_response(body: &str, response_key: Option<&str>) -> Result<Value, String> {
    if body.trim().is_empty() {
        return Err(EMPTY_BODY.to_string());
    }

    let parsed: Value = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));

    if let Some(error) = parsed.get("error").filter(|e| is_truthy(e)) {
        return Err(value_text(error));
    }

    match response_key {
        None => Ok(parsed),
        Some(key) => extract_path(&parsed, key)
            .cloned()
            .ok_or_else(|| format!("Response key \"{}\" not found in body", key)),
    }
}
