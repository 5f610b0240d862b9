//! Per-session map of available typed values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Pseudo-type always present with value `false`.
pub const NULL_TYPE: &str = "NULL";

/// Caller inputs: type name to value.
pub type InputMap = IndexMap<String, Value>;

/// Whether a value carries a truthy marker field (`error`, `warning`, `remove`).
pub fn has_marker(value: &Value, marker: &str) -> bool {
    value.get(marker).map(is_truthy).unwrap_or(false)
}

/// Loose truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form of a value: strings unquoted, everything else as JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ordered map of type names to values for one execution session.
///
/// `null` values are never stored and `NULL` is always present as `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingInputSet {
    values: IndexMap<String, Value>,
}

impl WorkingInputSet {
    /// Seed from caller inputs, dropping `null` values.
    pub fn new(inputs: &InputMap) -> Self {
        let mut values: IndexMap<String, Value> = inputs
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        values.insert(NULL_TYPE.to_string(), Value::Bool(false));
        Self { values }
    }

    /// Value stored for a type.
    pub fn get(&self, type_name: &str) -> Option<&Value> {
        self.values.get(type_name)
    }

    /// Whether a type is present.
    pub fn contains(&self, type_name: &str) -> bool {
        self.values.contains_key(type_name)
    }

    /// Insert unless a value is already present. Returns true when inserted.
    pub fn insert_first(&mut self, type_name: &str, value: Value) -> bool {
        if value.is_null() {
            return false;
        }
        match self.values.get(type_name) {
            Some(existing) if !existing.is_null() => false,
            _ => {
                self.values.insert(type_name.to_string(), value);
                true
            }
        }
    }

    /// Present type names in insertion order.
    pub fn type_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Usable value of a type.
    ///
    /// Absent, `null` and `false` values yield `None`, as do values carrying a
    /// truthy `error` or `warning` marker.
    pub fn output_value(&self, type_name: &str) -> Option<Value> {
        let value = self.values.get(type_name)?;
        match value {
            Value::Null | Value::Bool(false) => None,
            v if has_marker(v, "error") || has_marker(v, "warning") => None,
            v => Some(v.clone()),
        }
    }

    /// Canonical key-sorted JSON of the set.
    pub fn signature(&self) -> String {
        let sorted: BTreeMap<&String, &Value> = self.values.iter().collect();
        serde_json::to_string(&sorted).unwrap_or_default()
    }

    /// Copy of the values as an input map.
    pub fn to_input_map(&self) -> InputMap {
        self.values.clone()
    }

    /// Consume into the underlying map.
    pub fn into_inner(self) -> InputMap {
        self.values
    }

    /// Number of stored types, `NULL` included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether only `NULL` is stored.
    pub fn is_empty(&self) -> bool {
        self.values.len() <= 1
    }
}

impl Default for WorkingInputSet {
    fn default() -> Self {
        Self::new(&InputMap::new())
    }
}
