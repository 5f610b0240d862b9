//! Input cleaning and random input data.
//!
//! Caller inputs may carry placeholders that are replaced before resolution:
//! `%RANDOM%` draws from a pool keyed by the uppercased input name, and one
//! `%RANDOM_PRIMARY%` input together with any `%RANDOM_SECONDARY%` inputs
//! draws a correlated group from `PRIMARY->SECONDARY` lookup tables.

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use serde_json::Value;
use servicepath_core::{value_text, InputMap};

/// Placeholder for a random pool value.
pub const RANDOM: &str = "%RANDOM%";

/// Placeholder for the primary input of a correlated group.
pub const RANDOM_PRIMARY: &str = "%RANDOM_PRIMARY%";

/// Placeholder for a value looked up from the primary's value.
pub const RANDOM_SECONDARY: &str = "%RANDOM_SECONDARY%";

/// Value used when no random data is registered.
pub const NO_RANDOM_DATA: &str = "NULL";

/// Registered random pools and lookup tables.
#[derive(Debug, Clone, Default)]
pub struct RandomData {
    entries: IndexMap<String, Value>,
}

impl RandomData {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool (array) or lookup table (object) under a key.
    pub fn set(&mut self, key: impl Into<String>, data: Value) {
        self.entries.insert(key.into(), data);
    }

    /// Whether any data is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A random value from the pool of an input.
    pub fn value_for(&self, input: &str) -> Value {
        self.entries
            .get(&input.to_uppercase())
            .and_then(Value::as_array)
            .and_then(|pool| pool.choose(&mut rand::thread_rng()))
            .cloned()
            .unwrap_or_else(|| Value::String(NO_RANDOM_DATA.to_string()))
    }

    /// The value correlated with `primary_value` for a secondary input.
    pub fn lookup(&self, primary: &str, secondary: &str, primary_value: &Value) -> Value {
        let key = format!("{}->{}", primary.to_uppercase(), secondary.to_uppercase());
        self.entries
            .get(&key)
            .and_then(|table| table.get(value_text(primary_value)))
            .filter(|value| !value.is_null())
            .cloned()
            .unwrap_or_else(|| Value::String(NO_RANDOM_DATA.to_string()))
    }
}

/// Drop `null` inputs and replace random placeholders.
pub fn clean_inputs(inputs: &InputMap, random: &RandomData) -> InputMap {
    let mut source = inputs.clone();

    let primary = inputs
        .iter()
        .find(|(_, value)| is_placeholder(value, RANDOM_PRIMARY))
        .map(|(key, _)| key.clone());
    if let Some(primary) = primary {
        let primary_value = random.value_for(&primary);
        let secondaries: Vec<String> = inputs
            .iter()
            .filter(|(_, value)| is_placeholder(value, RANDOM_SECONDARY))
            .map(|(key, _)| key.clone())
            .collect();
        for secondary in secondaries {
            let value = random.lookup(&primary, &secondary, &primary_value);
            source.insert(secondary, value);
        }
        source.insert(primary, primary_value);
    }

    source
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = if is_placeholder(&value, RANDOM) {
                random.value_for(&key)
            } else {
                value
            };
            (key, value)
        })
        .collect()
}

fn is_placeholder(value: &Value, placeholder: &str) -> bool {
    value.as_str() == Some(placeholder)
}
