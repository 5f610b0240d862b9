//! Classification of a single service execution.

use crate::working_set::{has_marker, value_text};
use serde_json::Value;

/// Message used when a service produced `null`.
pub const RETURNED_NULL: &str = "returned null";

/// Result of executing one plan node.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceOutcome {
    /// Usable value for the service's output type
    Value(Value),

    /// Failed call, pauses the service
    Error(String),

    /// Degraded call, pauses the service
    Warning(String),

    /// Function asked to be ignored for the rest of the session
    Remove,

    /// Nothing to integrate
    NoOutput,
}

impl ServiceOutcome {
    /// Classify a raw result value by its markers.
    ///
    /// `remove` is only honored when `allow_remove` is set (function services).
    pub fn from_value(value: Value, allow_remove: bool) -> Self {
        if value.is_null() {
            return Self::NoOutput;
        }
        if allow_remove && has_marker(&value, "remove") {
            return Self::Remove;
        }
        if has_marker(&value, "error") {
            return Self::Error(marker_text(&value, "error"));
        }
        if has_marker(&value, "warning") {
            return Self::Warning(marker_text(&value, "warning"));
        }
        Self::Value(value)
    }

    /// Whether the outcome carries a value.
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// The carried value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

fn marker_text(value: &Value, marker: &str) -> String {
    value.get(marker).map(value_text).unwrap_or_default()
}
