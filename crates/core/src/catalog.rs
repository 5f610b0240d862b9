//! Declarative service catalog.
//!
//! A catalog is a JSON object mapping service keys to entries. A key may hold
//! several `;`-separated aliases, each of which becomes its own service. Entry
//! order is preserved and decides tie-breaks during path resolution.

use crate::input::InputSpec;
use crate::service::{
    CostAttributes, FieldType, FunctionSpec, NetworkSpec, RequestField, RequestMethod,
    ServiceDefinition, ServiceKind, DEFAULT_ACCURACY,
};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Separator between aliases in a catalog key.
pub const ALIAS_SEPARATOR: char = ';';

/// Errors raised while loading a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Input was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Top level was not an object
    #[error("Catalog must be a JSON object")]
    NotAnObject,

    /// An entry had the wrong shape
    #[error("Invalid catalog entry '{key}': {source}")]
    InvalidEntry {
        /// Catalog key
        key: String,
        /// Underlying error
        source: serde_json::Error,
    },

    /// An entry declared no output
    #[error("Catalog entry '{0}' has no output")]
    MissingOutput(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRequestField {
    key: Option<String>,
    val: Option<Value>,
    #[serde(rename = "type")]
    field_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    kind: Option<String>,
    input: Option<OneOrMany>,
    inputs: Option<OneOrMany>,
    output: Option<String>,
    function: Option<String>,
    address: Option<String>,
    output_api_path: Option<String>,
    request_type: Option<String>,
    request_data: Option<IndexMap<String, RawRequestField>>,
    headers: Option<IndexMap<String, String>>,
    response_key: Option<String>,
    output_timeout: Option<u64>,
    status_api_path: Option<String>,
    status_timeout: Option<u64>,
    accuracy: Option<f64>,
    latency: Option<f64>,
    cost: Option<f64>,
    enabled: Option<bool>,
}

/// Ordered set of service definitions keyed by service key.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    services: IndexMap<String, Arc<ServiceDefinition>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Build a catalog from a JSON value.
    pub fn from_value(value: &Value) -> Result<Self, CatalogError> {
        let object = value.as_object().ok_or(CatalogError::NotAnObject)?;
        let mut catalog = Self::new();

        for (keys, raw) in object {
            let entry: CatalogEntry =
                serde_json::from_value(raw.clone()).map_err(|source| CatalogError::InvalidEntry {
                    key: keys.clone(),
                    source,
                })?;

            for key in keys.split(ALIAS_SEPARATOR).map(str::trim).filter(|k| !k.is_empty()) {
                let definition = convert_entry(key, &entry)?;
                catalog.insert(definition);
            }
        }

        Ok(catalog)
    }

    /// Insert or replace a definition under its key.
    pub fn insert(&mut self, definition: ServiceDefinition) {
        self.services.insert(definition.key.clone(), Arc::new(definition));
    }

    /// Look up a service by key.
    pub fn get(&self, key: &str) -> Option<&Arc<ServiceDefinition>> {
        self.services.get(key)
    }

    /// Services in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ServiceDefinition>> {
        self.services.values()
    }

    /// Number of services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl FromIterator<ServiceDefinition> for Catalog {
    fn from_iter<T: IntoIterator<Item = ServiceDefinition>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for definition in iter {
            catalog.insert(definition);
        }
        catalog
    }
}

fn convert_entry(key: &str, entry: &CatalogEntry) -> Result<ServiceDefinition, CatalogError> {
    let output = entry
        .output
        .clone()
        .filter(|o| !o.is_empty())
        .ok_or_else(|| CatalogError::MissingOutput(key.to_string()))?;

    let raw_inputs = match (&entry.input, &entry.inputs) {
        (Some(input), _) => input.to_vec(),
        (None, Some(inputs)) => inputs.to_vec(),
        (None, None) => Vec::new(),
    };
    let inputs: Vec<InputSpec> = raw_inputs.iter().map(|raw| InputSpec::parse(raw)).collect();

    let kind_name = entry.kind.clone().unwrap_or_else(|| "unknown".to_string());
    let kind = match kind_name.as_str() {
        "network" => ServiceKind::Network(network_spec(key, entry)),
        "function" => ServiceKind::Function(FunctionSpec {
            function: entry.function.clone().unwrap_or_else(|| key.to_string()),
        }),
        other => {
            warn!("Unhandled service type '{}' for service '{}'", other, key);
            ServiceKind::Unknown(other.to_string())
        }
    };

    Ok(ServiceDefinition {
        key: key.to_string(),
        name: ServiceDefinition::synthesize_name(&inputs, &output),
        kind,
        inputs,
        output,
        cost: CostAttributes {
            accuracy: entry.accuracy.unwrap_or(DEFAULT_ACCURACY),
            latency: entry.latency.unwrap_or(0.0),
            cost: entry.cost.unwrap_or(0.0),
        },
        enabled: entry.enabled.unwrap_or(true),
    })
}

fn network_spec(key: &str, entry: &CatalogEntry) -> NetworkSpec {
    let mut spec = NetworkSpec::new(entry.address.clone().unwrap_or_else(|| key.to_string()));
    spec.path = entry.output_api_path.clone().unwrap_or_default();
    spec.method = entry
        .request_type
        .as_deref()
        .map(RequestMethod::parse)
        .unwrap_or(RequestMethod::Get);
    spec.headers = entry.headers.clone().unwrap_or_default();
    spec.response_key = entry.response_key.clone().filter(|k| !k.is_empty());
    spec.status_path = entry.status_api_path.clone().filter(|p| !p.is_empty());

    if let Some(ms) = entry.output_timeout {
        spec.timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = entry.status_timeout {
        spec.status_timeout = Duration::from_millis(ms);
    }

    spec.request_template = entry.request_data.as_ref().map(|fields| {
        fields
            .iter()
            .map(|(input, field)| {
                let field_type = field.field_type.as_deref().and_then(|raw| {
                    let parsed = FieldType::parse(raw);
                    if parsed.is_none() {
                        warn!("Unknown request field type '{}' on service '{}'", raw, key);
                    }
                    parsed
                });
                let field = RequestField {
                    key: field.key.clone(),
                    value: field.val.clone(),
                    field_type,
                };
                (input.clone(), field)
            })
            .collect()
    });

    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aliases_expand_into_separate_services() {
        let catalog = Catalog::from_value(&json!({
            "double;twice": { "type": "function", "input": "A", "output": "B" }
        }))
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("double").unwrap().function_name(), Some("double"));
        assert_eq!(catalog.get("twice").unwrap().function_name(), Some("twice"));
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let catalog = Catalog::from_json_str(
            r#"{"z": {"type": "function", "output": "A"}, "a": {"type": "function", "output": "B"}}"#,
        )
        .unwrap();

        let keys: Vec<&str> = catalog.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_inputs_alias_and_name_synthesis() {
        let catalog = Catalog::from_value(&json!({
            "sum": { "type": "function", "inputs": ["A?", "B"], "output": "C" }
        }))
        .unwrap();

        let sum = catalog.get("sum").unwrap();
        assert_eq!(sum.name, "A?+B=>C");
        assert_eq!(sum.inputs, vec![InputSpec::Optional("A".into()), InputSpec::Required("B".into())]);
    }

    #[test]
    fn test_network_defaults() {
        let catalog = Catalog::from_value(&json!({
            "localhost:5000": {
                "type": "network",
                "input": "imageUrl",
                "output": "label",
                "output_api_path": "predict",
                "request_type": "POST",
                "response_key": "result->label",
                "request_data": { "imageUrl": { "key": "image->url", "type": "string" } }
            }
        }))
        .unwrap();

        let service = catalog.get("localhost:5000").unwrap();
        let network = service.network().unwrap();
        assert_eq!(network.address, "localhost:5000");
        assert_eq!(network.method, RequestMethod::Post);
        assert_eq!(network.timeout, Duration::from_millis(1000));
        assert_eq!(network.status_timeout, Duration::from_millis(250));
        assert_eq!(network.response_key.as_deref(), Some("result->label"));

        let template = network.request_template.as_ref().unwrap();
        assert_eq!(template["imageUrl"].key.as_deref(), Some("image->url"));
        assert_eq!(template["imageUrl"].field_type, Some(FieldType::String));
    }

    #[test]
    fn test_unknown_type_is_kept() {
        let catalog = Catalog::from_value(&json!({
            "odd": { "type": "carrier-pigeon", "output": "A" }
        }))
        .unwrap();

        assert_eq!(
            catalog.get("odd").unwrap().kind,
            ServiceKind::Unknown("carrier-pigeon".into())
        );
    }

    #[test]
    fn test_cost_attributes_and_enabled() {
        let catalog = Catalog::from_value(&json!({
            "slow": { "type": "function", "output": "A", "accuracy": 80, "latency": 3, "enabled": false }
        }))
        .unwrap();

        let slow = catalog.get("slow").unwrap();
        assert_eq!(slow.edge_weight(), 24.0);
        assert!(!slow.enabled);
    }

    #[test]
    fn test_malformed_entries_are_errors() {
        assert!(matches!(
            Catalog::from_value(&json!([1, 2])),
            Err(CatalogError::NotAnObject)
        ));
        assert!(matches!(
            Catalog::from_value(&json!({ "x": { "type": "function" } })),
            Err(CatalogError::MissingOutput(_))
        ));
        assert!(matches!(
            Catalog::from_value(&json!({ "x": { "type": "function", "output": 5 } })),
            Err(CatalogError::InvalidEntry { .. })
        ));
        assert!(matches!(
            Catalog::from_value(&json!({ "x": "nope" })),
            Err(CatalogError::InvalidEntry { .. })
        ));
    }
}
