//! Service definitions.

use crate::input::InputSpec;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::error;

/// Default accuracy of a service (0-100).
pub const DEFAULT_ACCURACY: f64 = 100.0;

/// Default timeout of a network service call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default timeout of a connectivity probe.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_millis(250);

/// `[http[s]://]host[:port][/prefix]`
const ADDRESS_PATTERN: &str = r"^(?:(https?)://)?([^/:]+)(?::(\d+))?(/.*)?$";

/// A registered service: a typed function from inputs to one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Unique key (one alias of the catalog entry)
    pub key: String,

    /// Diagnostic name, `inputs=>output`
    pub name: String,

    /// How the service is invoked
    pub kind: ServiceKind,

    /// Declared inputs in invocation order
    pub inputs: Vec<InputSpec>,

    /// Produced type
    pub output: String,

    /// Cost attributes used as edge weight
    pub cost: CostAttributes,

    /// Disabled services never match
    pub enabled: bool,
}

impl ServiceDefinition {
    /// Synthesize the diagnostic name of a service.
    pub fn synthesize_name(inputs: &[InputSpec], output: &str) -> String {
        let inputs: Vec<String> = inputs.iter().map(|i| i.to_string()).collect();
        format!("{}=>{}", inputs.join("+"), output)
    }

    /// Scalar edge weight for path resolution.
    pub fn edge_weight(&self) -> f64 {
        self.cost.edge_weight()
    }

    /// Whether this is a network service.
    pub fn is_network(&self) -> bool {
        matches!(self.kind, ServiceKind::Network(_))
    }

    /// Whether this is a function service.
    pub fn is_function(&self) -> bool {
        matches!(self.kind, ServiceKind::Function(_))
    }

    /// Network settings, if any.
    pub fn network(&self) -> Option<&NetworkSpec> {
        match &self.kind {
            ServiceKind::Network(spec) => Some(spec),
            _ => None,
        }
    }

    /// Bound function name, if any.
    pub fn function_name(&self) -> Option<&str> {
        match &self.kind {
            ServiceKind::Function(spec) => Some(spec.function.as_str()),
            _ => None,
        }
    }

    /// Type names of required inputs and equality guards.
    pub fn required_type_names(&self) -> Vec<String> {
        self.inputs
            .iter()
            .filter(|i| !i.is_optional())
            .map(|i| i.type_name())
            .collect()
    }
}

/// Invocation kind of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServiceKind {
    /// Remote HTTP call
    Network(NetworkSpec),

    /// Local bound function
    Function(FunctionSpec),

    /// Unrecognized kind, kept for diagnostics only
    Unknown(String),
}

impl ServiceKind {
    /// Short label used in logs.
    pub fn label(&self) -> &str {
        match self {
            Self::Network(_) => "network",
            Self::Function(_) => "function",
            Self::Unknown(kind) => kind.as_str(),
        }
    }
}

/// Cost attributes combined into the edge weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostAttributes {
    /// Accuracy, 0-100
    pub accuracy: f64,

    /// Expected latency
    pub latency: f64,

    /// Monetary or other cost
    pub cost: f64,
}

impl CostAttributes {
    /// `(100 - accuracy) + latency + cost + 1`
    pub fn edge_weight(&self) -> f64 {
        (100.0 - self.accuracy) + self.latency + self.cost + 1.0
    }
}

impl Default for CostAttributes {
    fn default() -> Self {
        Self {
            accuracy: DEFAULT_ACCURACY,
            latency: 0.0,
            cost: 0.0,
        }
    }
}

/// Settings of a function service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Name of the bound callable
    pub function: String,
}

/// Settings of a network service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Raw address, `host[:port]` with optional scheme
    pub address: String,

    /// Path appended to the address (may contain `{type}` placeholders)
    pub path: String,

    /// HTTP method
    pub method: RequestMethod,

    /// Per-input request fields, replaces the default mapping when present
    pub request_template: Option<IndexMap<String, RequestField>>,

    /// Extra request headers
    pub headers: IndexMap<String, String>,

    /// `a->b->c` path into the response body
    pub response_key: Option<String>,

    /// Call timeout
    pub timeout: Duration,

    /// Path of the status endpoint used for connectivity probes
    pub status_path: Option<String>,

    /// Probe timeout
    pub status_timeout: Duration,
}

impl NetworkSpec {
    /// Create settings for an address with defaults everywhere else.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            path: String::new(),
            method: RequestMethod::Get,
            request_template: None,
            headers: IndexMap::new(),
            response_key: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            status_path: None,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
        }
    }

    /// Parsed address.
    pub fn parsed_address(&self) -> ServiceAddress {
        ServiceAddress::parse(&self.address)
    }
}

/// HTTP method of a network service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    /// Inputs go into the query string
    Get,
    /// Inputs go into a JSON body
    Post,
}

impl RequestMethod {
    /// Parse a catalog `request_type`; anything but POST is GET.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("post") {
            Self::Post
        } else {
            Self::Get
        }
    }

    /// Method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One templated request field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestField {
    /// Request key, `->` separated for nesting (defaults to the input type)
    pub key: Option<String>,

    /// Literal value (defaults to the input value)
    pub value: Option<Value>,

    /// Coercion applied to the value
    pub field_type: Option<FieldType>,
}

/// Coercion of a templated request value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Text
    String,
    /// Floating point number
    Number,
    /// Whole number
    Integer,
    /// true / false
    Boolean,
    /// Parsed JSON
    Json,
}

impl FieldType {
    /// Parse a catalog `type` value.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "string" | "str" => Some(Self::String),
            "number" | "float" => Some(Self::Number),
            "integer" | "int" => Some(Self::Integer),
            "boolean" | "bool" => Some(Self::Boolean),
            "json" | "object" | "raw" => Some(Self::Json),
            _ => None,
        }
    }

    /// Coerce a value; values that cannot be converted are returned as-is.
    pub fn coerce(&self, value: Value) -> Value {
        match self {
            Self::String => match value {
                Value::String(_) => value,
                Value::Null => Value::String(String::new()),
                other => Value::String(other.to_string()),
            },
            Self::Number => match &value {
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(value),
                Value::Bool(b) => Value::from(if *b { 1 } else { 0 }),
                _ => value,
            },
            Self::Integer => match &value {
                Value::String(s) => s.trim().parse::<i64>().map(Value::from).unwrap_or(value),
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                    .map(Value::from)
                    .unwrap_or(value),
                Value::Bool(b) => Value::from(if *b { 1 } else { 0 }),
                _ => value,
            },
            Self::Boolean => match &value {
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => Value::Bool(true),
                    "false" | "0" | "no" | "off" | "" => Value::Bool(false),
                    _ => value,
                },
                Value::Number(n) => Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
                Value::Null => Value::Bool(false),
                _ => value,
            },
            Self::Json => match &value {
                Value::String(s) => serde_json::from_str(s).unwrap_or(value),
                _ => value,
            },
        }
    }
}

/// A parsed `host[:port]` address with optional scheme and path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAddress {
    /// https when true
    pub secure: bool,

    /// Host name
    pub host: String,

    /// Port, defaulted from the scheme
    pub port: u16,

    /// Path prefix without trailing slash
    pub prefix: String,
}

impl ServiceAddress {
    /// Parse an address string.
    pub fn parse(address: &str) -> Self {
        let address = address.trim();
        let plain = || Self {
            secure: false,
            host: address.to_string(),
            port: 80,
            prefix: String::new(),
        };

        let re = match Regex::new(ADDRESS_PATTERN) {
            Ok(re) => re,
            Err(e) => {
                error!("Invalid address pattern: {}", e);
                return plain();
            }
        };
        let Some(captures) = re.captures(address) else {
            return plain();
        };

        let secure = captures.get(1).map(|m| m.as_str() == "https").unwrap_or(false);
        let host = captures.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
        let port = captures
            .get(3)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(if secure { 443 } else { 80 });
        let prefix = captures
            .get(4)
            .map(|m| m.as_str().trim_end_matches('/').to_string())
            .unwrap_or_default();

        Self { secure, host, port, prefix }
    }

    /// `scheme://host:port[/prefix]`
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.prefix)
    }

    /// Base URL joined with a relative path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_edge_weight_defaults() {
        assert_eq!(CostAttributes::default().edge_weight(), 1.0);

        let cost = CostAttributes { accuracy: 90.0, latency: 5.0, cost: 2.0 };
        assert_eq!(cost.edge_weight(), 18.0);
    }

    #[test]
    fn test_synthesize_name() {
        let inputs = vec![InputSpec::parse("A?"), InputSpec::parse("B")];
        assert_eq!(ServiceDefinition::synthesize_name(&inputs, "C"), "A?+B=>C");
        assert_eq!(ServiceDefinition::synthesize_name(&[], "C"), "=>C");
    }

    #[test]
    fn test_address_pattern_compiles() {
        assert!(Regex::new(ADDRESS_PATTERN).is_ok());
    }

    #[test]
    fn test_address_plain_host() {
        let address = ServiceAddress::parse("localhost");
        assert_eq!(address.base_url(), "http://localhost:80");
        assert_eq!(address.url_for("status"), "http://localhost:80/status");
    }

    #[test]
    fn test_address_with_scheme_port_and_prefix() {
        let address = ServiceAddress::parse("https://api.example.com:8443/v1/");
        assert!(address.secure);
        assert_eq!(address.port, 8443);
        assert_eq!(address.url_for("/predict"), "https://api.example.com:8443/v1/predict");
    }

    #[test]
    fn test_address_defaults_https_port() {
        let address = ServiceAddress::parse("https://example.com");
        assert_eq!(address.base_url(), "https://example.com:443");
    }

    #[test]
    fn test_request_method_parse() {
        assert_eq!(RequestMethod::parse("post"), RequestMethod::Post);
        assert_eq!(RequestMethod::parse("GET"), RequestMethod::Get);
        assert_eq!(RequestMethod::parse("PUT"), RequestMethod::Get);
    }

    #[test]
    fn test_field_type_coercion() {
        assert_eq!(FieldType::String.coerce(json!(5)), json!("5"));
        assert_eq!(FieldType::Number.coerce(json!("2.5")), json!(2.5));
        assert_eq!(FieldType::Integer.coerce(json!("42")), json!(42));
        assert_eq!(FieldType::Integer.coerce(json!(4.7)), json!(4));
        assert_eq!(FieldType::Boolean.coerce(json!("yes")), json!(true));
        assert_eq!(FieldType::Json.coerce(json!("{\"a\":1}")), json!({"a": 1}));
        assert_eq!(FieldType::Number.coerce(json!("abc")), json!("abc"));
    }

    #[test]
    fn test_field_type_parse() {
        assert_eq!(FieldType::parse("INT"), Some(FieldType::Integer));
        assert_eq!(FieldType::parse("blob"), None);
    }
}
