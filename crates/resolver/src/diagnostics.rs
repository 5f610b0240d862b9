//! Near-miss reporting for unreachable outputs.

use serde::Serialize;
use servicepath_core::ServiceDefinition;

/// A service that produces the requested output but could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NearMiss {
    /// Service key
    pub service_key: String,
    /// Required inputs absent from the frontier
    pub missing_inputs: Vec<String>,
}

impl NearMiss {
    /// Compare a producer's required inputs against the frontier.
    pub fn for_service<S: AsRef<str>>(service: &ServiceDefinition, frontier: &[S]) -> Self {
        let missing_inputs = service
            .required_type_names()
            .into_iter()
            .filter(|name| !frontier.iter().any(|t| t.as_ref() == name))
            .collect();

        Self {
            service_key: service.key.clone(),
            missing_inputs,
        }
    }
}

impl std::fmt::Display for NearMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "could match {} but missing input types: {}",
            self.service_key,
            self.missing_inputs.join(",")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use servicepath_core::Catalog;

    #[test]
    fn test_lists_missing_required_inputs_only() {
        let catalog = Catalog::from_value(&json!({
            "total": { "type": "function", "input": ["A", "B", "C?", "mode==on"], "output": "T" }
        }))
        .unwrap();

        let miss = NearMiss::for_service(catalog.get("total").unwrap(), &["A"]);

        assert_eq!(miss.missing_inputs, vec!["B".to_string(), "mode==on".to_string()]);
        assert_eq!(miss.to_string(), "could match total but missing input types: B,mode==on");
    }
}
