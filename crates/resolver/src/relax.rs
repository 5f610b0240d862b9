//! Edge relaxation over discovered services.
//!
//! Distances start at 0 for every available type and for `NULL`. Each service
//! is an edge from its bound input types to its output; relaxation repeats
//! until no distance improves. A first pass binds optional inputs to their own
//! type whenever the frontier contains it. A second pass lets optional inputs
//! whose type never got a finite distance fall back to `NULL`.

use indexmap::{IndexMap, IndexSet};
use servicepath_core::{BoundInput, InputSpec, ServiceDefinition, NULL_TYPE};
use std::sync::Arc;

/// The service currently giving the shortest distance to a type.
#[derive(Debug, Clone)]
pub struct BestEdge {
    /// Producing service
    pub service: Arc<ServiceDefinition>,
    /// Input bindings used for the distance
    pub inputs: Vec<BoundInput>,
    /// Edge weight of the service
    pub weight: f64,
}

/// Outcome of relaxation.
#[derive(Debug, Clone, Default)]
pub struct Relaxation {
    /// Shortest known distance per type
    pub distances: IndexMap<String, f64>,
    /// Best producer per type
    pub best: IndexMap<String, BestEdge>,
}

impl Relaxation {
    /// Distance of a type, infinite when unknown.
    pub fn distance(&self, type_name: &str) -> f64 {
        self.distances.get(type_name).copied().unwrap_or(f64::INFINITY)
    }
}

/// Relax every discovered service until distances are stable.
///
/// `services` must be in discovery order; on equal distances the first
/// discovered service keeps the type.
pub fn relax<S: AsRef<str>>(
    services: &[Arc<ServiceDefinition>],
    available: &[S],
    frontier: &IndexSet<String>,
) -> Relaxation {
    let mut result = Relaxation::default();
    result.distances.insert(NULL_TYPE.to_string(), 0.0);
    for type_name in available {
        result.distances.insert(type_name.as_ref().to_string(), 0.0);
    }

    let max_rounds = services.len() + 1;
    for fallback in [false, true] {
        for _ in 0..max_rounds {
            if !relax_round(services, frontier, fallback, &mut result) {
                break;
            }
        }
    }

    result
}

fn relax_round(
    services: &[Arc<ServiceDefinition>],
    frontier: &IndexSet<String>,
    fallback: bool,
    result: &mut Relaxation,
) -> bool {
    let mut improved = false;

    for service in services {
        let inputs = bind_inputs(service, frontier, fallback, result);
        let weight = service.edge_weight();
        let candidate = inputs
            .iter()
            .fold(weight, |total, input| total + result.distance(&input.source));

        if candidate.is_finite() && candidate < result.distance(&service.output) {
            result.distances.insert(service.output.clone(), candidate);
            result.best.insert(
                service.output.clone(),
                BestEdge { service: service.clone(), inputs, weight },
            );
            improved = true;
        }
    }

    improved
}

fn bind_inputs(
    service: &ServiceDefinition,
    frontier: &IndexSet<String>,
    fallback: bool,
    result: &Relaxation,
) -> Vec<BoundInput> {
    service
        .inputs
        .iter()
        .map(|spec| {
            let source = match spec {
                InputSpec::Optional(name) => {
                    let reachable = frontier.contains(name)
                        && (!fallback || result.distance(name).is_finite());
                    if reachable {
                        name.clone()
                    } else {
                        NULL_TYPE.to_string()
                    }
                }
                other => other.type_name(),
            };
            BoundInput::new(spec.clone(), source)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use servicepath_core::Catalog;

    fn services(value: serde_json::Value) -> Vec<Arc<ServiceDefinition>> {
        Catalog::from_value(&value).unwrap().iter().cloned().collect()
    }

    fn frontier(types: &[&str]) -> IndexSet<String> {
        types.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_prefers_cheaper_chain() {
        let services = services(json!({
            "direct": { "type": "function", "input": "A", "output": "C", "accuracy": 90 },
            "first": { "type": "function", "input": "A", "output": "B" },
            "second": { "type": "function", "input": "B", "output": "C" }
        }));

        let result = relax(&services, &["A"], &frontier(&["A", "B", "C", "NULL"]));

        assert_eq!(result.distance("C"), 2.0);
        assert_eq!(result.best["C"].service.key, "second");
    }

    #[test]
    fn test_ties_keep_first_discovered() {
        let services = services(json!({
            "one": { "type": "function", "input": "A", "output": "B" },
            "two": { "type": "function", "input": "A", "output": "B" }
        }));

        let result = relax(&services, &["A"], &frontier(&["A", "B", "NULL"]));

        assert_eq!(result.best["B"].service.key, "one");
    }

    #[test]
    fn test_missing_optional_binds_null() {
        let services = services(json!({
            "sum": { "type": "function", "input": ["A?", "B"], "output": "C" }
        }));

        let result = relax(&services, &["B"], &frontier(&["B", "C", "NULL"]));

        let best = &result.best["C"];
        assert!(best.inputs[0].is_null());
        assert_eq!(best.inputs[1].source, "B");
        assert_eq!(result.distance("C"), 1.0);
    }

    #[test]
    fn test_optional_cycle_falls_back_to_null() {
        let services = services(json!({
            "grow": { "type": "function", "input": "X?", "output": "Y" },
            "back": { "type": "function", "input": "Y", "output": "X" }
        }));

        let result = relax(&services, &[] as &[&str], &frontier(&["X", "Y", "NULL"]));

        assert_eq!(result.distance("Y"), 1.0);
        assert_eq!(result.distance("X"), 2.0);
        assert!(result.best["Y"].inputs[0].is_null());
    }

    #[test]
    fn test_available_types_are_never_replaced() {
        let services = services(json!({
            "again": { "type": "function", "input": "A", "output": "A" }
        }));

        let result = relax(&services, &["A"], &frontier(&["A", "NULL"]));

        assert_eq!(result.distance("A"), 0.0);
        assert!(result.best.is_empty());
    }
}
