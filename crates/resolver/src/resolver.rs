//! Shortest-path plan resolution.

use crate::diagnostics::NearMiss;
use crate::relax::{relax, Relaxation};
use indexmap::{IndexMap, IndexSet};
use servicepath_core::{PlanNode, ServiceDefinition, ServicePath, NULL_TYPE};
use servicepath_registry::ServiceRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Edge weights of the services used for one output, keyed by service name.
pub type PathDistances = IndexMap<String, f64>;

/// Most recent path per output type.
pub type PathsUsed = IndexMap<String, PathDistances>;

/// Everything learned while resolving one output.
#[derive(Debug, Clone, Default)]
pub struct PathSearch {
    /// Requested output type
    pub output: String,
    /// Resolved plan, empty when unreachable or already available
    pub path: ServicePath,
    /// Shortest distance per reachable type
    pub distances: IndexMap<String, f64>,
    /// Types reachable from the inputs
    pub frontier: Vec<String>,
    /// Producers of the output that could not be used
    pub near_misses: Vec<NearMiss>,
}

impl PathSearch {
    /// Whether a plan was found or the output was already available.
    pub fn is_resolved(&self) -> bool {
        self.distances.contains_key(&self.output)
    }
}

/// Finds minimum-cost service chains from available types to an output.
pub struct PathResolver {
    registry: Arc<ServiceRegistry>,
    paths_used: Mutex<PathsUsed>,
}

impl PathResolver {
    /// Create a resolver over a registry.
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            paths_used: Mutex::new(PathsUsed::new()),
        }
    }

    /// Registry used for discovery.
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Resolve the plan producing `output` from `available` types.
    pub async fn get_service_path<S: AsRef<str>>(&self, available: &[S], output: &str) -> ServicePath {
        self.search(available, output).await.path
    }

    /// Resolve a plan and keep the distances and diagnostics.
    pub async fn search<S: AsRef<str>>(&self, available: &[S], output: &str) -> PathSearch {
        let available: Vec<String> = available.iter().map(|t| t.as_ref().to_string()).collect();
        info!("Getting service path for \"{}\":\"{}\"", available.join("+"), output);

        if available.iter().any(|t| t == output) {
            return PathSearch {
                output: output.to_string(),
                distances: available.iter().map(|t| (t.clone(), 0.0)).collect(),
                frontier: available,
                ..Default::default()
            };
        }

        let (frontier, discovered) = self.grow_frontier(&available).await;
        let relaxation = relax(&discovered, &available, &frontier);
        debug!("Distances: {:?}", relaxation.distances);

        let frontier: Vec<String> = frontier.into_iter().collect();

        if !relaxation.best.contains_key(output) {
            let near_misses = self.diagnose_missing_output(&frontier, output).await;
            return PathSearch {
                output: output.to_string(),
                distances: relaxation.distances,
                frontier,
                near_misses,
                ..Default::default()
            };
        }

        let path = build_plan(&relaxation, &available, output);
        debug!("Service path: [{}]", path);

        let distances: PathDistances = path
            .nodes()
            .iter()
            .map(|node| (node.service.name.clone(), node.service.edge_weight()))
            .collect();
        self.paths_used.lock().await.insert(output.to_string(), distances);

        PathSearch {
            output: output.to_string(),
            path,
            distances: relaxation.distances,
            frontier,
            near_misses: Vec::new(),
        }
    }

    /// Producers of `output` and the required inputs each is missing.
    pub async fn diagnose_missing_output(&self, frontier: &[String], output: &str) -> Vec<NearMiss> {
        warn!("No path found for output type: {}", output);

        let producers = self.registry.get_services(None, Some(output)).await;
        producers
            .iter()
            .map(|service| {
                let miss = NearMiss::for_service(service, frontier);
                warn!("- {}", miss);
                miss
            })
            .collect()
    }

    /// Most recent path per output type.
    pub async fn service_paths_used(&self) -> PathsUsed {
        self.paths_used.lock().await.clone()
    }

    /// Forget recorded paths.
    pub async fn clear_service_paths_used(&self) {
        self.paths_used.lock().await.clear();
    }

    /// Grow the set of reachable types until a round adds nothing new.
    ///
    /// Services are returned in discovery order.
    async fn grow_frontier(&self, available: &[String]) -> (IndexSet<String>, Vec<Arc<ServiceDefinition>>) {
        let mut frontier: IndexSet<String> = available.iter().cloned().collect();
        frontier.insert(NULL_TYPE.to_string());
        let mut discovered: IndexMap<String, Arc<ServiceDefinition>> = IndexMap::new();

        loop {
            let types: Vec<String> = frontier.iter().cloned().collect();
            let matched = self.registry.get_services(Some(types.as_slice()), None).await;

            let mut grew = false;
            for service in matched {
                grew |= frontier.insert(service.output.clone());
                discovered.entry(service.key.clone()).or_insert(service);
            }

            if !grew {
                break;
            }
        }

        (frontier, discovered.into_values().collect())
    }
}

impl std::fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolver")
            .field("session", &self.registry.session_id())
            .finish_non_exhaustive()
    }
}

/// Walk best producers back from `output`, dependencies first.
///
/// Each service appears once. Available types and `NULL` end a branch; a type
/// without a producer is logged and ends its branch.
pub fn build_plan(relaxation: &Relaxation, available: &[String], output: &str) -> ServicePath {
    let mut plan = Vec::new();
    let mut placed = HashSet::new();
    let mut visiting = HashSet::new();
    visit(output, relaxation, available, &mut visiting, &mut placed, &mut plan);
    ServicePath::new(plan)
}

fn visit(
    type_name: &str,
    relaxation: &Relaxation,
    available: &[String],
    visiting: &mut HashSet<String>,
    placed: &mut HashSet<String>,
    plan: &mut Vec<PlanNode>,
) {
    if type_name == NULL_TYPE || available.iter().any(|t| t == type_name) {
        return;
    }

    let Some(edge) = relaxation.best.get(type_name) else {
        warn!("No best service for: {}", type_name);
        return;
    };

    if placed.contains(&edge.service.key) || !visiting.insert(type_name.to_string()) {
        return;
    }

    for input in &edge.inputs {
        visit(&input.source, relaxation, available, visiting, placed, plan);
    }

    placed.insert(edge.service.key.clone());
    plan.push(PlanNode::new(edge.service.clone(), edge.inputs.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use servicepath_core::Catalog;
    use servicepath_registry::{
        HttpRequest, HttpResponse, RegistryConfig, Transport, TransportError,
    };

    struct Offline;

    #[async_trait]
    impl Transport for Offline {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Connect("offline".into()))
        }
    }

    async fn resolver(catalog: serde_json::Value) -> PathResolver {
        let registry = ServiceRegistry::with_transport(RegistryConfig::default(), Arc::new(Offline));
        registry.set_registry(Catalog::from_value(&catalog).unwrap()).await;
        PathResolver::new(Arc::new(registry))
    }

    fn aggregation_catalog(optional: bool) -> serde_json::Value {
        let (ab, cd) = if optional {
            (json!(["totalAB?", "totalCD?"]), json!(["C?", "D?"]))
        } else {
            (json!(["totalAB", "totalCD"]), json!(["C", "D"]))
        };
        let ab_inputs = if optional { json!(["A?", "B?"]) } else { json!(["A", "B"]) };
        json!({
            "totalAB": { "type": "function", "inputs": ab_inputs, "output": "totalAB" },
            "totalCD": { "type": "function", "inputs": cd, "output": "totalCD" },
            "totalABCD": { "type": "function", "inputs": ab, "output": "totalABCD" },
            "relabel": { "type": "function", "input": "totalABCD", "output": "equivalentTotalABCD" }
        })
    }

    #[tokio::test]
    async fn test_output_already_available_gives_empty_plan() {
        let resolver = resolver(json!({ "a": { "type": "function", "input": "A", "output": "B" } })).await;

        let search = resolver.search(&["A", "B"], "B").await;

        assert!(search.path.is_empty());
        assert!(search.is_resolved());
    }

    #[tokio::test]
    async fn test_chain_is_ordered_dependencies_first() {
        let resolver = resolver(json!({
            "second": { "type": "function", "input": "B", "output": "C" },
            "first": { "type": "function", "input": "A", "output": "B" }
        }))
        .await;

        let path = resolver.get_service_path(&["A"], "C").await;

        assert_eq!(path.keys(), vec!["first", "second"]);
        let used = resolver.service_paths_used().await;
        assert_eq!(used["C"]["A=>B"], 1.0);
        assert_eq!(used["C"]["B=>C"], 1.0);

        resolver.clear_service_paths_used().await;
        assert!(resolver.service_paths_used().await.is_empty());
    }

    #[tokio::test]
    async fn test_nested_optional_aggregation_binds_missing_leaves_to_null() {
        let resolver = resolver(aggregation_catalog(true)).await;

        let path = resolver.get_service_path(&["A", "C"], "equivalentTotalABCD").await;

        assert_eq!(path.keys(), vec!["totalAB", "totalCD", "totalABCD", "relabel"]);
        let total_ab = &path.nodes()[0];
        assert_eq!(total_ab.inputs[0].source, "A");
        assert!(total_ab.inputs[1].is_null());
        let total = &path.nodes()[2];
        assert_eq!(total.inputs[0].source, "totalAB");
        assert_eq!(total.inputs[1].source, "totalCD");
    }

    #[tokio::test]
    async fn test_required_aggregation_with_missing_leaves_is_unresolved() {
        let resolver = resolver(aggregation_catalog(false)).await;

        let search = resolver.search(&["A", "C"], "equivalentTotalABCD").await;

        assert!(search.path.is_empty());
        assert!(!search.is_resolved());
        assert!(!search.frontier.contains(&"totalAB".to_string()));
        assert_eq!(search.near_misses.len(), 1);
        assert_eq!(search.near_misses[0].missing_inputs, vec!["totalABCD".to_string()]);
    }

    #[tokio::test]
    async fn test_near_misses_name_missing_inputs() {
        let resolver = resolver(json!({
            "sum": { "type": "function", "input": ["A", "B"], "output": "C" }
        }))
        .await;

        let search = resolver.search(&["A"], "C").await;

        assert_eq!(search.near_misses.len(), 1);
        assert_eq!(search.near_misses[0].service_key, "sum");
        assert_eq!(search.near_misses[0].missing_inputs, vec!["B".to_string()]);
    }

    #[tokio::test]
    async fn test_guards_resolve_through_guard_service() {
        let resolver = resolver(json!({
            "switch==on": { "type": "function", "input": "switch", "output": "switch==on" },
            "outcome": { "type": "function", "inputs": ["A", "switch==on"], "output": "outcome" }
        }))
        .await;

        let path = resolver.get_service_path(&["A", "switch"], "outcome").await;

        assert_eq!(path.keys(), vec!["switch==on", "outcome"]);
    }

    #[tokio::test]
    async fn test_paused_service_is_routed_around() {
        let resolver = resolver(json!({
            "fast": { "type": "function", "input": "A", "output": "B" },
            "slow": { "type": "function", "input": "A", "output": "B", "latency": 10 }
        }))
        .await;

        assert_eq!(resolver.get_service_path(&["A"], "B").await.keys(), vec!["fast"]);

        resolver.registry().pause_service("fast").await;
        assert_eq!(resolver.get_service_path(&["A"], "B").await.keys(), vec!["slow"]);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let resolver = resolver(aggregation_catalog(true)).await;

        let first = resolver.get_service_path(&["A", "C"], "equivalentTotalABCD").await;
        let second = resolver.get_service_path(&["A", "C"], "equivalentTotalABCD").await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unreachable_network_service_is_skipped() {
        let resolver = resolver(json!({
            "remote": {
                "type": "network",
                "address": "localhost:1",
                "status_api_path": "status",
                "input": "A",
                "output": "B"
            },
            "local": { "type": "function", "input": "A", "output": "B", "latency": 50 }
        }))
        .await;

        assert_eq!(resolver.get_service_path(&["A"], "B").await.keys(), vec!["local"]);
    }
}
