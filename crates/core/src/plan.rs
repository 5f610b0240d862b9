//! Resolved service paths.

use crate::input::InputSpec;
use crate::service::ServiceDefinition;
use crate::working_set::{WorkingInputSet, NULL_TYPE};
use std::sync::Arc;

/// A declared input together with the type it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundInput {
    /// Declared input
    pub spec: InputSpec,

    /// Type read from the working set (`NULL` for unreachable optional inputs)
    pub source: String,
}

impl BoundInput {
    /// Bind an input to a source type.
    pub fn new(spec: InputSpec, source: impl Into<String>) -> Self {
        Self { spec, source: source.into() }
    }

    /// Whether the input was bound to `NULL`.
    pub fn is_null(&self) -> bool {
        self.source == NULL_TYPE
    }
}

/// One service of a plan with its bound inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    /// Service to execute
    pub service: Arc<ServiceDefinition>,

    /// One binding per declared input, in declaration order
    pub inputs: Vec<BoundInput>,
}

impl PlanNode {
    /// Create a node.
    pub fn new(service: Arc<ServiceDefinition>, inputs: Vec<BoundInput>) -> Self {
        Self { service, inputs }
    }

    /// Node whose inputs read their own declared types.
    pub fn unbound(service: Arc<ServiceDefinition>) -> Self {
        let inputs = service
            .inputs
            .iter()
            .map(|spec| BoundInput::new(spec.clone(), spec.type_name()))
            .collect();
        Self { service, inputs }
    }

    /// Service key.
    pub fn key(&self) -> &str {
        &self.service.key
    }

    /// Whether every counted source is present in `set`.
    ///
    /// Optional inputs only count when `require_optional` is set.
    pub fn is_ready(&self, set: &WorkingInputSet, require_optional: bool) -> bool {
        self.inputs
            .iter()
            .filter(|input| input.spec.counts_for_match(require_optional))
            .all(|input| set.contains(&input.source))
    }
}

/// Ordered list of plan nodes, satisfiable nodes first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServicePath {
    nodes: Vec<PlanNode>,
}

impl ServicePath {
    /// Create a path from nodes.
    pub fn new(nodes: Vec<PlanNode>) -> Self {
        Self { nodes }
    }

    /// Plan nodes in execution order.
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// Consume into nodes.
    pub fn into_nodes(self) -> Vec<PlanNode> {
        self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Service keys in execution order.
    pub fn keys(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.service.key.clone()).collect()
    }
}

impl std::fmt::Display for ServicePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.nodes.iter().map(|n| n.service.name.as_str()).collect();
        f.write_str(&names.join(" -> "))
    }
}
