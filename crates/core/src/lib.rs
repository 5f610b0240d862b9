//! servicepath core data models.
//!
//! This crate defines the typed service catalog, the per-session working
//! input set and the plan structures shared by the registry, resolver and
//! execution crates.

#![warn(missing_docs)]

// Identities
mod id;

// Catalog
mod input;
mod service;
mod catalog;

// Execution state
mod working_set;
mod outcome;
mod plan;
mod stats;

// Re-exports
pub use id::*;

pub use input::{inputs_satisfied, InputSpec, GUARD_SEPARATOR, OPTIONAL_SUFFIX};
pub use service::{
    CostAttributes, FieldType, FunctionSpec, NetworkSpec, RequestField, RequestMethod,
    ServiceAddress, ServiceDefinition, ServiceKind, DEFAULT_ACCURACY, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_STATUS_TIMEOUT,
};
pub use catalog::{Catalog, CatalogError, ALIAS_SEPARATOR};

pub use working_set::{has_marker, is_truthy, value_text, InputMap, WorkingInputSet, NULL_TYPE};
pub use outcome::{ServiceOutcome, RETURNED_NULL};
pub use plan::{BoundInput, PlanNode, ServicePath};
pub use stats::{RequestOptions, ServiceStatRecord};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
