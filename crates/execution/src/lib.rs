//! servicepath execution - runs resolved plans.
//!
//! The [`ExecutionEngine`] drains a plan concurrently and integrates each
//! outcome into the working set and the circuit breaker. The
//! [`Orchestrator`] wraps resolution and execution in a bounded retry loop.

#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod inputs;
pub mod orchestrator;
pub mod request;

#[cfg(test)]
mod testing;

pub use config::{ExecutionConfig, OrchestratorConfig, DEFAULT_MAX_TRIES};
pub use engine::ExecutionEngine;
pub use inputs::{clean_inputs, RandomData, RANDOM, RANDOM_PRIMARY, RANDOM_SECONDARY};
pub use orchestrator::Orchestrator;
