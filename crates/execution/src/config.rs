//! Engine and orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Default number of retries after a failed resolution.
pub const DEFAULT_MAX_TRIES: usize = 3;

/// Configuration for the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Whether optional sources must be present before a node runs
    pub require_optional_inputs: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            require_optional_inputs: true,
        }
    }
}

impl ExecutionConfig {
    /// Set whether optional sources gate dispatch.
    pub fn with_require_optional_inputs(mut self, require: bool) -> Self {
        self.require_optional_inputs = require;
        self
    }
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Retries allowed after the first attempt
    pub max_tries: usize,
    /// Engine configuration
    pub execution: ExecutionConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            execution: ExecutionConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Set the retry budget.
    pub fn with_max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Set the engine configuration.
    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }
}
