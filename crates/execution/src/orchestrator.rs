//! Resolve-then-execute with bounded retries.

use crate::config::OrchestratorConfig;
use crate::engine::ExecutionEngine;
use crate::inputs::{clean_inputs, RandomData};
use serde_json::Value;
use servicepath_core::{InputMap, ServiceStatRecord, WorkingInputSet};
use servicepath_registry::ServiceRegistry;
use servicepath_resolver::{PathResolver, PathsUsed};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Entry point for resolving an output from caller inputs.
///
/// When the output is still missing after a run and the run changed the
/// circuit breaker, the orchestrator resolves again from everything gathered
/// so far. Ignored services are cleared once the call finishes.
pub struct Orchestrator {
    registry: Arc<ServiceRegistry>,
    resolver: PathResolver,
    engine: ExecutionEngine,
    config: OrchestratorConfig,
    random: Mutex<RandomData>,
}

impl Orchestrator {
    /// Create an orchestrator over a registry.
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self::with_config(registry, OrchestratorConfig::default())
    }

    /// Create an orchestrator with a configuration.
    pub fn with_config(registry: Arc<ServiceRegistry>, config: OrchestratorConfig) -> Self {
        Self {
            resolver: PathResolver::new(registry.clone()),
            engine: ExecutionEngine::new(registry.clone()).with_config(config.execution.clone()),
            registry,
            config,
            random: Mutex::new(RandomData::new()),
        }
    }

    /// Shared registry.
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Path resolver.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Execution engine.
    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Register random input data under a key.
    pub async fn set_random_data(&self, key: impl Into<String>, data: Value) {
        self.random.lock().await.set(key, data);
    }

    /// Drop `null` inputs and replace random placeholders.
    pub async fn clean_inputs(&self, inputs: &InputMap) -> InputMap {
        clean_inputs(inputs, &*self.random.lock().await)
    }

    /// Resolve `output` and return its usable value.
    pub async fn resolve(&self, inputs: &InputMap, output: &str) -> Option<Value> {
        self.get_and_execute_service_path(inputs, output, self.config.max_tries)
            .await
            .output_value(output)
    }

    /// Resolve and execute, retrying while the breaker keeps changing.
    ///
    /// `max_tries` counts retries after the first attempt.
    pub async fn get_and_execute_service_path(
        &self,
        inputs: &InputMap,
        output: &str,
        max_tries: usize,
    ) -> WorkingInputSet {
        let mut inputs = self.clean_inputs(inputs).await;
        let mut result = self.resolve_and_execute(&inputs, output).await;

        let mut tries = 0;
        while tries < max_tries && result.output_value(output).is_none() && self.registry.has_registry_changed() {
            tries += 1;
            self.registry.clear_registry_changed();

            warn!("Trying again... ({}/{})", tries, max_tries);
            inputs = self.clean_inputs(&result.to_input_map()).await;
            result = self.resolve_and_execute(&inputs, output).await;
        }

        self.registry.clear_ignored_services().await;
        result
    }

    /// One resolution and execution without retries.
    pub async fn resolve_and_execute(&self, inputs: &InputMap, output: &str) -> WorkingInputSet {
        let available: Vec<String> = inputs.keys().cloned().collect();
        let path = self.resolver.get_service_path(&available, output).await;
        info!("Executing service path: [{}]", path);
        self.engine.execute_service_path(&path, inputs).await
    }

    /// Stat records gathered so far.
    pub async fn service_stats(&self) -> Vec<ServiceStatRecord> {
        self.registry.get_service_stats().await
    }

    /// Most recent path per output type.
    pub async fn service_paths_used(&self) -> PathsUsed {
        self.resolver.service_paths_used().await
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("session", &self.registry.session_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
