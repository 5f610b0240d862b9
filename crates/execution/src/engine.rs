//! The execution engine - drains a resolved plan.

use crate::config::ExecutionConfig;
use crate::request::{build_request, interpret_response};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::Value;
use servicepath_core::{
    InputMap, NetworkSpec, PlanNode, RequestOptions, ServiceDefinition, ServiceKind, ServiceOutcome,
    ServicePath, ServiceStatRecord, WorkingInputSet, RETURNED_NULL,
};
use servicepath_registry::{HttpRequest, ServiceRegistry};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs plans against a shared registry.
///
/// Nodes whose sources are present run concurrently on the caller's task:
/// ```text
/// Dispatch ready nodes → Await one → Integrate → Rescan
/// ```
/// The drain ends when nothing is running and nothing is ready.
pub struct ExecutionEngine {
    registry: Arc<ServiceRegistry>,
    config: ExecutionConfig,
}

impl ExecutionEngine {
    /// Create an engine over a registry.
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            config: ExecutionConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Configuration.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Registry used for bindings, breakers and stats.
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Execute a plan from caller inputs and return the resulting set.
    pub async fn execute_service_path(&self, path: &ServicePath, inputs: &InputMap) -> WorkingInputSet {
        let mut set = WorkingInputSet::new(inputs);
        let mut remaining: Vec<PlanNode> = path.nodes().to_vec();
        let mut running = FuturesUnordered::new();

        loop {
            let (ready, waiting): (Vec<PlanNode>, Vec<PlanNode>) = remaining
                .into_iter()
                .partition(|node| node.is_ready(&set, self.config.require_optional_inputs));
            remaining = waiting;

            for node in ready {
                let snapshot = set.clone();
                running.push(async move {
                    let outcome = self.execute_service(&node, &snapshot).await;
                    (node, outcome)
                });
            }

            let Some((node, outcome)) = running.next().await else {
                break;
            };
            self.integrate(&node, outcome, &mut set).await;
        }

        if !remaining.is_empty() {
            let keys: Vec<&str> = remaining.iter().map(|node| node.key()).collect();
            debug!("Services never satisfied: {:?}", keys);
        }

        set
    }

    /// Execute one node against a set.
    pub async fn execute_service(&self, node: &PlanNode, set: &WorkingInputSet) -> ServiceOutcome {
        match &node.service.kind {
            ServiceKind::Network(network) => self.execute_network(node, network, set).await,
            ServiceKind::Function(function) => self.execute_function(node, &function.function, set).await,
            ServiceKind::Unknown(kind) => {
                warn!("Unhandled service type '{}' for service '{}'", kind, node.key());
                ServiceOutcome::NoOutput
            }
        }
    }

    async fn execute_network(
        &self,
        node: &PlanNode,
        network: &NetworkSpec,
        set: &WorkingInputSet,
    ) -> ServiceOutcome {
        let service = node.service.clone();
        info!("Executing network service: {}", service.name);

        let key = format!("{}:{}:{}", service.name, network.address, set.signature());
        let request = build_request(network, &node.inputs, set);
        let response_key = network.response_key.clone();
        let registry = self.registry.clone();

        self.registry
            .in_flight_requests()
            .run(&key, move || call_network(registry, service, request, response_key))
            .await
    }

    async fn execute_function(&self, node: &PlanNode, function_name: &str, set: &WorkingInputSet) -> ServiceOutcome {
        let service = &node.service;
        info!("Executing function service: {}", service.name);

        let Some(function) = self.registry.function(function_name).await else {
            warn!("Cannot find function: {}", function_name);
            self.registry
                .add_service_stats(
                    ServiceStatRecord::new(&service.key)
                        .with_warning(format!("Cannot find function: {}", function_name)),
                )
                .await;
            return ServiceOutcome::NoOutput;
        };

        let args: Vec<Value> = node
            .inputs
            .iter()
            .map(|input| {
                set.get(&input.source)
                    .filter(|value| !value.is_null())
                    .cloned()
                    .unwrap_or(Value::Bool(false))
            })
            .collect();

        let started = Instant::now();
        let result = AssertUnwindSafe(function.call(args)).catch_unwind().await;
        let record = ServiceStatRecord::new(&service.key).with_response_time(started.elapsed().as_secs_f64());

        match result {
            Ok(Ok(Some(value))) if !value.is_null() => {
                self.registry.add_service_stats(record).await;
                ServiceOutcome::from_value(value, true)
            }
            Ok(Ok(_)) => {
                self.registry.add_service_stats(record.with_warning(RETURNED_NULL)).await;
                ServiceOutcome::Remove
            }
            Ok(Err(err)) => {
                let message = err.to_string();
                self.registry.add_service_stats(record.with_error(&message)).await;
                ServiceOutcome::Error(message)
            }
            Err(payload) => {
                let message = panic_message(payload);
                self.registry.add_service_stats(record.with_error(&message)).await;
                ServiceOutcome::Error(message)
            }
        }
    }

    /// Apply an outcome to the set and the circuit breaker.
    async fn integrate(&self, node: &PlanNode, outcome: ServiceOutcome, set: &mut WorkingInputSet) {
        let service = &node.service;
        match outcome {
            ServiceOutcome::Remove => {
                debug!("Ignoring service for this session: {}", service.name);
                self.registry.ignore_service(&service.key).await;
            }
            ServiceOutcome::Error(message) => {
                error!("{}: {}", service.name, message);
                self.registry.pause_service(&service.key).await;
            }
            ServiceOutcome::Warning(message) => {
                warn!("{}: {}", service.name, message);
                self.registry.pause_service(&service.key).await;
            }
            ServiceOutcome::NoOutput => {}
            ServiceOutcome::Value(value) => {
                set.insert_first(&service.output, value);
            }
        }
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("session", &self.registry.session_id())
            .field("config", &self.config)
            .finish()
    }
}

async fn call_network(
    registry: Arc<ServiceRegistry>,
    service: Arc<ServiceDefinition>,
    request: HttpRequest,
    response_key: Option<String>,
) -> ServiceOutcome {
    let options = RequestOptions {
        uri: request.uri(),
        method: request.method,
        timeout_ms: u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX),
    };
    debug!("Request: {} {}", options.method, options.uri);

    let started = Instant::now();
    let sent = registry.transport().send(request).await;
    let record = ServiceStatRecord::new(&service.key)
        .with_response_time(started.elapsed().as_secs_f64())
        .with_request_options(options);

    let interpreted = match sent {
        Ok(response) => {
            debug!("Response body: {}", shorten(&response.body));
            interpret_response(&response.body, response_key.as_deref())
        }
        Err(err) => Err(err.to_string()),
    };

    match interpreted {
        Err(message) => {
            registry.add_service_stats(record.with_error(&message)).await;
            ServiceOutcome::Error(message)
        }
        Ok(Value::Null) => {
            registry.add_service_stats(record.with_warning(RETURNED_NULL)).await;
            ServiceOutcome::Warning(RETURNED_NULL.to_string())
        }
        Ok(value) => {
            registry.add_service_stats(record).await;
            ServiceOutcome::from_value(value, false)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "function panicked".to_string())
}

fn shorten(body: &str) -> String {
    const LIMIT: usize = 100;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
