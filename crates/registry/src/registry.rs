//! The service registry session.

use crate::breaker::{BreakerMode, CircuitBreaker};
use crate::config::RegistryConfig;
use crate::connectivity::{probe, ConnectivityCache};
use crate::function::{default_binding, FunctionMergeMode, FunctionTable, ServiceFunction};
use crate::inflight::InFlightRequests;
use crate::transport::{ReqwestTransport, Transport};
use futures::future::join_all;
use servicepath_core::{
    inputs_satisfied, Catalog, ServiceDefinition, ServiceKind, ServiceOutcome, ServiceStatRecord,
    SessionId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Warning recorded when a probe fails.
pub const CANNOT_CONNECT: &str = "Cannot connect";

/// Errors raised while configuring a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A binding's declared arity does not match a service using it
    #[error("Function '{function}' takes {declared} arguments but service '{service}' declares {expected} inputs")]
    ArityMismatch {
        /// Function name
        function: String,
        /// Service key
        service: String,
        /// Declared inputs of the service
        expected: usize,
        /// Declared arity of the binding
        declared: usize,
    },
}

#[derive(Default)]
struct Bindings {
    explicit: FunctionTable,
    defaults: FunctionTable,
}

/// Shared catalog, function table and failure state for resolution sessions.
///
/// Share it with `Arc`: every clone of the `Arc` observes the same pauses,
/// ignores, probe results and in-flight requests. Separate registries share
/// nothing.
pub struct ServiceRegistry {
    session: SessionId,
    config: RegistryConfig,
    transport: Arc<dyn Transport>,
    catalog: RwLock<Catalog>,
    bindings: RwLock<Bindings>,
    breaker: Mutex<CircuitBreaker>,
    connectivity: Mutex<ConnectivityCache>,
    probes: InFlightRequests<bool>,
    requests: InFlightRequests<ServiceOutcome>,
    changed: AtomicBool,
    stats: Mutex<Vec<ServiceStatRecord>>,
}

impl ServiceRegistry {
    /// Create a registry using the reqwest transport.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    /// Create a registry with a custom transport.
    pub fn with_transport(config: RegistryConfig, transport: Arc<dyn Transport>) -> Self {
        let session = SessionId::new();
        debug!(%session, "Creating service registry");

        Self {
            session,
            breaker: Mutex::new(CircuitBreaker::new(config.pause_window)),
            connectivity: Mutex::new(ConnectivityCache::new(config.connectivity_ttl)),
            config,
            transport,
            catalog: RwLock::new(Catalog::new()),
            bindings: RwLock::new(Bindings::default()),
            probes: InFlightRequests::new(),
            requests: InFlightRequests::new(),
            changed: AtomicBool::new(false),
            stats: Mutex::new(Vec::new()),
        }
    }

    /// Session identifier.
    pub fn session_id(&self) -> SessionId {
        self.session
    }

    /// Configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Transport used for network services and probes.
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// In-flight network requests.
    pub fn in_flight_requests(&self) -> &InFlightRequests<ServiceOutcome> {
        &self.requests
    }

    // ----- catalog and functions -----

    /// Replace the catalog and the function table.
    pub async fn setup(&self, catalog: Catalog, functions: FunctionTable) -> Result<(), RegistryError> {
        validate_arity(&catalog, &functions)?;

        let mut current = self.catalog.write().await;
        let mut bindings = self.bindings.write().await;
        bindings.defaults = generate_defaults(&catalog, &functions);
        bindings.explicit = functions;
        *current = catalog;

        info!(session = %self.session, "Registry set up");
        Ok(())
    }

    /// Replace the catalog. Default bindings are regenerated.
    pub async fn set_registry(&self, catalog: Catalog) {
        let mut current = self.catalog.write().await;
        let mut bindings = self.bindings.write().await;
        bindings.defaults = generate_defaults(&catalog, &bindings.explicit);
        debug!("Registry holds {} services", catalog.len());
        *current = catalog;
    }

    /// Drop every service.
    pub async fn clear_registry(&self) {
        self.set_registry(Catalog::new()).await;
    }

    /// Replace or merge function bindings.
    pub async fn set_functions(&self, functions: FunctionTable, mode: FunctionMergeMode) -> Result<(), RegistryError> {
        let catalog = self.catalog.read().await;
        let mut bindings = self.bindings.write().await;

        let mut table = match mode {
            FunctionMergeMode::Replace => FunctionTable::new(),
            FunctionMergeMode::Merge => bindings.explicit.clone(),
        };
        table.merge(&functions);
        validate_arity(&catalog, &table)?;

        bindings.defaults = generate_defaults(&catalog, &table);
        bindings.explicit = table;
        Ok(())
    }

    /// Drop every explicit binding. Defaults are regenerated.
    pub async fn clear_functions(&self) {
        let catalog = self.catalog.read().await;
        let mut bindings = self.bindings.write().await;
        bindings.explicit = FunctionTable::new();
        bindings.defaults = generate_defaults(&catalog, &bindings.explicit);
    }

    /// Binding for a function name, explicit bindings first.
    pub async fn function(&self, name: &str) -> Option<Arc<dyn ServiceFunction>> {
        let bindings = self.bindings.read().await;
        bindings
            .explicit
            .get(name)
            .or_else(|| bindings.defaults.get(name))
            .cloned()
    }

    /// Look up a service.
    pub async fn get_service(&self, key: &str) -> Option<Arc<ServiceDefinition>> {
        self.catalog.read().await.get(key).cloned()
    }

    /// Every service in catalog order.
    pub async fn services(&self) -> Vec<Arc<ServiceDefinition>> {
        self.catalog.read().await.iter().cloned().collect()
    }

    // ----- matching -----

    /// Whether a service's inputs are all available.
    pub fn match_service_input_types<S: AsRef<str>>(
        service: &ServiceDefinition,
        available: &[S],
        require_optional: bool,
    ) -> bool {
        inputs_satisfied(&service.inputs, available, require_optional)
    }

    /// Every matchable service, in catalog order.
    ///
    /// A service matches when it is enabled and not circuit-broken, its
    /// required inputs are in `available` (when given), it produces `output`
    /// (when given) and, for network services, its address is reachable.
    pub async fn get_services(
        &self,
        available: Option<&[String]>,
        output: Option<&str>,
    ) -> Vec<Arc<ServiceDefinition>> {
        let candidates = self.services().await;

        let candidates: Vec<Arc<ServiceDefinition>> = {
            let mut breaker = self.breaker.lock().await;
            candidates
                .into_iter()
                .filter(|service| service.enabled && !breaker.is_disabled(&service.key))
                .filter(|service| {
                    available
                        .map(|types| Self::match_service_input_types(service, types, false))
                        .unwrap_or(true)
                })
                .filter(|service| output.map(|o| service.output == o).unwrap_or(true))
                .collect()
        };

        let checks = candidates.into_iter().map(|service| async move {
            let matched = match &service.kind {
                ServiceKind::Function(_) => true,
                ServiceKind::Network(_) => self.is_reachable(&service).await,
                ServiceKind::Unknown(kind) => {
                    warn!("Unhandled service type '{}' for service '{}'", kind, service.key);
                    false
                }
            };
            matched.then_some(service)
        });

        join_all(checks).await.into_iter().flatten().collect()
    }

    /// Whether a network service's address answers its status endpoint.
    ///
    /// Services without a status path are always reachable. Results are
    /// cached per address and concurrent probes of one service are coalesced.
    pub async fn is_reachable(&self, service: &ServiceDefinition) -> bool {
        let Some(network) = service.network() else {
            return true;
        };
        let Some(status_path) = network.status_path.clone() else {
            return true;
        };

        if let Some(reachable) = self.connectivity.lock().await.get(&network.address) {
            return reachable;
        }

        let key = format!("{}:{}", service.name, network.address);
        let transport = self.transport.clone();
        let spec = network.clone();
        let reachable = self
            .probes
            .run(&key, move || async move { probe(transport, &spec, &status_path).await })
            .await;

        self.connectivity.lock().await.record(&network.address, reachable);

        if !reachable {
            warn!("Cannot connect to: {} ({})", service.name, network.address);
            self.add_service_stats(ServiceStatRecord::new(&service.key).with_warning(CANNOT_CONNECT))
                .await;
        }

        reachable
    }

    /// Forget every cached probe result.
    pub async fn clear_connectivity_cache(&self) {
        self.connectivity.lock().await.clear();
    }

    // ----- circuit breaker -----

    /// Disable a service for the pause window.
    pub async fn pause_service(&self, key: &str) {
        self.breaker.lock().await.pause(key);
        self.changed.store(true, Ordering::SeqCst);
        debug!("Paused service {}", key);
    }

    /// Disable a service until ignores are cleared.
    pub async fn ignore_service(&self, key: &str) {
        self.breaker.lock().await.ignore(key);
        self.changed.store(true, Ordering::SeqCst);
        debug!("Ignored service {}", key);
    }

    /// Whether a service is paused or ignored.
    pub async fn is_service_disabled(&self, key: &str) -> bool {
        self.breaker.lock().await.is_disabled(key)
    }

    /// Breaker mode of a service.
    pub async fn breaker_mode(&self, key: &str) -> Option<BreakerMode> {
        let mut breaker = self.breaker.lock().await;
        if breaker.is_disabled(key) {
            breaker.mode(key)
        } else {
            None
        }
    }

    /// Lift every pause.
    pub async fn clear_paused_services(&self) {
        self.breaker.lock().await.clear_paused();
    }

    /// Lift every ignore.
    pub async fn clear_ignored_services(&self) {
        self.breaker.lock().await.clear_ignored();
    }

    /// Lift every pause and ignore.
    pub async fn clear_all_disabled_services(&self) {
        self.breaker.lock().await.clear_all();
    }

    /// Whether a pause or ignore happened since the flag was last cleared.
    pub fn has_registry_changed(&self) -> bool {
        self.changed.load(Ordering::SeqCst)
    }

    /// Reset the change flag.
    pub fn clear_registry_changed(&self) {
        self.changed.store(false, Ordering::SeqCst);
    }

    // ----- stats -----

    /// Append a stat record.
    pub async fn add_service_stats(&self, record: ServiceStatRecord) {
        self.stats.lock().await.push(record);
    }

    /// Every stat record so far.
    pub async fn get_service_stats(&self) -> Vec<ServiceStatRecord> {
        self.stats.lock().await.clone()
    }

    /// Drop every stat record.
    pub async fn clear_service_stats(&self) {
        self.stats.lock().await.clear();
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("session", &self.session)
            .field("config", &self.config)
            .field("changed", &self.has_registry_changed())
            .finish_non_exhaustive()
    }
}

fn validate_arity(catalog: &Catalog, functions: &FunctionTable) -> Result<(), RegistryError> {
    for service in catalog.iter() {
        let Some(name) = service.function_name() else {
            continue;
        };
        let Some(declared) = functions.get(name).and_then(|f| f.arity()) else {
            continue;
        };
        if declared != service.inputs.len() {
            return Err(RegistryError::ArityMismatch {
                function: name.to_string(),
                service: service.key.clone(),
                expected: service.inputs.len(),
                declared,
            });
        }
    }
    Ok(())
}

fn generate_defaults(catalog: &Catalog, explicit: &FunctionTable) -> FunctionTable {
    let mut defaults = FunctionTable::new();
    for service in catalog.iter() {
        let Some(name) = service.function_name() else {
            continue;
        };
        if explicit.contains(name) || defaults.contains(name) || service.inputs.is_empty() {
            continue;
        }
        debug!("Generating default binding for function '{}'", name);
        defaults.insert(name, default_binding(name));
    }
    defaults
}
