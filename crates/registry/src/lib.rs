//! servicepath service registry.
//!
//! The registry is the shared session state behind resolution: the catalog,
//! function bindings, the per-service circuit breaker, connectivity probing
//! and in-flight request coalescing.

#![warn(missing_docs)]

mod breaker;
mod config;
mod connectivity;
mod function;
mod inflight;
mod registry;
mod transport;

pub use breaker::{BreakerMode, CircuitBreaker};
pub use config::{RegistryConfig, DEFAULT_CONNECTIVITY_TTL, DEFAULT_PAUSE_WINDOW};
pub use connectivity::{interpret_status_body, ConnectivityCache};
pub use function::{
    async_service_fn, default_binding, service_fn, AsyncFn, EqualityFunction, FunctionMergeMode,
    FunctionTable, IdentityFunction, ServiceFunction, SyncFn,
};
pub use inflight::InFlightRequests;
pub use registry::{RegistryError, ServiceRegistry, CANNOT_CONNECT};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
