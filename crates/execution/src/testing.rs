//! Test doubles shared by the engine and orchestrator tests.

use async_trait::async_trait;
use serde_json::Value;
use servicepath_core::Catalog;
use servicepath_registry::{
    FunctionTable, HttpRequest, HttpResponse, RegistryConfig, ServiceRegistry, Transport,
    TransportError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport answering from a table of URL to body.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, Result<String, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn respond(self, url: &str, body: &str) -> Self {
        self.responses.lock().unwrap().insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn fail(self, url: &str, error: TransportError) -> Self {
        self.responses.lock().unwrap().insert(url.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let response = self.responses.lock().unwrap().get(&request.url).cloned();
        match response {
            Some(Ok(body)) => Ok(HttpResponse::ok(body)),
            Some(Err(error)) => Err(error),
            None => Err(TransportError::Connect(format!("no route to {}", request.url))),
        }
    }
}

/// A registry over a JSON catalog and function table.
pub async fn registry_with(
    catalog: Value,
    functions: FunctionTable,
    transport: Arc<ScriptedTransport>,
) -> Arc<ServiceRegistry> {
    let registry = ServiceRegistry::with_transport(RegistryConfig::default(), transport);
    registry
        .setup(Catalog::from_value(&catalog).unwrap(), functions)
        .await
        .unwrap();
    Arc::new(registry)
}
