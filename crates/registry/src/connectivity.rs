//! Connectivity probes and their cache.

use crate::transport::{HttpRequest, Transport};
use serde_json::Value;
use servicepath_core::NetworkSpec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct ConnectivityEntry {
    expiry: Instant,
    reachable: bool,
}

/// Probe results keyed by address.
#[derive(Debug)]
pub struct ConnectivityCache {
    entries: HashMap<String, ConnectivityEntry>,
    ttl: Duration,
}

impl ConnectivityCache {
    /// Create a cache with a TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Cached result for an address. Expired entries are evicted.
    pub fn get(&mut self, address: &str) -> Option<bool> {
        let entry = *self.entries.get(address)?;
        if entry.expiry <= Instant::now() {
            self.entries.remove(address);
            return None;
        }
        Some(entry.reachable)
    }

    /// Store a probe result.
    pub fn record(&mut self, address: &str, reachable: bool) {
        let expiry = Instant::now() + self.ttl;
        self.entries.insert(address.to_string(), ConnectivityEntry { expiry, reachable });
    }

    /// Forget every result.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Interpret a status endpoint body.
///
/// `status` of `ready` or `ok` means reachable, as does `processes` below
/// `cpu_count`. Anything else, including non-JSON, is unreachable.
pub fn interpret_status_body(body: &str) -> bool {
    let Ok(data) = serde_json::from_str::<Value>(body) else {
        warn!("Cannot parse service status response");
        return false;
    };

    if matches!(data.get("status").and_then(Value::as_str), Some("ready" | "ok")) {
        return true;
    }

    let processes = data.get("processes").and_then(Value::as_f64).unwrap_or(0.0);
    let cpu_count = data.get("cpu_count").and_then(Value::as_f64).unwrap_or(0.0);
    processes < cpu_count
}

/// Probe the status endpoint of a network service.
pub async fn probe(transport: Arc<dyn Transport>, network: &NetworkSpec, status_path: &str) -> bool {
    let url = network.parsed_address().url_for(status_path);
    let request = HttpRequest::get(url, network.status_timeout);
    debug!("Probing {}", request.url);

    match transport.send(request).await {
        Ok(response) => interpret_status_body(&response.body),
        Err(e) => {
            warn!("Cannot connect to service: {}", e);
            false
        }
    }
}
