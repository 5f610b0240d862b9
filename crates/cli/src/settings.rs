//! Settings file for the command line.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use servicepath_execution::OrchestratorConfig;
use servicepath_loadtest::LoadTestConfig;
use servicepath_registry::RegistryConfig;
use std::path::Path;
use std::time::Duration;

/// Registry timings in milliseconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub pause_window_ms: Option<u64>,
    pub connectivity_ttl_ms: Option<u64>,
}

impl RegistrySettings {
    pub fn to_config(&self) -> RegistryConfig {
        let mut config = RegistryConfig::default();
        if let Some(ms) = self.pause_window_ms {
            config = config.with_pause_window(Duration::from_millis(ms));
        }
        if let Some(ms) = self.connectivity_ttl_ms {
            config = config.with_connectivity_ttl(Duration::from_millis(ms));
        }
        config
    }
}

/// Optional JSON settings.
///
/// ```json
/// {
///   "registry": { "pause_window_ms": 60000 },
///   "orchestrator": { "max_tries": 3, "execution": { "require_optional_inputs": true } },
///   "load_test": { "rate": 100, "duration": 1, "max_response_time": 1000 },
///   "random_data": { "KEYWORDS": ["book", "plant"] }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub registry: RegistrySettings,
    pub orchestrator: OrchestratorConfig,
    pub load_test: LoadTestConfig,
    pub random_data: IndexMap<String, Value>,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid settings file {}", path.display()))
    }
}
