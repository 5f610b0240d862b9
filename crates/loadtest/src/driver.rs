//! Rate-scheduled load testing of one output.

use crate::config::LoadTestConfig;
use crate::observer::LoadTestObserver;
use crate::stats::LoadTestStats;
use futures::stream::{FuturesUnordered, StreamExt};
use servicepath_core::{InputMap, RunId};
use servicepath_execution::Orchestrator;
use std::sync::Arc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// Result of one load-test call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Response time in seconds
    pub response_time: f64,
    /// Whether the call passed
    pub passed: bool,
}

/// Drives repeated resolutions of an output at a fixed rate.
///
/// Every call cleans the inputs, resolves a fresh plan and executes it once
/// without retries. Calls share the orchestrator's registry.
pub struct LoadTestDriver {
    orchestrator: Arc<Orchestrator>,
}

impl LoadTestDriver {
    /// Create a driver.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Orchestrator used for every call.
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Run the load test and return the final aggregate.
    pub async fn run(
        &self,
        inputs: &InputMap,
        output: &str,
        config: &LoadTestConfig,
        observer: &dyn LoadTestObserver,
    ) -> LoadTestStats {
        let run = RunId::new();
        info!(%run, rate = config.effective_rate(), duration = config.duration, "Starting load test for {}", output);
        observer.on_start(config);

        let started = Instant::now();
        let total = config.total_calls();
        let mut schedule = config.schedule().peekable();
        let mut calls = FuturesUnordered::new();
        let mut stats = LoadTestStats::new();

        // Calls start when their slot comes up, so only running calls are held.
        loop {
            let next_start = schedule.peek().map(|offset| started + *offset);
            tokio::select! {
                Some(sample) = calls.next(), if !calls.is_empty() => {
                    let sample: Sample = sample;
                    stats.record(sample.response_time, sample.passed);
                    if (stats.total() as u64) < total {
                        observer.on_sample(&stats);
                    }
                }
                _ = sleep_until(next_start.unwrap_or(started)), if next_start.is_some() => {
                    schedule.next();
                    calls.push(self.sample(inputs, output, config));
                }
                else => break,
            }
        }

        info!(%run, "Load test finished: {}", stats);
        observer.on_finish(&stats);
        stats
    }

    /// One timed call.
    pub async fn sample(&self, inputs: &InputMap, output: &str, config: &LoadTestConfig) -> Sample {
        let started = Instant::now();

        if config.reset_breakers {
            self.orchestrator.registry().clear_all_disabled_services().await;
        }
        let inputs = self.orchestrator.clean_inputs(inputs).await;
        let result = self.orchestrator.resolve_and_execute(&inputs, output).await;

        let response_time = started.elapsed().as_secs_f64();
        let produced = result.output_value(output).is_some();
        let passed = produced && response_time <= config.max_response_time.as_secs_f64();
        debug!(produced, response_time, "Load test call finished");

        Sample { response_time, passed }
    }
}

impl std::fmt::Debug for LoadTestDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTestDriver").field("orchestrator", &self.orchestrator).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use servicepath_core::Catalog;
    use servicepath_registry::{
        async_service_fn, service_fn, FunctionTable, RegistryConfig, ServiceRegistry,
    };
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        started: Mutex<usize>,
        samples: Mutex<Vec<LoadTestStats>>,
        finished: Mutex<Option<LoadTestStats>>,
    }

    impl LoadTestObserver for Recorder {
        fn on_start(&self, _config: &LoadTestConfig) {
            *self.started.lock().unwrap() += 1;
        }

        fn on_sample(&self, stats: &LoadTestStats) {
            self.samples.lock().unwrap().push(stats.clone());
        }

        fn on_finish(&self, stats: &LoadTestStats) {
            *self.finished.lock().unwrap() = Some(stats.clone());
        }
    }

    async fn driver(functions: FunctionTable) -> LoadTestDriver {
        let registry = ServiceRegistry::new(RegistryConfig::default());
        registry
            .setup(
                Catalog::from_value(&json!({
                    "label": { "type": "function", "input": "image", "output": "label" },
                    "slow": { "type": "function", "input": "image", "output": "caption" },
                    "flaky": { "type": "function", "input": "image", "output": "tags" }
                }))
                .unwrap(),
                functions,
            )
            .await
            .unwrap();
        LoadTestDriver::new(Arc::new(Orchestrator::new(Arc::new(registry))))
    }

    fn inputs() -> InputMap {
        serde_json::from_value(json!({ "image": "cat.jpg" })).unwrap()
    }

    fn slow_caption() -> FunctionTable {
        FunctionTable::new().with(
            "slow",
            async_service_fn(|_args: Vec<Value>| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok::<_, anyhow::Error>(Some(json!("a cat")))
            }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_calls_pass() {
        let driver = driver(FunctionTable::new()).await;
        let recorder = Recorder::default();
        let config = LoadTestConfig::default().with_rate(5).with_duration(2);

        let stats = driver.run(&inputs(), "label", &config, &recorder).await;

        assert_eq!(stats.pass_count, 10);
        assert_eq!(stats.fail_count, 0);
        assert_eq!(stats.fail_rate(), 0.0);
        assert_eq!(*recorder.started.lock().unwrap(), 1);
        assert_eq!(recorder.samples.lock().unwrap().len(), 9);
        assert_eq!(recorder.finished.lock().unwrap().as_ref(), Some(&stats));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_calls_fail() {
        let driver = driver(slow_caption()).await;
        let config = LoadTestConfig::default()
            .with_rate(2)
            .with_max_response_time(Duration::from_secs(1));

        let stats = driver.run(&inputs(), "caption", &config, &crate::NoopObserver).await;

        assert_eq!(stats.fail_count, 2);
        assert_eq!(stats.fail_rate(), 100.0);
        assert!(stats.fastest.unwrap() >= 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breakers_persist_unless_reset() {
        let functions = FunctionTable::new().with("flaky", service_fn(|_| Err(anyhow::anyhow!("down"))));
        let driver = driver(functions).await;
        let config = LoadTestConfig::default().with_rate(3);

        driver.run(&inputs(), "tags", &config, &crate::NoopObserver).await;
        let stats = driver.orchestrator().service_stats().await;
        assert_eq!(stats.iter().filter(|s| s.service_key == "flaky").count(), 1);

        driver.orchestrator().registry().clear_service_stats().await;
        driver
            .run(&inputs(), "tags", &config.with_reset_breakers(true), &crate::NoopObserver)
            .await;
        let stats = driver.orchestrator().service_stats().await;
        assert_eq!(stats.iter().filter(|s| s.service_key == "flaky").count(), 3);
    }
}
