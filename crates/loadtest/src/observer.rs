//! Load-test progress callbacks.

use crate::config::LoadTestConfig;
use crate::stats::LoadTestStats;
use tracing::info;

/// Receives load-test progress.
pub trait LoadTestObserver: Send + Sync {
    /// Called once before the first call.
    fn on_start(&self, _config: &LoadTestConfig) {}

    /// Called after every call except the last with the running aggregate.
    fn on_sample(&self, _stats: &LoadTestStats) {}

    /// Called once with the final aggregate.
    fn on_finish(&self, _stats: &LoadTestStats) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl LoadTestObserver for NoopObserver {}

/// Observer that logs progress through tracing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LoadTestObserver for TracingObserver {
    fn on_start(&self, config: &LoadTestConfig) {
        info!("Testing path load at a rate of {}/s for {}s", config.effective_rate(), config.duration);
    }

    fn on_sample(&self, stats: &LoadTestStats) {
        info!("{}", stats);
    }

    fn on_finish(&self, stats: &LoadTestStats) {
        info!("Finished: {}", stats);
    }
}
