//! Load-test configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default calls per second.
pub const DEFAULT_RATE: u32 = 100;

/// Default number of one-second windows.
pub const DEFAULT_DURATION: u32 = 1;

/// Default response time above which a call fails.
pub const DEFAULT_MAX_RESPONSE_TIME: Duration = Duration::from_secs(1);

/// Configuration for one load test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadTestConfig {
    /// Calls per one-second window (at least 1)
    pub rate: u32,
    /// Number of windows
    pub duration: u32,
    /// Calls slower than this fail
    #[serde(with = "millis")]
    pub max_response_time: Duration,
    /// Clear paused and ignored services before every call
    pub reset_breakers: bool,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RATE,
            duration: DEFAULT_DURATION,
            max_response_time: DEFAULT_MAX_RESPONSE_TIME,
            reset_breakers: false,
        }
    }
}

impl LoadTestConfig {
    /// Set the call rate.
    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Set the number of windows.
    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = duration;
        self
    }

    /// Set the failure threshold.
    pub fn with_max_response_time(mut self, max: Duration) -> Self {
        self.max_response_time = max;
        self
    }

    /// Clear breakers before every call.
    pub fn with_reset_breakers(mut self, reset: bool) -> Self {
        self.reset_breakers = reset;
        self
    }

    /// Rate clamped to at least one call per window.
    pub fn effective_rate(&self) -> u32 {
        self.rate.max(1)
    }

    /// Gap between calls within a window.
    pub fn call_spacing(&self) -> Duration {
        Duration::from_secs(1) / self.effective_rate()
    }

    /// Number of calls the run makes.
    pub fn total_calls(&self) -> u64 {
        u64::from(self.effective_rate()) * u64::from(self.duration)
    }

    /// Offsets from the start at which each call begins, produced lazily.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> {
        let spacing = self.call_spacing();
        let rate = self.effective_rate();
        (0..self.duration).flat_map(move |window| {
            let window_start = Duration::from_secs(u64::from(window));
            (1..=rate).map(move |idx| window_start + spacing * idx)
        })
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
