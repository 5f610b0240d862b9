//! Load-test aggregation.

use serde::Serialize;

/// Running pass/fail and response-time aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadTestStats {
    /// Calls that produced the output in time
    pub pass_count: usize,
    /// Calls that missed the output or ran too long
    pub fail_count: usize,
    /// Slowest response in seconds
    pub slowest: Option<f64>,
    /// Fastest response in seconds
    pub fastest: Option<f64>,
    /// Sum of response times in seconds
    pub total_response_time: f64,
}

impl LoadTestStats {
    /// Empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call.
    pub fn record(&mut self, response_time: f64, passed: bool) {
        if passed {
            self.pass_count += 1;
        } else {
            self.fail_count += 1;
        }

        self.total_response_time += response_time;
        self.slowest = Some(self.slowest.map_or(response_time, |s| s.max(response_time)));
        self.fastest = Some(self.fastest.map_or(response_time, |f| f.min(response_time)));
    }

    /// Calls recorded.
    pub fn total(&self) -> usize {
        self.pass_count + self.fail_count
    }

    /// Average response time in seconds, rounded to milliseconds.
    pub fn average(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        (self.total_response_time / self.total() as f64 * 1000.0).round() / 1000.0
    }

    /// Failed calls in percent, one decimal.
    pub fn fail_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        (self.fail_count as f64 / self.total() as f64 * 1000.0).round() / 10.0
    }
}

impl std::fmt::Display for LoadTestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (-{})   Avg. Fail: {}%, Worst: {}s, Avg.: {}s, Best: {}s",
            self.pass_count,
            self.fail_count,
            self.fail_rate(),
            self.slowest.unwrap_or(0.0),
            self.average(),
            self.fastest.unwrap_or(0.0)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregates() {
        let mut stats = LoadTestStats::new();
        stats.record(0.1, true);
        stats.record(0.4, false);
        stats.record(0.2, true);

        assert_eq!(stats.total(), 3);
        assert_eq!(stats.slowest, Some(0.4));
        assert_eq!(stats.fastest, Some(0.1));
        assert_eq!(stats.average(), 0.233);
        assert_eq!(stats.fail_rate(), 33.3);
    }

    #[test]
    fn test_empty_aggregate() {
        let stats = LoadTestStats::new();

        assert_eq!(stats.average(), 0.0);
        assert_eq!(stats.fail_rate(), 0.0);
        assert_eq!(stats.to_string(), "0 (-0)   Avg. Fail: 0%, Worst: 0s, Avg.: 0s, Best: 0s");
    }
}
