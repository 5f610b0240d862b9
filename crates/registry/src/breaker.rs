//! Per-service circuit breaker.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Why a service is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerMode {
    /// Disabled until the expiry passes
    Paused {
        /// When the pause ends
        expiry: Instant,
    },
    /// Disabled until ignores are cleared
    Ignored,
}

/// Disabled services keyed by service key.
#[derive(Debug)]
pub struct CircuitBreaker {
    entries: HashMap<String, BreakerMode>,
    pause_window: Duration,
}

impl CircuitBreaker {
    /// Create a breaker with a pause window.
    pub fn new(pause_window: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            pause_window,
        }
    }

    /// Pause a service for the pause window, replacing any existing entry.
    pub fn pause(&mut self, key: &str) {
        let expiry = Instant::now() + self.pause_window;
        self.entries.insert(key.to_string(), BreakerMode::Paused { expiry });
    }

    /// Ignore a service until ignores are cleared, replacing any existing entry.
    pub fn ignore(&mut self, key: &str) {
        self.entries.insert(key.to_string(), BreakerMode::Ignored);
    }

    /// Whether a service is disabled. Expired pauses are evicted.
    pub fn is_disabled(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            None => false,
            Some(BreakerMode::Ignored) => true,
            Some(BreakerMode::Paused { expiry }) => {
                if *expiry <= Instant::now() {
                    self.entries.remove(key);
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Current mode of a service, without eviction.
    pub fn mode(&self, key: &str) -> Option<BreakerMode> {
        self.entries.get(key).copied()
    }

    /// Drop every pause.
    pub fn clear_paused(&mut self) {
        self.entries.retain(|_, mode| !matches!(mode, BreakerMode::Paused { .. }));
    }

    /// Drop every ignore.
    pub fn clear_ignored(&mut self) {
        self.entries.retain(|_, mode| !matches!(mode, BreakerMode::Ignored));
    }

    /// Drop everything.
    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    /// Keys with an entry, sorted.
    pub fn disabled_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pause_expires_after_window() {
        let mut breaker = CircuitBreaker::new(Duration::from_secs(60));
        breaker.pause("svc");
        assert!(breaker.is_disabled("svc"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(breaker.is_disabled("svc"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!breaker.is_disabled("svc"));
        assert_eq!(breaker.mode("svc"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignore_is_permanent_until_cleared() {
        let mut breaker = CircuitBreaker::new(Duration::from_secs(1));
        breaker.ignore("svc");

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(breaker.is_disabled("svc"));

        breaker.clear_ignored();
        assert!(!breaker.is_disabled("svc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_replaces_ignore() {
        let mut breaker = CircuitBreaker::new(Duration::from_secs(60));
        breaker.ignore("svc");
        breaker.pause("svc");
        assert!(matches!(breaker.mode("svc"), Some(BreakerMode::Paused { .. })));

        breaker.clear_ignored();
        assert!(breaker.is_disabled("svc"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!breaker.is_disabled("svc"));
    }

    #[tokio::test]
    async fn test_ignore_replaces_pause() {
        let mut breaker = CircuitBreaker::new(Duration::from_secs(60));
        breaker.pause("svc");
        breaker.ignore("svc");
        assert_eq!(breaker.mode("svc"), Some(BreakerMode::Ignored));

        breaker.clear_paused();
        assert!(breaker.is_disabled("svc"));
    }

    #[tokio::test]
    async fn test_selective_clearing() {
        let mut breaker = CircuitBreaker::new(Duration::from_secs(60));
        breaker.pause("paused");
        breaker.ignore("ignored");

        breaker.clear_paused();
        assert_eq!(breaker.disabled_keys(), vec!["ignored".to_string()]);

        breaker.pause("paused");
        breaker.clear_all();
        assert!(breaker.disabled_keys().is_empty());
    }
}
