//! Registry configuration.

use std::time::Duration;

/// Default time a paused service stays disabled.
pub const DEFAULT_PAUSE_WINDOW: Duration = Duration::from_secs(60);

/// Default lifetime of a cached connectivity result.
pub const DEFAULT_CONNECTIVITY_TTL: Duration = Duration::from_secs(60);

/// Configuration for a [`crate::ServiceRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long `pause_service` disables a service
    pub pause_window: Duration,
    /// How long a probe result is reused per address
    pub connectivity_ttl: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            pause_window: DEFAULT_PAUSE_WINDOW,
            connectivity_ttl: DEFAULT_CONNECTIVITY_TTL,
        }
    }
}

impl RegistryConfig {
    /// Set the pause window.
    pub fn with_pause_window(mut self, window: Duration) -> Self {
        self.pause_window = window;
        self
    }

    /// Set the connectivity cache TTL.
    pub fn with_connectivity_ttl(mut self, ttl: Duration) -> Self {
        self.connectivity_ttl = ttl;
        self
    }
}
