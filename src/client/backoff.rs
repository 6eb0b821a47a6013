//! Exponential backoff for client reconnection

use std::time::Duration;

/// Reconnect backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay for the first reconnect attempt
    pub base_delay: Duration,
    /// Upper bound of the multiplier applied to `base_delay`
    pub max_multiplier: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(10),
            max_multiplier: 64,
        }
    }
}

/// Doubling multiplier over a fixed base delay
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: BackoffConfig,
    multiplier: u32,
}

impl ReconnectBackoff {
    /// Create a new backoff with default configuration
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    /// Create a new backoff with custom configuration
    pub fn with_config(config: BackoffConfig) -> Self {
        Self {
            config,
            multiplier: 1,
        }
    }

    /// Delay for the attempt being scheduled; doubles the multiplier for the next one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.config.base_delay * self.multiplier;
        let cap = self.config.max_multiplier.max(1);
        self.multiplier = self.multiplier.saturating_mul(2).min(cap);
        delay
    }

    /// Reset after a successful open
    pub fn reset(&mut self) {
        self.multiplier = 1;
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}
