//! Reconnection backoff.
//!
//! Pure computation: maps a consecutive-failure count to the next delay and
//! decides when to give up. Holds no state of its own; the client owns the
//! attempt counter.

use std::time::Duration;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
/// Default ceiling for any single retry delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);
/// Default number of retries before a client gives up.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Exponential backoff capped at `max_delay`, bounded by `max_retries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_retries,
        }
    }

    /// Delay before retry number `attempts` (1-based).
    ///
    /// `min(base * 2^(attempts-1), max)`. An `attempts` of 0 is treated as 1.
    pub fn delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether a client that has already retried `attempts` times may retry again.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }
}
