//! Exponential backoff calculator

use std::time::Duration;

/// Pause before the first retry unless configured otherwise
pub const DEFAULT_INITIAL_INTERVAL_MS: u64 = 1000;

const DEFAULT_MAX_INTERVAL_MS: u64 = 300_000;

/// Exponential backoff between retry attempts.
///
/// Delays double with each attempt (multiplier 2.0), capped at a maximum.
///
/// # Example
///
/// ```
/// use dbex_connection::retry::BackoffStrategy;
/// use std::time::Duration;
///
/// let backoff = BackoffStrategy::new(1000, 60_000);
/// assert_eq!(backoff.calculate_delay(0), Duration::from_millis(1000));
/// assert_eq!(backoff.calculate_delay(1), Duration::from_millis(2000));
/// assert_eq!(backoff.calculate_delay(10), Duration::from_millis(60_000));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffStrategy {
    /// Delay in milliseconds before the first retry
    initial_ms: u64,
    /// Cap for exponential growth
    max_ms: u64,
    /// Growth factor per attempt
    multiplier: f64,
}

impl BackoffStrategy {
    /// Create a strategy with the given initial and maximum delays.
    ///
    /// An initial delay of 0 disables waiting entirely.
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            initial_ms,
            max_ms: max_ms.max(initial_ms),
            multiplier: 2.0,
        }
    }

    /// Set the growth factor, at least 1.0.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Delay before retry `attempt` (zero-based: 0 is the first retry).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = (self.initial_ms as f64) * self.multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_ms as f64) as u64;
        Duration::from_millis(capped_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Default for BackoffStrategy {
    /// 1 second initial, 5 minutes max, doubling
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_INTERVAL_MS, DEFAULT_MAX_INTERVAL_MS)
    }
}
