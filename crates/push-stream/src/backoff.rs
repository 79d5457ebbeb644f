//! Exponential backoff between connection attempts

use std::time::Duration;

/// Retry delay calculator.
///
/// `next_interval` returns `base * 2^attempt` (capped at `max`) and then
/// increments the attempt counter. The owner serializes access.
#[derive(Debug, Clone)]
pub struct BackOff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl BackOff {
    /// Create a backoff with the given base delay and ceiling
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempt: 0,
        }
    }

    /// Delay to wait before the next attempt. Increments the attempt count.
    pub fn next_interval(&mut self) -> Duration {
        let interval = self.interval_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        interval
    }

    /// Zero the attempt counter after a successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of intervals handed out since the last reset
    pub fn attempt_count(&self) -> u32 {
        self.attempt
    }

    fn interval_for(&self, attempt: u32) -> Duration {
        // 2^31 already saturates any sane base against the ceiling
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |interval| interval.min(self.max))
    }
}
