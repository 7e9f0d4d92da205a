//! Exponential backoff policy shared by retryable external calls.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with an optional jitter factor.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_interval: f64,
    pub backoff_factor: f64,
    pub max_interval: f64,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 128.0,
            jitter: true,
        }
    }

    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the given (0-indexed) attempt's retry.
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        if attempt >= self.max_attempts {
            return Duration::from_secs(0);
        }
        let base = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_interval);
        let delay = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.5);
            capped * factor
        } else {
            capped
        };
        Duration::from_secs_f64(delay)
    }

    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
