// Retry strategy implementation: fixed delay or exponential backoff with jitter

use crate::config::{RetryKind, RetrySettings};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Retry strategy trait for calculating retry delays
///
/// `attempt` is the number of attempts already made, so the first call after a
/// failed request passes `1`.
pub trait RetryStrategy: Send + Sync {
    /// Calculate the delay before the next attempt
    /// Returns None if the attempt budget is spent
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Total attempts allowed, including the first one
    fn max_attempts(&self) -> u32;

    /// Check if another attempt is allowed
    fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }
}

/// Build the strategy described by the retry settings
pub fn from_settings(settings: &RetrySettings) -> Arc<dyn RetryStrategy> {
    match settings.strategy {
        RetryKind::Fixed => Arc::new(FixedDelay::new(
            Duration::from_secs(settings.delay_seconds),
            settings.max_attempts,
        )),
        RetryKind::Exponential => Arc::new(ExponentialBackoff::with_config(
            settings.delay_seconds,
            settings.max_delay_seconds,
            settings.jitter_factor,
            settings.max_attempts,
        )),
    }
}

/// Exponential backoff retry strategy with jitter
/// Sequence: base, base*3, base*9, ... capped at max_delay
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay_secs: u64,
    max_delay_secs: u64,
    /// Jitter factor (0.0 to 1.0)
    jitter_factor: f64,
    max_attempts: u32,
}

impl ExponentialBackoff {
    pub fn with_config(
        base_delay_secs: u64,
        max_delay_secs: u64,
        jitter_factor: f64,
        max_attempts: u32,
    ) -> Self {
        Self {
            base_delay_secs,
            max_delay_secs,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
            max_attempts,
        }
    }

    /// Exponential delay without jitter
    fn calculate_base_delay(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1);
        3_u64
            .checked_pow(exponent)
            .and_then(|factor| self.base_delay_secs.checked_mul(factor))
            .unwrap_or(self.max_delay_secs)
            .min(self.max_delay_secs)
    }

    /// Returns delay in milliseconds
    fn add_jitter_ms(&self, base_delay_secs: u64) -> u64 {
        let base_delay_ms = base_delay_secs.saturating_mul(1000);
        if self.jitter_factor == 0.0 {
            return base_delay_ms;
        }

        let jitter_range_ms = (base_delay_ms as f64 * self.jitter_factor) as u64;
        let jitter_ms = if jitter_range_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_range_ms)
        } else {
            0
        };

        base_delay_ms.saturating_add(jitter_ms)
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }

        let base_delay_secs = self.calculate_base_delay(attempt);
        Some(Duration::from_millis(self.add_jitter_ms(base_delay_secs)))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Fixed delay retry strategy
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: u32,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
