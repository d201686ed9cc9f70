//! Backoff schedule for transient provider failures.

use std::time::Duration;

use rand::Rng;

use crate::config::DispatchConfig;

/// Relative spread applied to each delay when jitter is enabled
const JITTER_FACTOR: f64 = 0.5;

/// Exponential backoff: `initial * multiplier^retry`, capped at `max_delay`
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for RetryPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// No retries at all; the first transient failure is final
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Policy without delays, for tests and dry runs
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Whether another provider call is allowed after `retries_done` retries
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Delay before retry number `retry` (zero-based)
    pub fn delay(&self, retry: u32) -> Duration {
        self.delay_with_rng(retry, &mut rand::rng())
    }

    fn delay_with_rng<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let jittered = if self.jitter {
            base + JITTER_FACTOR * base * rng.random_range(-1.0..=1.0)
        } else {
            base
        };
        let max = self.max_delay.as_millis() as f64;
        // Large exponents overflow to infinity
        let capped = if jittered.is_finite() {
            jittered.round().clamp(0.0, max)
        } else {
            max
        };
        Duration::from_millis(capped as u64)
    }
}
