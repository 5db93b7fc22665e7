//! Retry policy for destination delivery

use std::time::Duration;

use contracts::{BackoffStrategy, DeliveryConfig};

/// Delay between two attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failure
    Fixed(Duration),
    /// `base * 2^(n-1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

/// Bounded retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one, at least 1
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(5)),
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Exponential policy
    pub fn exponential(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential { base, max },
        }
    }

    /// Build from the `[delivery]` config section
    pub fn from_config(config: &DeliveryConfig) -> Self {
        match config.backoff {
            BackoffStrategy::Fixed => Self::fixed(config.max_attempts, config.backoff_delay()),
            BackoffStrategy::Exponential => Self::exponential(
                config.max_attempts,
                config.backoff_delay(),
                config.max_backoff_delay(),
            ),
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                // attempts >= 33 saturate instead of overflowing the shift
                let multiplier = 1u32
                    .checked_shl(attempt.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                base.checked_mul(multiplier).unwrap_or(max).min(max)
            }
        }
    }

    /// Whether another attempt follows a failure of `attempt`
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
