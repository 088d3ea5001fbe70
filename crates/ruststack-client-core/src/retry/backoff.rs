//! Backoff strategies.

use std::time::Duration;

const MAX_EXPONENT: u32 = 30;

/// Computes the delay before a retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Retry immediately.
    None,
    /// Always wait the same amount.
    Fixed(Duration),
    /// Exponential growth without randomisation.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Upper bound for any single delay.
        max: Duration,
    },
    /// Exponential growth with full jitter: a uniform draw in `[0, ceiling]`.
    ExponentialWithJitter {
        /// Delay ceiling before the first retry.
        base: Duration,
        /// Upper bound for any single delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Exponential backoff with full jitter.
    #[must_use]
    pub fn exponential_with_jitter(base: Duration, max: Duration) -> Self {
        Self::ExponentialWithJitter { base, max }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => delay,
            Self::Exponential { base, max } => exponential_ceiling(base, max, attempt),
            Self::ExponentialWithJitter { base, max } => {
                let ceiling = exponential_ceiling(base, max, attempt);
                ceiling.mul_f64(rand::random::<f64>())
            }
        }
    }
}

fn exponential_ceiling(base: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
    base.saturating_mul(1 << exponent).min(max)
}
