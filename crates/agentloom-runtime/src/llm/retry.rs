use std::time::Duration;

use rand::Rng;

/// Exponential backoff applied to retryable backend failures.
///
/// The delay before retry `attempt` (zero-based) is
/// `base_delay * 2^attempt` plus a uniform jitter in `[0, max_jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_jitter,
        }
    }

    /// Delay without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            self.max_jitter.mul_f64(rand::thread_rng().gen::<f64>())
        };
        self.backoff(attempt).saturating_add(jitter)
    }
}
