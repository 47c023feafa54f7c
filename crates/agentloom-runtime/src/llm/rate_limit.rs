//! Minimum-interval rate limiting shared by every backend wrapper.

use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default spacing between two physical backend calls
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

lazy_static! {
    /// Process-wide limiter used by every [`Llm`](super::Llm) unless one is
    /// injected explicitly. Lives for the whole process.
    static ref GLOBAL_LIMITER: Arc<RateLimiter> = Arc::new(RateLimiter::new(DEFAULT_MIN_INTERVAL));
}

/// Enforces a minimum interval between call starts.
///
/// The lock is held while waiting, so concurrent callers are admitted one at a
/// time and each observes the full interval after its predecessor.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Shared process-wide limiter
    pub fn global() -> Arc<RateLimiter> {
        GLOBAL_LIMITER.clone()
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a call may start, then record its start time.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
                tokio::time::sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consecutive_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(60));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn concurrent_callers_are_serialized() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(40)));
        let start = Instant::now();
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn global_limiter_is_shared() {
        assert!(Arc::ptr_eq(&RateLimiter::global(), &RateLimiter::global()));
        assert_eq!(RateLimiter::global().min_interval(), DEFAULT_MIN_INTERVAL);
    }
}
