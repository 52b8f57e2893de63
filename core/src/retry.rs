//! Bounded, jittered exponential backoff with an injectable sleep, so retry
//! behavior stays deterministic under test.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Retry budget for transient store conditions (throttles, unprocessed
/// batch subsets). `max_attempts` counts calls, not sleeps: 5 attempts
/// means 4 backoff sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self { Self { max_attempts: 5, initial_backoff: Duration::from_millis(100), max_backoff: Duration::from_secs(2) } }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based): exponential growth
    /// capped at `max_backoff`, with jitter in the upper half of the window.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.initial_backoff.saturating_mul(1u32 << attempt.min(16));
        let ceiling = exp.min(self.max_backoff);
        if ceiling.is_zero() {
            return ceiling;
        }
        let ceiling_nanos = ceiling.as_nanos() as u64;
        Duration::from_nanos(rand::thread_rng().gen_range(ceiling_nanos / 2..=ceiling_nanos))
    }

    pub fn attempts_exhausted(&self, attempt: u32) -> bool { attempt + 1 >= self.max_attempts }
}

/// Where the executor sleeps between retries. Production uses the tokio
/// timer; tests inject a recorder to observe delays without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) { tokio::time::sleep(duration).await }
}
