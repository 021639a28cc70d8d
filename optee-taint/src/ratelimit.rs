//! Global minimum-interval rate limiter for LLM calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces at least `min_interval` between the end of one permitted
/// call and the start of the next, across every caller sharing this
/// limiter.
///
/// The single-threaded-cooperative concurrency model (spec.md §6)
/// means this only ever serializes `.await` points on one runtime
/// thread, not real parallel callers — a `tokio::sync::Mutex` is
/// enough, no atomics or cross-thread signalling needed.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Builds a limiter enforcing `min_interval` between calls.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Waits until it is safe to issue the next call, then records
    /// that a call is starting now.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
