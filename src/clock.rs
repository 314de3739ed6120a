//! Time source used by the client for cache ages and retry waits.
//!
//! Production code uses [`SystemClock`]. Tests inject a manual clock so
//! retry schedules and cache expiry can be asserted without real sleeps.

use std::time::{Duration, Instant};

use async_trait::async_trait;

/// A source of monotonic time and asynchronous sleeps.
///
/// Every time the client needs to know "now" (cache freshness checks) or
/// needs to wait (retry backoff), it goes through this trait rather than
/// calling [`Instant::now`] or [`tokio::time::sleep`] directly.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Waits for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// The default [`Clock`] backed by the operating system and tokio's timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
