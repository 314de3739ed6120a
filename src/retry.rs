//! Retry policy and the backoff decision function.
//!
//! The engine is a single pure function: given the attempt number and the
//! classified error, [`RetryConfig::decide`] returns either a delay to wait
//! or the instruction to stop. It never sleeps and never performs I/O; the
//! client owns the waiting.

use std::time::Duration;

use rand::Rng;

use crate::error::Error;

/// Statuses retried when no explicit set is configured: request timeout,
/// throttling, and the transient 5xx family.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Configuration for automatic retries.
///
/// The default configuration performs no retries at all, so plain clients
/// never surprise callers with hidden waits. [`RetryConfig::standard`]
/// enables a conservative exponential backoff.
///
/// # Examples
///
/// ```
/// use recall::RetryConfig;
/// use std::time::Duration;
///
/// let config = RetryConfig {
///     max_retries: 5,
///     base_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(10),
///     ..RetryConfig::standard()
/// };
/// assert!(config.exponential_backoff);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Upper bound on any computed delay.
    pub max_delay: Duration,

    /// When `true`, the delay doubles with each retry; when `false`, every
    /// retry waits `base_delay`.
    pub exponential_backoff: bool,

    /// When `true`, each delay is scaled by a random factor in `[0.5, 1.0]`
    /// to avoid thundering herds.
    pub jitter: bool,

    /// HTTP statuses that are worth retrying.
    pub retryable_statuses: Vec<u16>,

    /// When `true`, a server-provided wait (`Retry-After` or a rate limit
    /// reset) overrides the computed backoff delay.
    pub respect_retry_after: bool,

    /// Upper bound on any server-provided wait.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            exponential_backoff: true,
            jitter: false,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            respect_retry_after: true,
            max_retry_after: Duration::from_secs(300),
        }
    }

    /// A conservative production configuration: three retries with
    /// exponential backoff starting at 500ms, capped at 30 seconds.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            ..Self::none()
        }
    }

    /// Decides what to do about a failed attempt.
    ///
    /// `attempt` is zero-based: the first failure is attempt 0. Terminal
    /// errors and exhausted budgets yield [`RetryDecision::Stop`];
    /// otherwise the computed (or server-requested) delay is returned.
    /// This function never sleeps.
    ///
    /// # Examples
    ///
    /// ```
    /// use recall::{Error, RetryConfig, RetryDecision};
    ///
    /// let config = RetryConfig::standard();
    ///
    /// // Cancellation is terminal no matter how much budget remains.
    /// assert_eq!(config.decide(0, &Error::Cancelled), RetryDecision::Stop);
    ///
    /// // Timeouts are retryable until the budget runs out.
    /// assert!(matches!(
    ///     config.decide(0, &Error::Timeout),
    ///     RetryDecision::Retry { .. }
    /// ));
    /// assert_eq!(config.decide(3, &Error::Timeout), RetryDecision::Stop);
    /// ```
    pub fn decide(&self, attempt: u32, error: &Error) -> RetryDecision {
        if !error.is_retryable(&self.retryable_statuses) {
            return RetryDecision::Stop;
        }
        if attempt >= self.max_retries {
            return RetryDecision::Stop;
        }

        if self.respect_retry_after {
            if let Some(wait) = error.rate_limit_delay(self.max_retry_after) {
                return RetryDecision::Retry { delay: wait };
            }
        }

        let mut delay = if self.exponential_backoff {
            let multiplier = 2u32.saturating_pow(attempt);
            self.base_delay.saturating_mul(multiplier)
        } else {
            self.base_delay
        };
        delay = delay.min(self.max_delay);

        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay = delay.mul_f64(factor);
        }

        RetryDecision::Retry { delay }
    }
}

/// The outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait for `delay`, then try again.
    Retry {
        /// How long to wait before the next attempt
        delay: Duration,
    },
    /// Surface the error to the caller.
    Stop,
}
