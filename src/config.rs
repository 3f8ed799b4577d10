//! Store configuration: transaction deadline and conflict retry policy.

use std::time::Duration;

/// Retry policy for transactions that lose a write-write conflict.
///
/// The delay before retry `n` (0-based) is `base_delay_ms * 2^n`, capped at
/// `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = fail on the first conflict)
    pub max_retries: usize,
    /// Backoff before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound on any single backoff, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay_ms: 5,
            max_delay_ms: 100,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that surfaces the first conflict.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Backoff before retry `attempt`.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let shift = attempt.min(63) as u32;
        let delay_ms = self.base_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Settings shared by every transaction a [`RecordStore`](crate::RecordStore) opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Deadline for a single transaction attempt.
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}
