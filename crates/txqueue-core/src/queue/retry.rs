//! Retry policy: retry ceiling and backoff delays.

use std::time::Duration;

/// Retry policy for failed submissions.
///
/// Linear backoff: the wait before retrying equals `base_delay * attempt`,
/// where `attempt` counts the tries already made (1-indexed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries allowed after the first attempt.
    pub max_retries: u32,

    /// Base delay multiplied by the attempt number.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn linear(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Whether another try is allowed after `attempt` tries have failed.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Delay before the next try, after `attempt` tries.
    ///
    /// Example with base_delay=1s:
    /// - attempt 1 (first failure): 1s
    /// - attempt 2: 2s
    /// - attempt 3: 3s
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1))
    }
}
