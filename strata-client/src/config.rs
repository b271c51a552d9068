//! Client configuration.
//!
//! Everything a client needs to talk to a broker is carried here:
//! bootstrap addresses, retry behavior, poll sizing, commit cadence.
//! Nothing is hardcoded in the producer or consumer themselves.

use std::time::Duration;

use strata_group::ResetPolicy;

/// Retry behavior for transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub base_backoff: Duration,
    /// Upper bound on the backoff between attempts.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    /// Returns the backoff before retry number `attempt` (1-based).
    ///
    /// Exponential: base, 2x base, 4x base, ... capped at `max_backoff`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        debug_assert!(attempt >= 1);

        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.base_backoff.saturating_mul(1 << exponent);
        backoff.min(self.max_backoff)
    }
}

/// Configuration shared by producers and consumers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bootstrap addresses of the broker cluster.
    pub bootstrap: Vec<String>,
    /// Retry behavior for transient failures.
    pub retry: RetryConfig,
    /// Maximum records returned by a single poll.
    pub poll_records_max: u32,
    /// Interval between automatic commits; `None` disables auto-commit.
    pub auto_commit_interval: Option<Duration>,
    /// Start position when the group has no committed offset.
    pub reset_policy: ResetPolicy,
}

impl ClientConfig {
    /// Creates a configuration with the given bootstrap addresses.
    #[must_use]
    pub fn new(bootstrap: Vec<String>) -> Self {
        Self {
            bootstrap,
            retry: RetryConfig::default(),
            poll_records_max: 500,
            auto_commit_interval: Some(Duration::from_secs(5)),
            reset_policy: ResetPolicy::Earliest,
        }
    }

    /// Sets the retry configuration.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-poll record cap.
    #[must_use]
    pub const fn with_poll_records_max(mut self, max: u32) -> Self {
        self.poll_records_max = max;
        self
    }

    /// Sets the auto-commit interval; `None` disables auto-commit.
    #[must_use]
    pub const fn with_auto_commit_interval(mut self, interval: Option<Duration>) -> Self {
        self.auto_commit_interval = interval;
        self
    }

    /// Sets the reset policy.
    #[must_use]
    pub const fn with_reset_policy(mut self, reset_policy: ResetPolicy) -> Self {
        self.reset_policy = reset_policy;
        self
    }

    /// Configuration with short timings for tests.
    #[must_use]
    pub fn fast_for_testing() -> Self {
        Self::new(vec!["localhost:0".to_string()])
            .with_retry(RetryConfig {
                max_attempts: 2,
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(10),
            })
            .with_auto_commit_interval(Some(Duration::from_millis(50)))
    }
}
