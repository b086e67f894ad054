//! Retry policy for generative model transport failures.
//!
//! Implements exponential backoff with configurable parameters.

use crate::config::GenerationSettings;
use crate::llm::LlmError;
use std::time::Duration;

/// Retry policy implementing exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt before giving up.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    /// Cap for exponential growth.
    pub max_backoff_ms: u64,
    /// Multiplier applied to backoff after each retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(config: &GenerationSettings) -> Self {
        Self {
            max_retries: config.max_transport_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            backoff_multiplier: config.backoff_multiplier,
        }
    }

    /// Whether a failed attempt should be retried.
    ///
    /// `retry_count` is the number of retries already performed.
    pub fn should_retry(&self, error: &LlmError, retry_count: u32) -> bool {
        error.is_transient() && retry_count < self.max_retries
    }

    /// `initial_backoff * multiplier^retry_count`, capped at `max_backoff_ms`.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let backoff =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(retry_count as i32);
        Duration::from_millis(backoff.min(self.max_backoff_ms as f64) as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&GenerationSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_from_config() {
        let config = GenerationSettings {
            max_transport_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 2000,
            backoff_multiplier: 3.0,
            ..Default::default()
        };
        let policy = RetryPolicy::new(&config);

        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_backoff_ms, 100);
        assert_eq!(policy.max_backoff_ms, 2000);
        assert_eq!(policy.backoff_multiplier, 3.0);
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(4), Duration::from_millis(8000));
        // 500 * 2^5 = 16000 -> capped
        assert_eq!(policy.backoff(5), Duration::from_millis(10_000));
    }

    #[test]
    fn test_should_retry_transient_only() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(&LlmError::Timeout, 0));
        assert!(policy.should_retry(&LlmError::Connection("refused".into()), 2));
        assert!(!policy.should_retry(&LlmError::Timeout, 3));
        assert!(!policy.should_retry(&LlmError::InvalidResponse("x".into()), 0));
        assert!(!policy.should_retry(
            &LlmError::Api {
                status: 400,
                message: String::new()
            },
            0
        ));
    }

    #[test]
    fn test_zero_initial_backoff() {
        let policy = RetryPolicy {
            initial_backoff_ms: 0,
            ..Default::default()
        };
        assert_eq!(policy.backoff(0), Duration::ZERO);
        assert_eq!(policy.backoff(3), Duration::ZERO);
    }
}
