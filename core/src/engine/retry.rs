use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{EngineError, ErrorKind};

/// Per-file retry policy applied by the orchestrator. Backends never retry.
pub trait RetryStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Delay before the next attempt, or `None` to give up. `retries` is the
    /// number of retries already performed for this file.
    fn next_delay(&self, retries: u32, error: &EngineError) -> Option<Duration>;

    fn max_attempts(&self) -> u32;
}

/// Only transient failures are worth another grant.
pub fn is_retryable(error: &EngineError) -> bool {
    matches!(
        error.kind(),
        ErrorKind::RemoteUnavailable | ErrorKind::TransferFailed
    )
}

pub struct ExponentialBackoff {
    config: RetryConfig,
}

pub struct LinearRetry {
    config: RetryConfig,
}

impl ExponentialBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl LinearRetry {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, retries: u32, error: &EngineError) -> Option<Duration> {
        if retries.saturating_add(1) >= self.config.max_attempts || !is_retryable(error) {
            return None;
        }
        let exp = 1u64 << retries.min(30);
        let delay = self.config.base_delay_ms.saturating_mul(exp);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

impl RetryStrategy for LinearRetry {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, retries: u32, error: &EngineError) -> Option<Duration> {
        if retries.saturating_add(1) >= self.config.max_attempts || !is_retryable(error) {
            return None;
        }
        let multiplier = retries.saturating_add(1) as u64;
        let delay = self.config.base_delay_ms.saturating_mul(multiplier);
        let delay = delay.min(self.config.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

pub fn build_retry(config: &RetryConfig) -> Box<dyn RetryStrategy> {
    match config.strategy.as_str() {
        "linear" => Box::new(LinearRetry::new(config.clone())),
        // Anything else behaves like exponential backoff.
        _ => Box::new(ExponentialBackoff::new(config.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> EngineError {
        EngineError::RemoteUnavailable("502".into())
    }

    #[test]
    fn test_exponential_backoff() {
        let cfg = RetryConfig {
            base_delay_ms: 100,
            max_delay_ms: 1000,
            max_attempts: 4,
            strategy: "exponential-backoff".to_string(),
        };
        let plugin = ExponentialBackoff::new(cfg);
        assert_eq!(plugin.next_delay(0, &transient()).unwrap().as_millis(), 100);
        assert_eq!(plugin.next_delay(1, &transient()).unwrap().as_millis(), 200);
        assert_eq!(plugin.next_delay(3, &transient()), None);
    }

    #[test]
    fn test_linear_backoff() {
        let cfg = RetryConfig {
            base_delay_ms: 50,
            max_delay_ms: 200,
            max_attempts: 5,
            strategy: "linear".to_string(),
        };
        let plugin = LinearRetry::new(cfg);
        assert_eq!(plugin.next_delay(0, &transient()).unwrap().as_millis(), 50);
        assert_eq!(plugin.next_delay(2, &transient()).unwrap().as_millis(), 150);
        assert_eq!(plugin.next_delay(3, &transient()).unwrap().as_millis(), 200);
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let plugin = build_retry(&RetryConfig::default());
        assert_eq!(plugin.max_attempts(), 1);
        assert_eq!(plugin.next_delay(0, &transient()), None);
    }

    #[test]
    fn test_denied_grant_is_not_retried() {
        let cfg = RetryConfig {
            max_attempts: 3,
            ..RetryConfig::default()
        };
        let plugin = build_retry(&cfg);
        assert!(plugin
            .next_delay(0, &EngineError::grant_denied("a.xlsx", "403"))
            .is_none());
        assert!(plugin
            .next_delay(0, &EngineError::transfer_failed("a.xlsx", "HTTP 500"))
            .is_some());
    }
}
