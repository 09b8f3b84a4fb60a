//! Backoff and retry configuration.

use crate::core::result::duration_serde;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maps an attempt number to a wait duration. Stateless.
///
/// - failures wait `base * 2^attempt + uniform(0, jitter_max)`
/// - rate limits wait longer: `max(delay(attempt) + rate_limit_base * (attempt + 1), retry_after)`
///
/// Both are capped at `max_delay`. Attempts are 0-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Base delay for exponential backoff.
    #[serde(with = "duration_serde", rename = "base_ms")]
    pub base: Duration,

    /// Upper bound of the uniform jitter added to each failure delay.
    #[serde(with = "duration_serde", rename = "jitter_max_ms")]
    pub jitter_max: Duration,

    /// Linear step for rate-limit delays.
    #[serde(with = "duration_serde", rename = "rate_limit_base_ms")]
    pub rate_limit_base: Duration,

    /// Cap applied to every delay.
    #[serde(with = "duration_serde", rename = "max_delay_ms")]
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            jitter_max: Duration::from_secs(1),
            rate_limit_base: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never waits. Useful in tests.
    pub fn zero() -> Self {
        Self {
            base: Duration::ZERO,
            jitter_max: Duration::ZERO,
            rate_limit_base: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Sets the base delay.
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Sets the jitter upper bound.
    pub fn with_jitter_max(mut self, jitter_max: Duration) -> Self {
        self.jitter_max = jitter_max;
        self
    }

    /// Disables jitter.
    pub fn no_jitter(self) -> Self {
        self.with_jitter_max(Duration::ZERO)
    }

    /// Sets the rate-limit step.
    pub fn with_rate_limit_base(mut self, rate_limit_base: Duration) -> Self {
        self.rate_limit_base = rate_limit_base;
        self
    }

    /// Sets the delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Returns the wait after failed attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential = self.base.as_millis() as f64 * 2f64.powi(attempt.min(63) as i32);
        let jitter = match self.jitter_max.as_millis() as u64 {
            0 => 0,
            max => rand::rng().random_range(0..=max),
        };

        let millis = (exponential + jitter as f64).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    /// Returns the wait after rate-limited attempt `attempt`.
    ///
    /// The failure delay for the same attempt plus a linear step of
    /// `rate_limit_base * (attempt + 1)`. `retry_after` is the upstream's
    /// hint, honored when it is longer. Below the cap this is always longer
    /// than [`delay`](Self::delay).
    pub fn rate_limit_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let step = self.rate_limit_base.saturating_mul(attempt.saturating_add(1));
        self.delay(attempt)
            .saturating_add(step)
            .max(retry_after.unwrap_or(Duration::ZERO))
            .min(self.max_delay)
    }
}

/// Retry budget for one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per strategy.
    pub max_attempts: u32,

    /// Wait policy between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// The budget used for detail lookups: three attempts.
    pub fn detail() -> Self {
        Self {
            max_attempts: 3,
            ..Self::default()
        }
    }

    /// A single attempt, no waits.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffPolicy::zero(),
        }
    }

    /// Sets the maximum number of attempts. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns whether attempt `attempt` (0-indexed) is the last one.
    pub fn is_last_attempt(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base, Duration::from_secs(2));
        assert_eq!(policy.jitter_max, Duration::from_secs(1));
        assert_eq!(RetryConfig::default().max_attempts, 5);
        assert_eq!(RetryConfig::detail().max_attempts, 3);
    }

    #[test]
    fn test_delay_without_jitter() {
        let policy = BackoffPolicy::new()
            .with_base(Duration::from_millis(100))
            .no_jitter();

        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_jitter_bounds() {
        let policy = BackoffPolicy::new()
            .with_base(Duration::from_millis(100))
            .with_jitter_max(Duration::from_millis(50));

        for _ in 0..100 {
            let delay = policy.delay(1);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(250));
        }
    }

    #[test]
    fn test_delay_capped() {
        let policy = BackoffPolicy::new()
            .with_base(Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(5));

        assert_eq!(policy.delay(4), Duration::from_secs(5));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_rate_limit_delay() {
        let policy = BackoffPolicy::new()
            .no_jitter()
            .with_rate_limit_base(Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(30));

        assert_eq!(policy.rate_limit_delay(0, None), Duration::from_secs(4));
        assert_eq!(policy.rate_limit_delay(2, None), Duration::from_secs(14));
        assert_eq!(
            policy.rate_limit_delay(0, Some(Duration::from_secs(10))),
            Duration::from_secs(10)
        );
        assert_eq!(
            policy.rate_limit_delay(0, Some(Duration::from_secs(120))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_rate_limit_waits_longer_than_failure() {
        let policy = BackoffPolicy::default().no_jitter();
        for attempt in 0..5 {
            let failure = policy.delay(attempt);
            let rate_limited = policy.rate_limit_delay(attempt, None);
            assert!(
                rate_limited > failure,
                "attempt {attempt}: {rate_limited:?} <= {failure:?}"
            );
        }
    }

    #[test]
    fn test_rate_limit_never_shorter_with_jitter() {
        let policy = BackoffPolicy::default();
        for attempt in 0..5 {
            let floor = policy.clone().no_jitter().delay(attempt);
            assert!(policy.rate_limit_delay(attempt, None) > floor);
        }
    }

    #[test]
    fn test_zero_policy_never_waits() {
        let policy = BackoffPolicy::zero();
        assert_eq!(policy.delay(4), Duration::ZERO);
        assert_eq!(
            policy.rate_limit_delay(4, Some(Duration::from_secs(5))),
            Duration::ZERO
        );
    }

    #[test]
    fn test_retry_config() {
        let config = RetryConfig::new().with_max_attempts(0);
        assert_eq!(config.max_attempts, 1);
        assert!(config.is_last_attempt(0));

        let config = RetryConfig::new().with_max_attempts(3);
        assert!(!config.is_last_attempt(1));
        assert!(config.is_last_attempt(2));
    }

    #[test]
    fn test_retry_config_deserialize() {
        let config: RetryConfig =
            serde_json::from_str(r#"{"max_attempts": 2, "backoff": {"base_ms": 500}}"#).unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.backoff.base, Duration::from_millis(500));
        assert_eq!(config.backoff.max_delay, Duration::from_secs(60));
    }
}
