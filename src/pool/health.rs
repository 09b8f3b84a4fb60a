//! Per-resource health bookkeeping.

use crate::core::ResourceKind;

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Mutable health state of one resource.
///
/// Only the pool mutates a record, through its report operations. Invariants:
///
/// - `success_count + failure_count == total_requests`
/// - `consecutive_failures >= threshold` implies `quarantined_until` is set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthRecord {
    total_requests: u64,
    success_count: u64,
    failure_count: u64,
    consecutive_failures: u32,
    last_used_at: Option<Instant>,
    quarantined_until: Option<Instant>,
}

impl HealthRecord {
    /// Creates a zeroed record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requests reported against this resource.
    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    /// Successful requests.
    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    /// Failed requests.
    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    /// Failures since the last success or quarantine release.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// When a request outcome was last reported.
    pub fn last_used_at(&self) -> Option<Instant> {
        self.last_used_at
    }

    /// End of the current quarantine window, if any.
    pub fn quarantined_until(&self) -> Option<Instant> {
        self.quarantined_until
    }

    /// Returns `success_count / max(1, total_requests)`.
    pub fn success_rate(&self) -> f64 {
        self.success_count as f64 / self.total_requests.max(1) as f64
    }

    /// Returns `true` if the resource may be selected at `now`.
    pub fn is_healthy(&self, now: Instant) -> bool {
        self.quarantined_until.map_or(true, |until| now >= until)
    }

    /// Records a success at `now`. Clears any quarantine.
    pub(crate) fn record_success(&mut self, now: Instant) {
        self.total_requests += 1;
        self.success_count += 1;
        self.consecutive_failures = 0;
        self.last_used_at = Some(now);
        self.quarantined_until = None;
    }

    /// Records a failure at `now`.
    ///
    /// Returns `true` if this failure put the resource into quarantine.
    pub(crate) fn record_failure(
        &mut self,
        now: Instant,
        threshold: u32,
        duration: std::time::Duration,
    ) -> bool {
        self.total_requests += 1;
        self.failure_count += 1;
        self.consecutive_failures += 1;
        self.last_used_at = Some(now);

        if self.consecutive_failures >= threshold {
            let was_quarantined = !self.is_healthy(now);
            self.quarantined_until = Some(now + duration);
            return !was_quarantined;
        }
        false
    }

    /// Releases an elapsed quarantine.
    ///
    /// Returns `true` if the resource was just released.
    pub(crate) fn release_if_expired(&mut self, now: Instant) -> bool {
        match self.quarantined_until {
            Some(until) if now >= until => {
                self.quarantined_until = None;
                self.consecutive_failures = 0;
                true
            }
            _ => false,
        }
    }
}

/// Read-only pool snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Number of managed resources.
    pub total: usize,
    /// Resources currently selectable.
    pub healthy: usize,
    /// Resources currently quarantined.
    pub quarantined: usize,
    /// Requests reported across all resources.
    pub total_requests: u64,
    /// Successes reported across all resources.
    pub total_successes: u64,
    /// Failures reported across all resources.
    pub total_failures: u64,
    /// `total_successes / max(1, total_requests)`.
    pub global_success_rate: f64,
}

impl PoolStatus {
    /// Returns `true` if no resource can be selected right now.
    pub fn is_exhausted(&self) -> bool {
        self.healthy == 0
    }
}

/// Health snapshot of one resource, safe to log or serialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceHealth {
    /// Redacted resource label.
    pub label: String,
    /// Proxy or credential.
    pub kind: ResourceKind,
    /// Total requests reported.
    pub total_requests: u64,
    /// Successful requests.
    pub success_count: u64,
    /// Failed requests.
    pub failure_count: u64,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Success ratio.
    pub success_rate: f64,
    /// Whether the resource is quarantined right now.
    pub quarantined: bool,
    /// Milliseconds until the quarantine ends, if quarantined.
    pub quarantine_remaining_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_record_default() {
        let record = HealthRecord::new();
        assert_eq!(record.total_requests(), 0);
        assert_eq!(record.success_rate(), 0.0);
        assert!(record.is_healthy(Instant::now()));
    }

    #[test]
    fn test_record_counts_stay_consistent() {
        let now = Instant::now();
        let mut record = HealthRecord::new();
        record.record_success(now);
        record.record_failure(now, 3, Duration::from_secs(1));
        record.record_success(now);

        assert_eq!(record.total_requests(), 3);
        assert_eq!(
            record.success_count() + record.failure_count(),
            record.total_requests()
        );
        assert!((record.success_rate() - 0.666).abs() < 0.01);
        assert_eq!(record.consecutive_failures(), 0);
    }

    #[test]
    fn test_record_quarantine_and_release() {
        let now = Instant::now();
        let mut record = HealthRecord::new();
        assert!(!record.record_failure(now, 2, Duration::from_secs(10)));
        assert!(record.record_failure(now, 2, Duration::from_secs(10)));
        assert!(!record.is_healthy(now + Duration::from_secs(5)));

        assert!(!record.release_if_expired(now + Duration::from_secs(5)));
        assert!(record.release_if_expired(now + Duration::from_secs(10)));
        assert_eq!(record.consecutive_failures(), 0);
        assert!(record.quarantined_until().is_none());
    }

    #[test]
    fn test_success_clears_quarantine() {
        let now = Instant::now();
        let mut record = HealthRecord::new();
        for _ in 0..3 {
            record.record_failure(now, 3, Duration::from_secs(60));
        }
        assert!(!record.is_healthy(now));

        record.record_success(now);
        assert!(record.is_healthy(now));
        assert_eq!(record.consecutive_failures(), 0);
    }
}
