//! The resource pool.

use crate::core::{ArcClock, FetchError, FetchResult, Resource, SystemClock};
use crate::pool::config::PoolConfig;
use crate::pool::health::{HealthRecord, PoolStatus, ResourceHealth};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// A set of interchangeable egress resources with health tracking.
///
/// Every read-decide-write sequence runs under one pool-wide mutex that is
/// never held across an `.await`; the pool guards bookkeeping, not I/O.
/// [`acquire`](Self::acquire) never blocks: it either returns a resource or
/// fails with [`FetchError::PoolExhausted`].
///
/// # Selection
///
/// 1. Only healthy resources are candidates. Elapsed quarantines are released
///    while checking.
/// 2. With more than one candidate, the resource returned by the previous call
///    is excluded.
/// 3. Candidates are ordered by least recently used (never used first), then
///    by descending success rate; ties keep insertion order.
///
/// # Example
///
/// ```rust
/// use patentbridge::pool::{PoolConfig, ResourcePool};
///
/// let pool = ResourcePool::new(PoolConfig::default());
/// pool.add(["http://proxy1:8080", "http://proxy2:8080"]);
///
/// let first = pool.acquire().unwrap();
/// let second = pool.acquire().unwrap();
/// assert_ne!(first, second);
///
/// pool.report_success(&first);
/// pool.report_failure(&second);
/// assert_eq!(pool.status().total, 2);
/// ```
pub struct ResourcePool {
    config: PoolConfig,
    clock: ArcClock,
    state: Mutex<PoolState>,
}

#[derive(Default)]
struct PoolState {
    entries: Vec<Entry>,
    index: HashMap<Resource, usize>,
    last_returned: Option<usize>,
}

struct Entry {
    resource: Resource,
    health: HealthRecord,
}

impl ResourcePool {
    /// Creates an empty pool using the system clock.
    pub fn new(config: PoolConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty pool using the given clock.
    pub fn with_clock(config: PoolConfig, clock: ArcClock) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Creates a pool with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(PoolConfig::default())
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds resources. Already-known resources are left untouched.
    ///
    /// Returns the number of resources that were new.
    pub fn add<I, R>(&self, resources: I) -> usize
    where
        I: IntoIterator<Item = R>,
        R: Into<Resource>,
    {
        let mut state = self.lock();
        let mut added = 0;
        for resource in resources {
            let resource = resource.into();
            if state.index.contains_key(&resource) {
                continue;
            }
            let position = state.entries.len();
            state.index.insert(resource.clone(), position);
            state.entries.push(Entry {
                resource,
                health: HealthRecord::new(),
            });
            added += 1;
        }
        drop(state);

        if added > 0 {
            tracing::debug!(added, total = self.len(), "Resources added to pool");
        }
        added
    }

    /// Selects a resource for one request.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::PoolExhausted`] if no resource is healthy.
    pub fn acquire(&self) -> FetchResult<Resource> {
        let now = self.clock.now();
        let mut released = Vec::new();

        let result = {
            let mut state = self.lock();
            let mut candidates = Vec::with_capacity(state.entries.len());

            for (position, entry) in state.entries.iter_mut().enumerate() {
                if entry.health.release_if_expired(now) {
                    released.push(entry.resource.clone());
                }
                if entry.health.is_healthy(now) {
                    candidates.push(position);
                }
            }

            if candidates.is_empty() {
                Err(FetchError::PoolExhausted {
                    total: state.entries.len(),
                    quarantined: state.entries.len(),
                })
            } else {
                if candidates.len() > 1 {
                    if let Some(last) = state.last_returned {
                        candidates.retain(|&position| position != last);
                    }
                }

                let entries = &state.entries;
                candidates.sort_by(|&a, &b| {
                    let (a, b) = (&entries[a].health, &entries[b].health);
                    a.last_used_at().cmp(&b.last_used_at()).then_with(|| {
                        b.success_rate()
                            .partial_cmp(&a.success_rate())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                });

                let chosen = candidates[0];
                state.last_returned = Some(chosen);
                Ok(state.entries[chosen].resource.clone())
            }
        };

        for resource in &released {
            crate::audit::emit_resource_released(resource);
        }
        result
    }

    /// Records a successful request made through `resource`.
    pub fn report_success(&self, resource: &Resource) {
        let now = self.clock.now();
        let mut state = self.lock();
        match state.index.get(resource).copied() {
            Some(position) => state.entries[position].health.record_success(now),
            None => {
                drop(state);
                tracing::debug!(resource = %resource, "Success reported for unknown resource");
            }
        }
    }

    /// Records a failed request made through `resource`.
    ///
    /// Quarantines the resource once its consecutive failures reach the
    /// configured threshold.
    pub fn report_failure(&self, resource: &Resource) {
        let now = self.clock.now();
        let quarantined = {
            let mut state = self.lock();
            match state.index.get(resource).copied() {
                Some(position) => {
                    let health = &mut state.entries[position].health;
                    let newly = health.record_failure(
                        now,
                        self.config.quarantine_threshold,
                        self.config.quarantine_duration,
                    );
                    newly.then(|| health.consecutive_failures())
                }
                None => {
                    drop(state);
                    tracing::debug!(resource = %resource, "Failure reported for unknown resource");
                    return;
                }
            }
        };

        if let Some(consecutive_failures) = quarantined {
            crate::audit::emit_resource_quarantined(
                resource,
                consecutive_failures,
                self.config.quarantine_duration,
            );
        }
    }

    /// Returns a read-only snapshot of pool health.
    pub fn status(&self) -> PoolStatus {
        let now = self.clock.now();
        let state = self.lock();

        let mut status = PoolStatus {
            total: state.entries.len(),
            ..PoolStatus::default()
        };
        for entry in &state.entries {
            if entry.health.is_healthy(now) {
                status.healthy += 1;
            } else {
                status.quarantined += 1;
            }
            status.total_requests += entry.health.total_requests();
            status.total_successes += entry.health.success_count();
            status.total_failures += entry.health.failure_count();
        }
        status.global_success_rate =
            status.total_successes as f64 / status.total_requests.max(1) as f64;
        status
    }

    /// Returns per-resource health in insertion order, with redacted labels.
    pub fn snapshot(&self) -> Vec<ResourceHealth> {
        let now = self.clock.now();
        let state = self.lock();
        state
            .entries
            .iter()
            .map(|entry| describe(&entry.resource, &entry.health, now))
            .collect()
    }

    /// Returns a copy of the health record for `resource`.
    pub fn health(&self, resource: &Resource) -> Option<HealthRecord> {
        let state = self.lock();
        state
            .index
            .get(resource)
            .map(|&position| state.entries[position].health.clone())
    }

    /// Returns `true` if `resource` is managed by this pool.
    pub fn contains(&self, resource: &Resource) -> bool {
        self.lock().index.contains_key(resource)
    }

    /// Returns the number of managed resources.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` if the pool manages no resources.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn describe(resource: &Resource, health: &HealthRecord, now: Instant) -> ResourceHealth {
    let quarantined = !health.is_healthy(now);
    ResourceHealth {
        label: resource.label(),
        kind: resource.kind(),
        total_requests: health.total_requests(),
        success_count: health.success_count(),
        failure_count: health.failure_count(),
        consecutive_failures: health.consecutive_failures(),
        success_rate: health.success_rate(),
        quarantined,
        quarantine_remaining_ms: health
            .quarantined_until()
            .filter(|_| quarantined)
            .map(|until| until.saturating_duration_since(now).as_millis() as u64),
    }
}

impl fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use std::collections::HashSet;
    use std::time::Duration;

    fn pool_with_clock(config: PoolConfig) -> (ResourcePool, ManualClock) {
        let clock = ManualClock::new();
        let pool = ResourcePool::with_clock(config, Arc::new(clock.clone()));
        (pool, clock)
    }

    #[test]
    fn test_add_is_idempotent() {
        let pool = ResourcePool::with_defaults();
        assert_eq!(pool.add(["http://a:1", "http://b:1"]), 2);
        assert_eq!(pool.add(["http://b:1", "http://c:1"]), 1);
        assert_eq!(pool.len(), 3);

        pool.report_success(&Resource::new("http://a:1"));
        pool.add(["http://a:1"]);
        let health = pool.health(&Resource::new("http://a:1")).unwrap();
        assert_eq!(health.success_count(), 1);
    }

    #[test]
    fn test_acquire_empty_pool_is_exhausted() {
        let pool = ResourcePool::with_defaults();
        let err = pool.acquire().unwrap_err();
        assert!(matches!(
            err,
            FetchError::PoolExhausted {
                total: 0,
                quarantined: 0
            }
        ));
    }

    #[test]
    fn test_acquire_never_repeats_immediately() {
        let pool = ResourcePool::with_defaults();
        pool.add(["http://a:1", "http://b:1", "http://c:1"]);

        let mut previous = pool.acquire().unwrap();
        for _ in 0..20 {
            let next = pool.acquire().unwrap();
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn test_acquire_single_resource_repeats() {
        let pool = ResourcePool::with_defaults();
        pool.add(["http://only:1"]);
        assert_eq!(pool.acquire().unwrap(), pool.acquire().unwrap());
    }

    #[test]
    fn test_acquire_prefers_least_recently_used() {
        let (pool, clock) = pool_with_clock(PoolConfig::default());
        pool.add(["http://a:1", "http://b:1", "http://c:1"]);
        let (a, b, c) = (
            Resource::new("http://a:1"),
            Resource::new("http://b:1"),
            Resource::new("http://c:1"),
        );

        pool.report_success(&a);
        clock.advance(Duration::from_secs(1));
        pool.report_success(&b);
        clock.advance(Duration::from_secs(1));

        // c has never been used
        assert_eq!(pool.acquire().unwrap(), c);
        pool.report_success(&c);
        // a is now the least recently used
        assert_eq!(pool.acquire().unwrap(), a);
    }

    #[test]
    fn test_acquire_tie_breaks_on_success_rate() {
        let (pool, _clock) = pool_with_clock(PoolConfig::default());
        pool.add(["http://flaky:1", "http://solid:1"]);
        let flaky = Resource::new("http://flaky:1");
        let solid = Resource::new("http://solid:1");

        // Same frozen instant, so last_used_at ties.
        pool.report_failure(&flaky);
        pool.report_success(&solid);

        assert_eq!(pool.acquire().unwrap(), solid);
    }

    #[test]
    fn test_quarantine_after_threshold() {
        let (pool, _clock) = pool_with_clock(PoolConfig::default());
        pool.add(["http://a:1", "http://b:1"]);
        let a = Resource::new("http://a:1");

        pool.report_failure(&a);
        pool.report_failure(&a);
        assert_eq!(pool.status().quarantined, 0);

        pool.report_failure(&a);
        let status = pool.status();
        assert_eq!(status.quarantined, 1);
        assert_eq!(status.healthy, 1);

        for _ in 0..10 {
            assert_ne!(pool.acquire().unwrap(), a);
        }
    }

    #[test]
    fn test_quarantine_window_expires() {
        let config = PoolConfig::new()
            .with_quarantine_threshold(3)
            .with_quarantine_duration(Duration::from_secs(10));
        let (pool, clock) = pool_with_clock(config);
        pool.add(["http://a:1"]);
        let a = Resource::new("http://a:1");

        for _ in 0..3 {
            pool.report_failure(&a);
        }

        clock.advance(Duration::from_secs(5));
        assert!(matches!(
            pool.acquire(),
            Err(FetchError::PoolExhausted {
                total: 1,
                quarantined: 1
            })
        ));

        clock.advance(Duration::from_secs(6));
        assert_eq!(pool.acquire().unwrap(), a);
        assert_eq!(pool.health(&a).unwrap().consecutive_failures(), 0);
        assert!(pool.health(&a).unwrap().quarantined_until().is_none());
    }

    #[test]
    fn test_success_resets_and_clears_quarantine() {
        let (pool, _clock) = pool_with_clock(PoolConfig::default());
        pool.add(["http://a:1"]);
        let a = Resource::new("http://a:1");

        for _ in 0..5 {
            pool.report_failure(&a);
        }
        assert!(pool.acquire().is_err());

        pool.report_success(&a);
        let health = pool.health(&a).unwrap();
        assert_eq!(health.consecutive_failures(), 0);
        assert!(health.quarantined_until().is_none());
        assert_eq!(pool.acquire().unwrap(), a);
    }

    #[test]
    fn test_quarantined_only_when_threshold_reached() {
        for failures in 0..6u32 {
            let (pool, _clock) = pool_with_clock(PoolConfig::default());
            pool.add(["http://a:1"]);
            let a = Resource::new("http://a:1");
            for _ in 0..failures {
                pool.report_failure(&a);
            }
            let quarantined = pool.status().quarantined == 1;
            assert_eq!(quarantined, failures >= 3, "failures = {failures}");
        }
    }

    #[test]
    fn test_status_global_success_rate() {
        let pool = ResourcePool::with_defaults();
        pool.add(["http://a:1", "http://b:1"]);
        pool.report_success(&Resource::new("http://a:1"));
        pool.report_success(&Resource::new("http://a:1"));
        pool.report_failure(&Resource::new("http://b:1"));
        pool.report_success(&Resource::new("http://b:1"));

        let status = pool.status();
        assert_eq!(status.total_requests, 4);
        assert_eq!(status.total_successes, 3);
        assert!((status.global_success_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_redacts_labels() {
        let (pool, clock) = pool_with_clock(PoolConfig::default());
        pool.add([Resource::credential("serpapi", "bc20bca64032a7ac")]);
        let key = Resource::credential("serpapi", "bc20bca64032a7ac");
        for _ in 0..3 {
            pool.report_failure(&key);
        }
        clock.advance(Duration::from_secs(100));

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].label, "serpapi://bc20…");
        assert!(snapshot[0].quarantined);
        assert_eq!(snapshot[0].quarantine_remaining_ms, Some(200_000));
    }

    #[test]
    fn test_unknown_resource_reports_are_ignored() {
        let pool = ResourcePool::with_defaults();
        pool.report_failure(&Resource::new("http://ghost:1"));
        pool.report_success(&Resource::new("http://ghost:1"));
        assert_eq!(pool.status().total_requests, 0);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_and_report() {
        let pool = Arc::new(ResourcePool::with_defaults());
        pool.add((0..8).map(|i| format!("http://proxy{i}:8080")));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                let resource = pool.acquire().unwrap();
                pool.report_success(&resource);
                resource
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            seen.insert(handle.await.unwrap());
        }
        assert!(seen.len() > 1);
        assert_eq!(pool.status().total_successes, 16);
    }
}
