//! Fetcher statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Counters for one strategy, or for all strategies combined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyStats {
    /// Requests sent.
    pub requests: u64,
    /// Requests answered with 2xx.
    pub successes: u64,
    /// Requests that failed (transport error, non-2xx, 429).
    pub failures: u64,
    /// Failures that were rate limits.
    pub rate_limited: u64,
    /// Bodies that yielded identifiers.
    pub non_empty: u64,
    /// Bodies that yielded nothing.
    pub empty: u64,
    /// Attempts aborted because the pool was exhausted.
    pub pool_exhausted: u64,
}

impl StrategyStats {
    /// Returns `successes / max(1, requests)`.
    pub fn success_rate(&self) -> f64 {
        self.successes as f64 / self.requests.max(1) as f64
    }

    fn apply(&mut self, event: StatEvent) {
        match event {
            StatEvent::Request => self.requests += 1,
            StatEvent::Success => self.successes += 1,
            StatEvent::Failure { rate_limited } => {
                self.failures += 1;
                if rate_limited {
                    self.rate_limited += 1;
                }
            }
            StatEvent::PoolExhausted => self.pool_exhausted += 1,
            StatEvent::NonEmpty => self.non_empty += 1,
            StatEvent::Empty => self.empty += 1,
        }
    }
}

/// Read-only snapshot of fetcher statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetcherStats {
    /// Cascades run (searches and detail lookups).
    pub cascades: u64,
    /// Cascades that found identifiers.
    pub cascades_found: u64,
    /// Totals across strategies.
    pub totals: StrategyStats,
    /// Counters per strategy name.
    pub strategies: BTreeMap<String, StrategyStats>,
}

impl FetcherStats {
    /// Returns the global request success rate.
    pub fn success_rate(&self) -> f64 {
        self.totals.success_rate()
    }

    /// Returns the counters of one strategy.
    pub fn strategy(&self, name: &str) -> Option<&StrategyStats> {
        self.strategies.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatEvent {
    Request,
    Success,
    Failure { rate_limited: bool },
    PoolExhausted,
    NonEmpty,
    Empty,
}

/// Shared, lock-guarded statistics.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    inner: Mutex<FetcherStats>,
}

impl StatsRecorder {
    pub(crate) fn record(&self, strategy: &str, event: StatEvent) {
        let mut stats = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        stats.totals.apply(event);
        match stats.strategies.get_mut(strategy) {
            Some(entry) => entry.apply(event),
            None => {
                let mut entry = StrategyStats::default();
                entry.apply(event);
                stats.strategies.insert(strategy.to_string(), entry);
            }
        }
    }

    pub(crate) fn record_cascade(&self, found: bool) {
        let mut stats = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        stats.cascades += 1;
        if found {
            stats.cascades_found += 1;
        }
    }

    pub(crate) fn snapshot(&self) -> FetcherStats {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
