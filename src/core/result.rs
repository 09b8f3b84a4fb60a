//! Cascade result structures.
//!
//! A cascade always produces a [`CascadeOutcome`]: the identifier set
//! (possibly empty) plus per-strategy diagnostics and a pool snapshot. The
//! diagnostics keep "the source answered with nothing" apart from "the source
//! could not be reached", even though the cascade falls through on both.

use crate::core::types::Identifier;
use crate::pool::PoolStatus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// How a single strategy ended within a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyOutcome {
    /// A body was fetched and contained identifiers. Stops the cascade.
    Found {
        /// Number of distinct identifiers extracted.
        count: usize,
    },

    /// A body was fetched but contained no recognizable identifiers.
    Empty,

    /// Every attempt failed at the transport or HTTP level.
    Failed {
        /// Message of the last failure.
        last_error: String,
        /// Whether the last failure was a rate limit.
        rate_limited: bool,
    },

    /// Every attempt found the pool exhausted; no request was sent.
    PoolExhausted,

    /// The strategy could not build a request for the query.
    Skipped {
        /// Why the request could not be built.
        reason: String,
    },
}

impl StrategyOutcome {
    /// Returns `true` if identifiers were found.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Returns `true` if the upstream answered but had nothing.
    pub fn is_empty_answer(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns `true` if the upstream could not be reached.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed { .. } | Self::PoolExhausted | Self::Skipped { .. }
        )
    }

    /// Returns the name of the outcome.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Found { .. } => "found",
            Self::Empty => "empty",
            Self::Failed { .. } => "failed",
            Self::PoolExhausted => "pool_exhausted",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// Diagnostics for one strategy tried during a cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyReport {
    /// Name of the strategy.
    pub strategy: String,

    /// How the strategy ended.
    pub outcome: StrategyOutcome,

    /// Number of retry-loop attempts used.
    pub attempts: u32,

    /// Number of requests actually sent.
    pub requests: u32,

    /// Wall time spent in this strategy, waits included.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

/// Terminal state of a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Termination {
    /// A strategy produced a non-empty set.
    Found {
        /// Name of the winning strategy.
        strategy: String,
    },

    /// All strategies were tried; none produced identifiers.
    NothingFound,

    /// Every attempt of every strategy found the pool exhausted.
    PoolExhausted,
}

/// The complete result of one cascade run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeOutcome {
    /// Unique identifier of this run, for log correlation.
    pub id: String,

    /// The logical query (or parent identifier for detail lookups).
    pub query: String,

    /// Identifiers produced by the winning strategy.
    pub identifiers: BTreeSet<Identifier>,

    /// Per-strategy diagnostics in the order tried.
    pub strategies: Vec<StrategyReport>,

    /// How the cascade ended.
    pub termination: Termination,

    /// Pool snapshot taken when the cascade ended.
    pub pool_status: PoolStatus,

    /// When the cascade started.
    pub started_at: DateTime<Utc>,

    /// When the cascade completed.
    pub completed_at: DateTime<Utc>,

    /// Total wall time.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl CascadeOutcome {
    /// Builds an outcome, deriving the termination from the reports.
    pub(crate) fn new(
        query: impl Into<String>,
        identifiers: BTreeSet<Identifier>,
        strategies: Vec<StrategyReport>,
        pool_status: PoolStatus,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let termination = match strategies.iter().find(|r| r.outcome.is_found()) {
            Some(report) => Termination::Found {
                strategy: report.strategy.clone(),
            },
            None if !strategies.is_empty()
                && strategies
                    .iter()
                    .all(|r| r.outcome == StrategyOutcome::PoolExhausted) =>
            {
                Termination::PoolExhausted
            }
            None => Termination::NothingFound,
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            query: query.into(),
            identifiers,
            strategies,
            termination,
            pool_status,
            started_at,
            completed_at: Utc::now(),
            duration,
        }
    }

    /// Returns `true` if no identifiers were found.
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Returns the number of identifiers found.
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    /// Returns the canonical values in sorted order.
    pub fn values(&self) -> Vec<&str> {
        self.identifiers.iter().map(Identifier::as_str).collect()
    }

    /// Returns the name of the strategy that produced the identifiers.
    pub fn winning_strategy(&self) -> Option<&str> {
        match &self.termination {
            Termination::Found { strategy } => Some(strategy),
            _ => None,
        }
    }

    /// Returns the names of the strategies tried, in order.
    pub fn attempted_strategies(&self) -> Vec<&str> {
        self.strategies.iter().map(|r| r.strategy.as_str()).collect()
    }

    /// Returns `true` if the cascade never got a resource to work with.
    pub fn was_pool_exhausted(&self) -> bool {
        self.termination == Termination::PoolExhausted
    }

    /// Returns the total number of requests sent across strategies.
    pub fn request_count(&self) -> u32 {
        self.strategies.iter().map(|r| r.requests).sum()
    }

    /// Consumes the outcome and returns the identifier set.
    pub fn into_identifiers(self) -> BTreeSet<Identifier> {
        self.identifiers
    }
}

/// Serde helper for Duration serialization.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(strategy: &str, outcome: StrategyOutcome) -> StrategyReport {
        StrategyReport {
            strategy: strategy.to_string(),
            outcome,
            attempts: 1,
            requests: 1,
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_outcome_found() {
        let ids: BTreeSet<_> = [Identifier::new("WO2016162604", "lens")].into_iter().collect();
        let outcome = CascadeOutcome::new(
            "aspirin patent",
            ids,
            vec![
                report("google-patents", StrategyOutcome::Empty),
                report("lens", StrategyOutcome::Found { count: 1 }),
            ],
            PoolStatus::default(),
            Utc::now(),
            Duration::from_millis(10),
        );

        assert_eq!(outcome.winning_strategy(), Some("lens"));
        assert_eq!(outcome.values(), vec!["WO2016162604"]);
        assert_eq!(outcome.request_count(), 2);
        assert!(!outcome.was_pool_exhausted());
    }

    #[test]
    fn test_outcome_pool_exhausted_vs_nothing_found() {
        let exhausted = CascadeOutcome::new(
            "q",
            BTreeSet::new(),
            vec![
                report("a", StrategyOutcome::PoolExhausted),
                report("b", StrategyOutcome::PoolExhausted),
            ],
            PoolStatus::default(),
            Utc::now(),
            Duration::ZERO,
        );
        assert!(exhausted.was_pool_exhausted());
        assert!(exhausted.is_empty());

        let nothing = CascadeOutcome::new(
            "q",
            BTreeSet::new(),
            vec![
                report("a", StrategyOutcome::PoolExhausted),
                report("b", StrategyOutcome::Empty),
            ],
            PoolStatus::default(),
            Utc::now(),
            Duration::ZERO,
        );
        assert_eq!(nothing.termination, Termination::NothingFound);
    }

    #[test]
    fn test_strategy_outcome_classification() {
        assert!(StrategyOutcome::Empty.is_empty_answer());
        assert!(!StrategyOutcome::Empty.is_failure());
        assert!(StrategyOutcome::PoolExhausted.is_failure());
        assert_eq!(
            StrategyOutcome::Failed {
                last_error: "boom".into(),
                rate_limited: false
            }
            .name(),
            "failed"
        );
    }
}
