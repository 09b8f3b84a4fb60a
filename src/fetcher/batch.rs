//! Query planning and batch search.

use crate::aggregate::{AggregatedRecord, Aggregator};
use crate::core::result::duration_serde;
use crate::core::{CascadeOutcome, FetchError, FetchResult, Identifier};
use crate::fetcher::cascade::CascadingFetcher;
use crate::fetcher::stats::FetcherStats;
use crate::pool::PoolStatus;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Publication years appended to the subject name, one query each.
const YEAR_HINTS: &[&str] = &["WO2011", "WO2016", "WO2018", "WO2020", "WO2021", "WO2023"];

/// Development codes beyond this count are ignored.
pub const MAX_DEV_CODES: usize = 3;

/// The ordered list of logical queries for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// What the queries are about, e.g. a molecule name.
    pub subject: String,
    /// Queries in execution order.
    pub queries: Vec<String>,
}

impl QueryPlan {
    /// Creates a plan from explicit queries.
    pub fn new<I, S>(subject: impl Into<String>, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into(),
            queries: queries.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds the standard plan for a subject.
    ///
    /// `"<name> patent"`, then `"<name> WO<year>"` for each year hint, then
    /// `"<code> patent WO"` for up to [`MAX_DEV_CODES`] development codes.
    ///
    /// ```rust
    /// use patentbridge::fetcher::QueryPlan;
    ///
    /// let plan = QueryPlan::for_subject("darolutamide", &["ODM-201"]);
    /// assert_eq!(plan.queries[0], "darolutamide patent");
    /// assert_eq!(plan.queries[1], "darolutamide WO2011");
    /// assert_eq!(plan.queries.last().unwrap(), "ODM-201 patent WO");
    /// assert_eq!(plan.len(), 8);
    /// ```
    pub fn for_subject<S: AsRef<str>>(name: &str, dev_codes: &[S]) -> Self {
        let name = name.trim();
        let mut queries = Vec::with_capacity(1 + YEAR_HINTS.len() + MAX_DEV_CODES);
        queries.push(format!("{name} patent"));
        queries.extend(YEAR_HINTS.iter().map(|year| format!("{name} {year}")));
        queries.extend(
            dev_codes
                .iter()
                .map(|code| code.as_ref().trim())
                .filter(|code| !code.is_empty())
                .take(MAX_DEV_CODES)
                .map(|code| format!("{code} patent WO")),
        );

        Self {
            subject: name.to_string(),
            queries,
        }
    }

    /// Appends a query.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.queries.push(query.into());
        self
    }

    /// Returns the number of queries.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Returns `true` if the plan has no queries.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Configuration for a batch search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Cascades run at the same time.
    pub concurrency: usize,

    /// Minimum spacing between query starts, across all concurrent cascades.
    #[serde(with = "duration_serde", rename = "inter_query_pause_ms")]
    pub inter_query_pause: Duration,

    /// Minimum spacing between detail lookup starts.
    #[serde(with = "duration_serde", rename = "inter_detail_pause_ms")]
    pub inter_detail_pause: Duration,

    /// Whether primary identifiers are resolved through detail lookups.
    pub resolve_details: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            inter_query_pause: Duration::from_millis(1500),
            inter_detail_pause: Duration::from_secs(1),
            resolve_details: true,
        }
    }
}

impl BatchConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default settings without pauses.
    pub fn immediate() -> Self {
        Self {
            inter_query_pause: Duration::ZERO,
            inter_detail_pause: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Sets the concurrency. Values below 1 are raised to 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the pause between queries.
    pub fn with_inter_query_pause(mut self, pause: Duration) -> Self {
        self.inter_query_pause = pause;
        self
    }

    /// Sets the pause between detail lookups.
    pub fn with_inter_detail_pause(mut self, pause: Duration) -> Self {
        self.inter_detail_pause = pause;
        self
    }

    /// Enables or disables detail resolution.
    pub fn with_resolve_details(mut self, resolve: bool) -> Self {
        self.resolve_details = resolve;
        self
    }
}

/// The result of a batch search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Unique batch ID.
    pub id: String,

    /// Subject of the plan.
    pub subject: String,

    /// Search cascade outcomes, in plan order.
    pub searches: Vec<CascadeOutcome>,

    /// Detail cascade outcomes, in primary-identifier order.
    pub details: Vec<CascadeOutcome>,

    /// Distinct primary identifiers, sorted.
    pub primary: Vec<String>,

    /// Distinct derived identifiers, sorted.
    pub derived: Vec<String>,

    /// Aggregated records for primary and derived identifiers, ordered by key.
    pub records: Vec<AggregatedRecord>,

    /// Pool snapshot at the end of the batch.
    pub pool_status: PoolStatus,

    /// Fetcher statistics at the end of the batch.
    pub stats: FetcherStats,

    /// When the batch started.
    pub started_at: DateTime<Utc>,

    /// Total wall time.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl BatchReport {
    /// Returns the number of queries run.
    pub fn query_count(&self) -> usize {
        self.searches.len()
    }

    /// Returns the queries whose cascade found nothing.
    pub fn empty_queries(&self) -> Vec<&str> {
        self.searches
            .iter()
            .filter(|o| o.is_empty())
            .map(|o| o.query.as_str())
            .collect()
    }

    /// Returns the derived records of one parent.
    pub fn derived_from<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a AggregatedRecord> {
        self.records
            .iter()
            .filter(move |r| r.parent.as_deref() == Some(parent))
    }
}

/// Runs a [`QueryPlan`] through a shared [`CascadingFetcher`].
///
/// Every query runs as a search cascade. Each distinct primary identifier is
/// then resolved with a detail cascade, and everything is aggregated into a
/// [`BatchReport`].
#[derive(Debug, Clone)]
pub struct BatchSearch {
    fetcher: Arc<CascadingFetcher>,
    config: BatchConfig,
}

impl BatchSearch {
    /// Creates a batch runner with default configuration.
    pub fn new(fetcher: Arc<CascadingFetcher>) -> Self {
        Self::with_config(fetcher, BatchConfig::default())
    }

    /// Creates a batch runner with the given configuration.
    pub fn with_config(fetcher: Arc<CascadingFetcher>, config: BatchConfig) -> Self {
        Self { fetcher, config }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Runs the plan.
    ///
    /// # Errors
    ///
    /// See [`run_with_cancel`](Self::run_with_cancel).
    pub async fn run(&self, plan: &QueryPlan) -> FetchResult<BatchReport> {
        self.run_with_cancel(plan, &CancellationToken::new()).await
    }

    /// Runs the plan, observing `cancel`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Cancelled`] if `cancel` fires; cascades still in
    /// flight are abandoned.
    pub async fn run_with_cancel(
        &self,
        plan: &QueryPlan,
        cancel: &CancellationToken,
    ) -> FetchResult<BatchReport> {
        let id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        tracing::info!(
            batch_id = %id,
            subject = %plan.subject,
            queries = plan.len(),
            concurrency = self.config.concurrency,
            "Starting batch search"
        );

        let searches: Vec<CascadeOutcome> = self
            .staggered(plan.queries.clone(), self.config.inter_query_pause, cancel, |fetcher, query, cancel| async move {
                fetcher.execute_with_cancel(&query, &cancel).await
            })
            .await?;

        let mut aggregator = Aggregator::new();
        let mut primary: BTreeSet<Identifier> = BTreeSet::new();
        for outcome in &searches {
            aggregator.extend(&outcome.identifiers);
            primary.extend(outcome.identifiers.iter().cloned());
        }

        let details = if self.config.resolve_details && !primary.is_empty() {
            let parents: Vec<String> = primary.iter().map(|id| id.value.clone()).collect();
            self.staggered(parents, self.config.inter_detail_pause, cancel, |fetcher, parent, cancel| async move {
                fetcher.fetch_detail_with_cancel(&parent, &cancel).await
            })
            .await?
        } else {
            Vec::new()
        };

        let mut derived: BTreeSet<String> = BTreeSet::new();
        for outcome in &details {
            aggregator.extend(&outcome.identifiers);
            derived.extend(outcome.identifiers.iter().map(|id| id.value.clone()));
        }

        let report = BatchReport {
            id,
            subject: plan.subject.clone(),
            searches,
            details,
            primary: primary.into_iter().map(|id| id.value).collect(),
            derived: derived.into_iter().collect(),
            records: aggregator.finish(),
            pool_status: self.fetcher.pool().status(),
            stats: self.fetcher.stats(),
            started_at,
            duration: start.elapsed(),
        };

        if report.pool_status.is_exhausted() {
            tracing::warn!(
                batch_id = %report.id,
                total = report.pool_status.total,
                quarantined = report.pool_status.quarantined,
                "Batch ended with no healthy resource"
            );
        }
        tracing::info!(
            batch_id = %report.id,
            primary = report.primary.len(),
            derived = report.derived.len(),
            empty_queries = report.empty_queries().len(),
            duration_ms = report.duration.as_millis() as u64,
            "Batch search completed"
        );
        crate::audit::emit_batch_completed(
            &report.id,
            &report.subject,
            report.query_count(),
            report.primary.len(),
            report.derived.len(),
            report.duration,
        );

        Ok(report)
    }

    /// Runs `task` for every input with bounded concurrency. Results keep
    /// input order; the first error aborts the rest.
    ///
    /// Starts are serialized through a shared gate: no input starts sooner
    /// than `pause` after the previous input started or finished, whatever
    /// the concurrency.
    async fn staggered<F, Fut>(
        &self,
        inputs: Vec<String>,
        pause: Duration,
        cancel: &CancellationToken,
        task: F,
    ) -> FetchResult<Vec<CascadeOutcome>>
    where
        F: Fn(Arc<CascadingFetcher>, String, CancellationToken) -> Fut,
        Fut: std::future::Future<Output = FetchResult<CascadeOutcome>>,
    {
        let concurrency = self.config.concurrency.max(1);
        let task = &task;
        let gate: Mutex<Option<tokio::time::Instant>> = Mutex::new(None);
        let gate = &gate;

        stream::iter(inputs)
            .map(|input| {
                let fetcher = Arc::clone(&self.fetcher);
                let cancel = cancel.clone();
                async move {
                    let start_at = reserve_start(gate, pause);
                    if start_at > tokio::time::Instant::now() {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                            _ = tokio::time::sleep_until(start_at) => {}
                        }
                    }

                    let result = task(fetcher, input, cancel).await;
                    mark_finished(gate);
                    result
                }
            })
            .buffered(concurrency)
            .try_collect()
            .await
    }
}

/// Claims the next start slot: `pause` after the latest start or finish.
fn reserve_start(
    gate: &Mutex<Option<tokio::time::Instant>>,
    pause: Duration,
) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    let mut last = gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let start_at = match *last {
        Some(previous) => (previous + pause).max(now),
        None => now,
    };
    *last = Some(start_at);
    start_at
}

fn mark_finished(gate: &Mutex<Option<tokio::time::Instant>>) {
    let now = tokio::time::Instant::now();
    let mut last = gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *last = Some(last.map_or(now, |previous| previous.max(now)));
}
