//! The cascading fetcher.

use crate::audit::CascadeKind;
use crate::core::result::duration_serde;
use crate::core::{
    ArcStrategy, ArcTransport, CascadeOutcome, FetchError, FetchRequest, FetchResult, Identifier,
    Resource, Strategy, StrategyOutcome, StrategyReport, Transport,
};
use crate::fetcher::backoff::{BackoffPolicy, RetryConfig};
use crate::fetcher::stats::{FetcherStats, StatEvent, StatsRecorder};
use crate::pool::ResourcePool;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Configuration for the cascading fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Retry budget per search strategy.
    pub retry: RetryConfig,

    /// Retry budget per detail strategy.
    pub detail_retry: RetryConfig,

    /// Pause before moving to the next search strategy.
    #[serde(with = "duration_serde", rename = "inter_strategy_pause_ms")]
    pub inter_strategy_pause: Duration,

    /// Pause before moving to the next detail strategy.
    #[serde(with = "duration_serde", rename = "detail_inter_strategy_pause_ms")]
    pub detail_inter_strategy_pause: Duration,

    /// Pause after an attempt found the pool exhausted.
    #[serde(with = "duration_serde", rename = "no_resource_pause_ms")]
    pub no_resource_pause: Duration,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            detail_retry: RetryConfig::detail(),
            inter_strategy_pause: Duration::from_secs(2),
            detail_inter_strategy_pause: Duration::from_millis(1500),
            no_resource_pause: Duration::from_secs(1),
        }
    }
}

impl CascadeConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default attempt budgets with every wait set to zero.
    pub fn immediate() -> Self {
        Self {
            retry: RetryConfig::default().with_backoff(BackoffPolicy::zero()),
            detail_retry: RetryConfig::detail().with_backoff(BackoffPolicy::zero()),
            inter_strategy_pause: Duration::ZERO,
            detail_inter_strategy_pause: Duration::ZERO,
            no_resource_pause: Duration::ZERO,
        }
    }

    /// Sets the search retry budget.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the detail retry budget.
    pub fn with_detail_retry(mut self, retry: RetryConfig) -> Self {
        self.detail_retry = retry;
        self
    }

    /// Sets the pause between search strategies.
    pub fn with_inter_strategy_pause(mut self, pause: Duration) -> Self {
        self.inter_strategy_pause = pause;
        self
    }

    /// Sets the pause between detail strategies.
    pub fn with_detail_inter_strategy_pause(mut self, pause: Duration) -> Self {
        self.detail_inter_strategy_pause = pause;
        self
    }

    /// Sets the pause after a pool-exhausted attempt.
    pub fn with_no_resource_pause(mut self, pause: Duration) -> Self {
        self.no_resource_pause = pause;
        self
    }
}

/// Builder for creating a [`CascadingFetcher`].
pub struct CascadingFetcherBuilder {
    pool: Option<Arc<ResourcePool>>,
    transport: Option<ArcTransport>,
    search: Vec<ArcStrategy>,
    detail: Vec<ArcStrategy>,
    config: CascadeConfig,
}

impl CascadingFetcherBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            pool: None,
            transport: None,
            search: Vec::new(),
            detail: Vec::new(),
            config: CascadeConfig::default(),
        }
    }

    /// Sets the shared resource pool.
    pub fn with_pool(mut self, pool: Arc<ResourcePool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Sets the transport.
    pub fn with_transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets a transport wrapped in an Arc.
    pub fn with_arc_transport(mut self, transport: ArcTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Appends a search strategy. Order is priority.
    pub fn add_strategy<S: Strategy + 'static>(mut self, strategy: S) -> Self {
        self.search.push(Arc::new(strategy));
        self
    }

    /// Appends a search strategy wrapped in an Arc.
    pub fn add_arc_strategy(mut self, strategy: ArcStrategy) -> Self {
        self.search.push(strategy);
        self
    }

    /// Appends a detail strategy. Order is priority.
    pub fn add_detail_strategy<S: Strategy + 'static>(mut self, strategy: S) -> Self {
        self.detail.push(Arc::new(strategy));
        self
    }

    /// Appends a detail strategy wrapped in an Arc.
    pub fn add_arc_detail_strategy(mut self, strategy: ArcStrategy) -> Self {
        self.detail.push(strategy);
        self
    }

    /// Appends the built-in search and detail catalogs.
    pub fn with_builtin_strategies(mut self) -> Self {
        self.search.extend(crate::strategy::search_strategies());
        self.detail.extend(crate::strategy::detail_strategies());
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: CascadeConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Configuration`] if the pool or transport is
    /// missing, or no search strategy was added.
    pub fn build(self) -> FetchResult<CascadingFetcher> {
        let pool = self
            .pool
            .ok_or_else(|| FetchError::configuration("A resource pool is required"))?;
        let transport = self
            .transport
            .ok_or_else(|| FetchError::configuration("A transport is required"))?;
        if self.search.is_empty() {
            return Err(FetchError::configuration(
                "At least one search strategy is required",
            ));
        }

        Ok(CascadingFetcher {
            pool,
            transport,
            search: self.search,
            detail: self.detail,
            config: self.config,
            stats: StatsRecorder::default(),
        })
    }
}

impl Default for CascadingFetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tries strategies in priority order until one yields identifiers.
///
/// For each strategy an inner retry loop acquires a resource, sends the
/// request, and reports the outcome to the pool:
///
/// - pool exhausted: attempt aborted, `no_resource_pause`, next attempt
/// - transport error or non-2xx: resource failure, `delay(attempt)`
/// - 429: resource failure, `rate_limit_delay(attempt, retry_after)`
/// - any other transport error: not charged to the resource, strategy failed
/// - 2xx: resource success, body extracted
///
/// No wait follows the final attempt. A strategy whose body yields
/// identifiers ends the cascade; an empty body or an exhausted loop moves on
/// to the next strategy after `inter_strategy_pause`. Exhausting every
/// strategy is not an error.
///
/// # Example
///
/// ```rust,ignore
/// use patentbridge::fetcher::{CascadeConfig, CascadingFetcher};
/// use patentbridge::pool::ResourcePool;
/// use patentbridge::transport::MockTransport;
/// use std::sync::Arc;
///
/// let pool = Arc::new(ResourcePool::with_defaults());
/// pool.add(["http://proxy1:8080", "http://proxy2:8080"]);
///
/// let fetcher = CascadingFetcher::builder()
///     .with_pool(pool)
///     .with_transport(MockTransport::new().with_body("lens.org", "WO2016162604"))
///     .with_builtin_strategies()
///     .with_config(CascadeConfig::immediate())
///     .build()?;
///
/// let outcome = fetcher.execute("darolutamide patent").await?;
/// assert_eq!(outcome.values(), vec!["WO2016162604"]);
/// assert_eq!(outcome.winning_strategy(), Some("lens"));
/// ```
pub struct CascadingFetcher {
    pool: Arc<ResourcePool>,
    transport: ArcTransport,
    search: Vec<ArcStrategy>,
    detail: Vec<ArcStrategy>,
    config: CascadeConfig,
    stats: StatsRecorder,
}

struct StrategyRun {
    report: StrategyReport,
    identifiers: BTreeSet<Identifier>,
}

impl CascadingFetcher {
    /// Creates a new builder.
    pub fn builder() -> CascadingFetcherBuilder {
        CascadingFetcherBuilder::new()
    }

    /// Returns the shared pool.
    pub fn pool(&self) -> &Arc<ResourcePool> {
        &self.pool
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Returns the names of the search strategies, in priority order.
    pub fn search_strategy_names(&self) -> Vec<&str> {
        self.search.iter().map(|s| s.name()).collect()
    }

    /// Returns the names of the detail strategies, in priority order.
    pub fn detail_strategy_names(&self) -> Vec<&str> {
        self.detail.iter().map(|s| s.name()).collect()
    }

    /// Returns a snapshot of request statistics.
    pub fn stats(&self) -> FetcherStats {
        self.stats.snapshot()
    }

    /// Runs the search cascade for `query`.
    ///
    /// # Errors
    ///
    /// This method only fails with [`FetchError::Cancelled`], which cannot
    /// happen without a token; use [`execute_with_cancel`](Self::execute_with_cancel)
    /// to make a run cancellable.
    pub async fn execute(&self, query: &str) -> FetchResult<CascadeOutcome> {
        self.execute_with_cancel(query, &CancellationToken::new())
            .await
    }

    /// Runs the search cascade for `query`, observing `cancel`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Cancelled`] if `cancel` fires. Cancellation is
    /// observed between attempts, during waits and during the network call.
    /// The attempt in flight reports nothing against its resource.
    pub async fn execute_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> FetchResult<CascadeOutcome> {
        self.run(
            CascadeKind::Search,
            query,
            None,
            &self.search,
            &self.config.retry,
            self.config.inter_strategy_pause,
            cancel,
        )
        .await
    }

    /// Runs the detail cascade for a primary identifier.
    ///
    /// Every derived identifier carries `parent = identifier`.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn fetch_detail(&self, identifier: &str) -> FetchResult<CascadeOutcome> {
        self.fetch_detail_with_cancel(identifier, &CancellationToken::new())
            .await
    }

    /// Runs the detail cascade for a primary identifier, observing `cancel`.
    ///
    /// # Errors
    ///
    /// See [`execute_with_cancel`](Self::execute_with_cancel).
    pub async fn fetch_detail_with_cancel(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> FetchResult<CascadeOutcome> {
        self.run(
            CascadeKind::Detail,
            identifier,
            Some(identifier),
            &self.detail,
            &self.config.detail_retry,
            self.config.detail_inter_strategy_pause,
            cancel,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        kind: CascadeKind,
        query: &str,
        parent: Option<&str>,
        strategies: &[ArcStrategy],
        retry: &RetryConfig,
        inter_strategy_pause: Duration,
        cancel: &CancellationToken,
    ) -> FetchResult<CascadeOutcome> {
        let started_at = Utc::now();
        let start = Instant::now();

        tracing::debug!(
            query = %query,
            kind = ?kind,
            strategies = strategies.len(),
            "Starting cascade"
        );

        let mut reports = Vec::with_capacity(strategies.len());
        let mut identifiers = BTreeSet::new();

        for (position, strategy) in strategies.iter().enumerate() {
            if position > 0 {
                self.pause(inter_strategy_pause, cancel).await?;
            }

            let run = match self.run_strategy(strategy.as_ref(), query, retry, cancel).await {
                Ok(run) => run,
                Err(e) => {
                    tracing::info!(query = %query, strategy = %strategy.name(), "Cascade cancelled");
                    return Err(e);
                }
            };

            let found = run.report.outcome.is_found();
            reports.push(run.report);
            if found {
                identifiers = match parent {
                    Some(parent) => run
                        .identifiers
                        .into_iter()
                        .map(|id| id.with_parent(parent))
                        .collect(),
                    None => run.identifiers,
                };
                break;
            }
        }

        let outcome = CascadeOutcome::new(
            query,
            identifiers,
            reports,
            self.pool.status(),
            started_at,
            start.elapsed(),
        );
        self.stats.record_cascade(!outcome.is_empty());

        if outcome.was_pool_exhausted() {
            tracing::warn!(
                query = %query,
                total = outcome.pool_status.total,
                quarantined = outcome.pool_status.quarantined,
                "Cascade ran without a healthy resource"
            );
        }
        tracing::info!(
            query = %query,
            kind = ?kind,
            found = outcome.len(),
            strategy = ?outcome.winning_strategy(),
            requests = outcome.request_count(),
            duration_ms = outcome.duration.as_millis() as u64,
            "Cascade completed"
        );
        crate::audit::emit_cascade_completed(&outcome, kind);

        Ok(outcome)
    }

    async fn run_strategy(
        &self,
        strategy: &dyn Strategy,
        query: &str,
        retry: &RetryConfig,
        cancel: &CancellationToken,
    ) -> FetchResult<StrategyRun> {
        let start = Instant::now();
        let name = strategy.name();

        let request = match strategy.build_request(query) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(strategy = %name, error = %e, "Strategy skipped");
                return Ok(StrategyRun {
                    report: StrategyReport {
                        strategy: name.to_string(),
                        outcome: StrategyOutcome::Skipped {
                            reason: e.to_string(),
                        },
                        attempts: 0,
                        requests: 0,
                        duration: start.elapsed(),
                    },
                    identifiers: BTreeSet::new(),
                });
            }
        };

        let mut attempts = 0;
        let mut requests = 0;
        let mut last_error: Option<FetchError> = None;

        for attempt in 0..retry.max_attempts {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            attempts += 1;
            let last = retry.is_last_attempt(attempt);

            let resource = match self.pool.acquire() {
                Ok(resource) => resource,
                Err(e) => {
                    self.stats.record(name, StatEvent::PoolExhausted);
                    tracing::debug!(
                        strategy = %name,
                        attempt = attempt + 1,
                        error = %e,
                        "No healthy resource"
                    );
                    last_error = Some(e);
                    if !last {
                        self.pause(self.config.no_resource_pause, cancel).await?;
                    }
                    continue;
                }
            };

            requests += 1;
            self.stats.record(name, StatEvent::Request);

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                response = self.send(&request, &resource) => response,
            };

            match response {
                Ok(body) => {
                    self.pool.report_success(&resource);
                    self.stats.record(name, StatEvent::Success);

                    let identifiers = strategy.extract(&body);
                    let outcome = if identifiers.is_empty() {
                        self.stats.record(name, StatEvent::Empty);
                        tracing::debug!(strategy = %name, "Strategy answered with nothing");
                        StrategyOutcome::Empty
                    } else {
                        self.stats.record(name, StatEvent::NonEmpty);
                        tracing::debug!(
                            strategy = %name,
                            count = identifiers.len(),
                            "Strategy found identifiers"
                        );
                        StrategyOutcome::Found {
                            count: identifiers.len(),
                        }
                    };

                    return Ok(StrategyRun {
                        report: StrategyReport {
                            strategy: name.to_string(),
                            outcome,
                            attempts,
                            requests,
                            duration: start.elapsed(),
                        },
                        identifiers,
                    });
                }
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => {
                    if e.counts_against_resource() {
                        self.pool.report_failure(&resource);
                    }
                    self.stats.record(
                        name,
                        StatEvent::Failure {
                            rate_limited: e.is_rate_limited(),
                        },
                    );

                    if !e.is_recoverable() {
                        tracing::warn!(
                            strategy = %name,
                            attempt = attempt + 1,
                            error = %e,
                            "Attempt failed and cannot be retried"
                        );
                        last_error = Some(e);
                        break;
                    }

                    let wait = match &e {
                        FetchError::RateLimited { retry_after, .. } => {
                            retry.backoff.rate_limit_delay(attempt, *retry_after)
                        }
                        _ => retry.backoff.delay(attempt),
                    };
                    tracing::warn!(
                        strategy = %name,
                        attempt = attempt + 1,
                        max_attempts = retry.max_attempts,
                        resource = e.resource().unwrap_or("-"),
                        error = %e,
                        wait_ms = if last { 0 } else { wait.as_millis() as u64 },
                        "Attempt failed"
                    );
                    last_error = Some(e);

                    if !last {
                        self.pause(wait, cancel).await?;
                    }
                }
            }
        }

        let outcome = match last_error {
            Some(FetchError::PoolExhausted { .. }) if requests == 0 => StrategyOutcome::PoolExhausted,
            Some(e) => StrategyOutcome::Failed {
                rate_limited: e.is_rate_limited(),
                last_error: e.to_string(),
            },
            None => StrategyOutcome::Failed {
                last_error: "no attempts made".to_string(),
                rate_limited: false,
            },
        };
        tracing::warn!(
            strategy = %name,
            attempts,
            outcome = outcome.name(),
            "Strategy exhausted its attempts"
        );

        Ok(StrategyRun {
            report: StrategyReport {
                strategy: name.to_string(),
                outcome,
                attempts,
                requests,
                duration: start.elapsed(),
            },
            identifiers: BTreeSet::new(),
        })
    }

    /// One round-trip, classified. Only 2xx bodies come back as `Ok`.
    async fn send(&self, request: &FetchRequest, resource: &Resource) -> FetchResult<String> {
        let response = self.transport.send(request, Some(resource)).await?;

        if response.is_success() {
            Ok(response.body)
        } else if response.is_rate_limited() {
            Err(FetchError::RateLimited {
                resource: resource.label(),
                retry_after: response.retry_after,
            })
        } else {
            Err(FetchError::HttpStatus {
                status: response.status,
                resource: resource.label(),
            })
        }
    }

    async fn pause(&self, wait: Duration, cancel: &CancellationToken) -> FetchResult<()> {
        if wait.is_zero() {
            return if cancel.is_cancelled() {
                Err(FetchError::Cancelled)
            } else {
                Ok(())
            };
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = tokio::time::sleep(wait) => Ok(()),
        }
    }
}

impl std::fmt::Debug for CascadingFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadingFetcher")
            .field("transport", &self.transport.name())
            .field("search", &self.search_strategy_names())
            .field("detail", &self.detail_strategy_names())
            .field("config", &self.config)
            .finish()
    }
}
