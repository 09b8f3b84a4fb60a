//! Cascading fetcher and batch search.
//!
//! The [`CascadingFetcher`] runs one logical query through an ordered list of
//! strategies, retrying each with backoff over resources from the pool, and
//! stops at the first strategy that yields identifiers. [`BatchSearch`] runs a
//! whole [`QueryPlan`] and resolves what it finds through detail lookups.

mod backoff;
mod batch;
mod cascade;
mod stats;

pub use backoff::{BackoffPolicy, RetryConfig};
pub use batch::{BatchConfig, BatchReport, BatchSearch, QueryPlan, MAX_DEV_CODES};
pub use cascade::{CascadeConfig, CascadingFetcher, CascadingFetcherBuilder};
pub use stats::{FetcherStats, StrategyStats};
