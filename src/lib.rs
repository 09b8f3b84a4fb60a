//! # Patentbridge
//!
//! Resilient acquisition of patent numbers from public sources, over a pool
//! of rotating proxies and API credentials, with cascading fallback across
//! retrieval strategies.
//!
//! ## Overview
//!
//! Patentbridge runs a logical query ("darolutamide patent") through an
//! ordered list of strategies, one per upstream source, and lets you:
//!
//! - Rotate requests across proxies and credentials, quarantining the ones that keep failing
//! - Retry each strategy with exponential backoff and honor rate limits
//! - Fall through to the next source when one yields nothing
//! - Extract and normalize WO and BR numbers from HTML, JSON or plain text
//! - Resolve WO numbers into derived BR numbers and merge everything into records
//! - Emit structured audit events for every cascade and quarantine
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use patentbridge::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = Arc::new(ResourcePool::with_defaults());
//!     pool.add(["http://proxy1:8080", "http://proxy2:8080"]);
//!
//!     let fetcher = CascadingFetcher::builder()
//!         .with_pool(pool)
//!         .with_transport(HttpTransport::with_defaults()?)
//!         .with_builtin_strategies()
//!         .build()?;
//!
//!     let outcome = fetcher.execute("darolutamide patent").await?;
//!     for value in outcome.values() {
//!         println!("{value}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes the HTTP transport
//! - `http` - `reqwest` transport with per-proxy clients
//!
//! ## Architecture
//!
//! - **Core**: Resources, identifiers, requests, the `Transport` and `Strategy` traits, errors
//! - **Pool**: Resource rotation with health tracking and time-based quarantine
//! - **Transport**: HTTP and mock transports
//! - **Extract**: Declarative identifier schemes
//! - **Strategy**: URL-template strategies and the built-in source catalogs
//! - **Fetcher**: The cascade, retry policy, statistics and batch search
//! - **Aggregate**: Merging partial records by normalized key
//! - **Config**: JSON configuration and resource lists
//! - **Audit**: Structured lifecycle events

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod audit;
pub mod config;
pub mod core;
pub mod extract;
pub mod fetcher;
pub mod pool;
pub mod strategy;
pub mod transport;

// Re-export commonly used types at the crate root
pub use crate::core::{
    CascadeOutcome, FetchError, FetchRequest, FetchResult, Identifier, Resource, Strategy,
    StrategyOutcome, Termination, Transport, TransportResponse,
};

pub use crate::aggregate::{AggregatedRecord, Aggregator, PartialRecord};
pub use crate::config::{AcquisitionConfig, ResourceList};
pub use crate::extract::{Extractor, IdentifierScheme};
pub use crate::fetcher::{
    BatchConfig, BatchReport, BatchSearch, CascadeConfig, CascadingFetcher, QueryPlan,
    RetryConfig,
};
pub use crate::pool::{PoolConfig, PoolStatus, ResourcePool};
pub use crate::strategy::TemplateStrategy;
pub use crate::transport::MockTransport;

#[cfg(feature = "http")]
pub use crate::transport::HttpTransport;

/// Prelude module for convenient imports.
///
/// ```rust
/// use patentbridge::prelude::*;
/// ```
pub mod prelude {
    pub use crate::aggregate::{AggregatedRecord, Aggregator, PartialRecord};
    pub use crate::config::{AcquisitionConfig, ResourceList};
    pub use crate::core::{
        CascadeOutcome, FetchError, FetchRequest, FetchResult, Identifier, Resource, Strategy,
        StrategyOutcome, Termination, Transport, TransportResponse,
    };
    pub use crate::extract::Extractor;
    pub use crate::fetcher::{
        BatchConfig, BatchReport, BatchSearch, CascadeConfig, CascadingFetcher, QueryPlan,
        RetryConfig,
    };
    pub use crate::pool::{PoolConfig, ResourcePool};
    pub use crate::strategy::TemplateStrategy;
    pub use crate::transport::MockTransport;

    #[cfg(feature = "http")]
    pub use crate::transport::HttpTransport;
}
