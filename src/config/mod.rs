//! Loading acquisition settings.
//!
//! [`AcquisitionConfig`] groups the pool, cascade, transport and batch
//! settings and loads them from JSON. Durations are written in milliseconds
//! (`quarantine_duration_ms`, `inter_strategy_pause_ms`, ...); every field is
//! optional.
//!
//! ```rust
//! use patentbridge::config::AcquisitionConfig;
//! use std::time::Duration;
//!
//! let config = AcquisitionConfig::from_json(r#"{
//!     "pool": { "quarantine_threshold": 5 },
//!     "cascade": { "inter_strategy_pause_ms": 500 },
//!     "strategies": [{
//!         "name": "internal-index",
//!         "url_template": "https://index.example/search?q={query}",
//!         "scheme": "wo"
//!     }]
//! }"#).unwrap();
//!
//! assert_eq!(config.pool.quarantine_threshold, 5);
//! assert_eq!(config.cascade.inter_strategy_pause, Duration::from_millis(500));
//! assert_eq!(config.search_strategies().unwrap().len(), 6);
//! ```

mod resources;

pub use resources::ResourceList;

use crate::core::{ArcStrategy, ArcTransport, FetchError, FetchResult};
use crate::fetcher::{BatchConfig, CascadeConfig, CascadingFetcher};
use crate::pool::{PoolConfig, ResourcePool};
use crate::strategy::{self, StrategyDefinition, TemplateStrategy};
use crate::transport::HttpTransportConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Every tunable of an acquisition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Resource pool settings.
    pub pool: PoolConfig,

    /// Retry and pause settings of the cascade.
    pub cascade: CascadeConfig,

    /// HTTP transport settings.
    pub http: HttpTransportConfig,

    /// Batch search settings.
    pub batch: BatchConfig,

    /// Whether the built-in strategy catalogs come first.
    pub builtin_strategies: bool,

    /// Extra search strategies, tried after the built-in ones.
    pub strategies: Vec<StrategyDefinition>,

    /// Extra detail strategies, tried after the built-in ones.
    pub detail_strategies: Vec<StrategyDefinition>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            cascade: CascadeConfig::default(),
            http: HttpTransportConfig::default(),
            batch: BatchConfig::default(),
            builtin_strategies: true,
            strategies: Vec::new(),
            detail_strategies: Vec::new(),
        }
    }
}

impl AcquisitionConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the document is malformed.
    pub fn from_json(json: &str) -> FetchResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| FetchError::configuration(format!("invalid configuration: {e}")))
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> FetchResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            FetchError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Serializes the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if serialization fails.
    pub fn to_json(&self) -> FetchResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FetchError::configuration(format!("cannot serialize configuration: {e}")))
    }

    /// Sets the pool settings.
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Sets the cascade settings.
    pub fn with_cascade(mut self, cascade: CascadeConfig) -> Self {
        self.cascade = cascade;
        self
    }

    /// Sets the HTTP transport settings.
    pub fn with_http(mut self, http: HttpTransportConfig) -> Self {
        self.http = http;
        self
    }

    /// Sets the batch settings.
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Enables or disables the built-in catalogs.
    pub fn with_builtin_strategies(mut self, enabled: bool) -> Self {
        self.builtin_strategies = enabled;
        self
    }

    /// Adds a search strategy definition.
    pub fn add_strategy(mut self, definition: StrategyDefinition) -> Self {
        self.strategies.push(definition);
        self
    }

    /// Adds a detail strategy definition.
    pub fn add_detail_strategy(mut self, definition: StrategyDefinition) -> Self {
        self.detail_strategies.push(definition);
        self
    }

    /// Returns the search strategies in priority order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid definition.
    pub fn search_strategies(&self) -> FetchResult<Vec<ArcStrategy>> {
        let builtin = if self.builtin_strategies {
            strategy::search_strategies()
        } else {
            Vec::new()
        };
        with_definitions(builtin, &self.strategies)
    }

    /// Returns the detail strategies in priority order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid definition.
    pub fn detail_strategies(&self) -> FetchResult<Vec<ArcStrategy>> {
        let builtin = if self.builtin_strategies {
            strategy::detail_strategies()
        } else {
            Vec::new()
        };
        with_definitions(builtin, &self.detail_strategies)
    }

    /// Creates an empty pool with these settings.
    pub fn build_pool(&self) -> Arc<ResourcePool> {
        Arc::new(ResourcePool::new(self.pool.clone()))
    }

    /// Builds a fetcher over `pool` and `transport` with these settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid strategy definitions or when
    /// no search strategy is left.
    pub fn build_fetcher(
        &self,
        pool: Arc<ResourcePool>,
        transport: ArcTransport,
    ) -> FetchResult<CascadingFetcher> {
        let mut builder = CascadingFetcher::builder()
            .with_pool(pool)
            .with_arc_transport(transport)
            .with_config(self.cascade.clone());
        for strategy in self.search_strategies()? {
            builder = builder.add_arc_strategy(strategy);
        }
        for strategy in self.detail_strategies()? {
            builder = builder.add_arc_detail_strategy(strategy);
        }
        builder.build()
    }
}

fn with_definitions(
    mut strategies: Vec<ArcStrategy>,
    definitions: &[StrategyDefinition],
) -> FetchResult<Vec<ArcStrategy>> {
    for definition in definitions {
        let strategy = TemplateStrategy::from_definition(definition.clone())?;
        strategies.push(Arc::new(strategy));
    }
    Ok(strategies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SchemeKind;
    use crate::transport::MockTransport;
    use std::time::Duration;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = AcquisitionConfig::from_json("{}").unwrap();
        assert_eq!(config, AcquisitionConfig::default());
        assert_eq!(config.pool.quarantine_threshold, 3);
        assert_eq!(config.batch.inter_query_pause, Duration::from_millis(1500));
    }

    #[test]
    fn test_durations_in_millis() {
        let config = AcquisitionConfig::from_json(
            r#"{"pool": {"quarantine_duration_ms": 10000}, "batch": {"concurrency": 3}}"#,
        )
        .unwrap();
        assert_eq!(config.pool.quarantine_duration, Duration::from_secs(10));
        assert_eq!(config.batch.concurrency, 3);
    }

    #[test]
    fn test_json_round_trip() {
        let config = AcquisitionConfig::new()
            .with_pool(PoolConfig::strict())
            .with_cascade(CascadeConfig::immediate());
        let parsed = AcquisitionConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_malformed_json() {
        let err = AcquisitionConfig::from_json("{\"pool\": 3}").unwrap_err();
        assert!(matches!(err, FetchError::Configuration { .. }));
    }

    #[test]
    fn test_custom_strategies_only() {
        let config = AcquisitionConfig::new()
            .with_builtin_strategies(false)
            .add_strategy(StrategyDefinition {
                name: "index".into(),
                url_template: "https://index.test/?q={query}".into(),
                query_template: None,
                scheme: SchemeKind::Wo,
            });

        let names: Vec<_> = config
            .search_strategies()
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["index"]);
        assert!(config.detail_strategies().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_definition_rejected() {
        let config = AcquisitionConfig::new().add_strategy(StrategyDefinition {
            name: "broken".into(),
            url_template: "https://index.test/".into(),
            query_template: None,
            scheme: SchemeKind::Br,
        });
        assert!(config.search_strategies().is_err());
    }

    #[tokio::test]
    async fn test_build_fetcher() {
        let config = AcquisitionConfig::new().with_cascade(CascadeConfig::immediate());
        let pool = config.build_pool();
        pool.add(["http://p1:1"]);

        let fetcher = config
            .build_fetcher(pool, Arc::new(MockTransport::new()))
            .unwrap();
        assert_eq!(fetcher.search_strategy_names().len(), 5);
        assert_eq!(fetcher.detail_strategy_names().len(), 4);
    }
}
