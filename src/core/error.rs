//! Error types for the patentbridge library.
//!
//! Transport and rate-limit failures are absorbed inside the cascade's retry
//! loop; only configuration mistakes and cancellation reach the caller as
//! errors. "Nothing found" is never an error.

use std::time::Duration;
use thiserror::Error;

/// The main error type for acquisition operations.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// No healthy resource was available at acquisition time.
    #[error("resource pool exhausted: {quarantined} of {total} resources quarantined")]
    PoolExhausted {
        /// Number of resources managed by the pool.
        total: usize,
        /// Number of resources currently quarantined.
        quarantined: usize,
    },

    /// Network, DNS or TLS failure while talking to an upstream.
    #[error("transport failure via '{resource}': {message}")]
    Transport {
        /// Redacted label of the resource in use.
        resource: String,
        /// Error message describing the failure.
        message: String,
    },

    /// The upstream signaled throttling (HTTP 429).
    #[error("rate limited via '{resource}': retry after {retry_after:?}")]
    RateLimited {
        /// Redacted label of the resource in use.
        resource: String,
        /// Wait time suggested by the upstream, if any.
        retry_after: Option<Duration>,
    },

    /// The upstream answered with a non-success status other than 429.
    #[error("unexpected HTTP status {status} via '{resource}'")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// Redacted label of the resource in use.
        resource: String,
    },

    /// A strategy could not build its request for the query.
    #[error("strategy '{strategy}' could not build a request: {message}")]
    InvalidRequest {
        /// Name of the strategy.
        strategy: String,
        /// What went wrong.
        message: String,
    },

    /// The caller cancelled the cascade.
    #[error("cascade was cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl FetchError {
    /// Returns `true` if a later attempt may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PoolExhausted { .. }
                | Self::Transport { .. }
                | Self::RateLimited { .. }
                | Self::HttpStatus { .. }
        )
    }

    /// Returns `true` if this error is charged to the resource that was in use.
    pub fn counts_against_resource(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::RateLimited { .. } | Self::HttpStatus { .. }
        )
    }

    /// Returns `true` for the throttling variant.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns the resource label if this error is associated with one.
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::Transport { resource, .. }
            | Self::RateLimited { resource, .. }
            | Self::HttpStatus { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Creates a `Transport` error.
    pub fn transport(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates an `InvalidRequest` error.
    pub fn invalid_request(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for acquisition operations.
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_is_recoverable() {
        let exhausted = FetchError::PoolExhausted {
            total: 3,
            quarantined: 3,
        };
        assert!(exhausted.is_recoverable());
        assert!(!exhausted.counts_against_resource());

        let config = FetchError::configuration("no strategies");
        assert!(!config.is_recoverable());
        assert!(!FetchError::Cancelled.is_recoverable());
    }

    #[test]
    fn test_fetch_error_resource() {
        let err = FetchError::transport("http://proxy1…", "connection reset");
        assert_eq!(err.resource(), Some("http://proxy1…"));
        assert!(err.counts_against_resource());

        let limited = FetchError::RateLimited {
            resource: "serpapi://bc20…".into(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert!(limited.is_rate_limited());
        assert!(limited.counts_against_resource());
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::HttpStatus {
            status: 503,
            resource: "proxy-a".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("proxy-a"));
    }
}
