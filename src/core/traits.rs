//! Core traits for the patentbridge library.
//!
//! [`Transport`] is the seam to the network, [`Strategy`] is one way of
//! asking one upstream for identifiers. The cascade only ever sees these two.

use crate::core::error::FetchError;
use crate::core::types::{FetchRequest, Identifier, Resource, TransportResponse};

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

/// Issues HTTP requests, optionally through an egress resource.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; one transport is shared by every
///   concurrent cascade.
/// - Any HTTP status is a successful round-trip and must be returned as a
///   [`TransportResponse`]. Only network, DNS and TLS failures map to
///   [`FetchError::Transport`].
/// - Implementations should never panic.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use patentbridge::core::{FetchError, FetchRequest, Resource, Transport, TransportResponse};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct StaticTransport;
///
/// #[async_trait]
/// impl Transport for StaticTransport {
///     async fn send(
///         &self,
///         _request: &FetchRequest,
///         _resource: Option<&Resource>,
///     ) -> Result<TransportResponse, FetchError> {
///         Ok(TransportResponse::ok("WO2016162604"))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends `request`, routed through `resource` when one is given.
    async fn send(
        &self,
        request: &FetchRequest,
        resource: Option<&Resource>,
    ) -> Result<TransportResponse, FetchError>;

    /// Returns a stable name for logging.
    fn name(&self) -> &str {
        "transport"
    }
}

/// One way of asking one upstream source for identifiers.
///
/// Strategies are immutable and cheap to share. The order of a strategy list
/// is the cascade priority.
pub trait Strategy: Send + Sync + Debug {
    /// Returns the stable name of this strategy, e.g. `google-patents`.
    fn name(&self) -> &str;

    /// Builds the request for a logical query.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRequest`] if the query cannot be turned
    /// into a request. The cascade skips the strategy without charging any
    /// resource.
    fn build_request(&self, query: &str) -> Result<FetchRequest, FetchError>;

    /// Extracts identifiers from a response body.
    ///
    /// An empty set is a valid answer: the response contained nothing
    /// recognizable.
    fn extract(&self, body: &str) -> BTreeSet<Identifier>;
}

/// An arc-wrapped transport for shared ownership.
pub type ArcTransport = Arc<dyn Transport>;

/// An arc-wrapped strategy for shared ownership.
pub type ArcStrategy = Arc<dyn Strategy>;
