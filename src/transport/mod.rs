//! Transport implementations.
//!
//! This module contains implementations of the [`Transport`](crate::core::Transport)
//! trait.
//!
//! ## Available Transports
//!
//! - [`mock`] - A scripted transport for tests and demos
//! - [`http`] - `reqwest` with per-proxy clients (requires `http` feature)
//!
//! ## Implementing a Custom Transport
//!
//! ```rust,ignore
//! use patentbridge::core::{FetchError, FetchRequest, Resource, Transport, TransportResponse};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! pub struct MyTransport;
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(
//!         &self,
//!         request: &FetchRequest,
//!         resource: Option<&Resource>,
//!     ) -> Result<TransportResponse, FetchError> {
//!         // Route `request` through `resource` and return any HTTP status
//!         todo!()
//!     }
//! }
//! ```

mod config;
pub mod mock;

#[cfg(feature = "http")]
pub mod http;

pub use config::{HttpTransportConfig, DEFAULT_USER_AGENTS};
pub use mock::{MockReply, MockTransport, RecordedRequest};

#[cfg(feature = "http")]
pub use http::{parse_retry_after, HttpTransport};
