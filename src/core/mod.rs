//! Core types and traits for the patentbridge library.
//!
//! - [`types`] - `Resource`, `Identifier`, `FetchRequest`, `TransportResponse`
//! - [`traits`] - the `Transport` and `Strategy` seams
//! - [`clock`] - injectable monotonic time
//! - [`error`] - structured error types
//! - [`result`] - cascade outcome structures

pub mod clock;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use clock::{ArcClock, Clock, ManualClock, SystemClock};
pub use error::{FetchError, FetchResult};
pub use result::{CascadeOutcome, StrategyOutcome, StrategyReport, Termination};
pub use traits::{ArcStrategy, ArcTransport, Strategy, Transport};
pub use types::{FetchRequest, HttpMethod, Identifier, Resource, ResourceKind, TransportResponse};
