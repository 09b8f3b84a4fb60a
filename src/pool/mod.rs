//! Egress resource pool with health tracking and quarantine.
//!
//! Every request the cascade sends goes out through one resource taken from
//! the pool: a proxy URL or an API credential. The pool tracks the outcome of
//! each request per resource and takes failing resources out of rotation for
//! a while.
//!
//! ## States
//!
//! - **Healthy**: the resource may be selected.
//! - **Quarantined**: the resource reached the consecutive-failure threshold
//!   and is skipped until its window elapses. The window is checked lazily
//!   during [`ResourcePool::acquire`].
//!
//! ## Usage
//!
//! ```rust
//! use patentbridge::pool::{PoolConfig, ResourcePool};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = PoolConfig::default()
//!     .with_quarantine_threshold(3)
//!     .with_quarantine_duration(Duration::from_secs(120));
//!
//! let pool = Arc::new(ResourcePool::new(config));
//! pool.add(["socks5://10.0.0.1:1080", "socks5://10.0.0.2:1080"]);
//! assert_eq!(pool.status().healthy, 2);
//! ```

mod config;
mod health;
#[allow(clippy::module_inception)]
mod pool;

pub use config::PoolConfig;
pub use health::{HealthRecord, PoolStatus, ResourceHealth};
pub use pool::ResourcePool;
