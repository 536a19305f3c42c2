#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Floodgate 🌊
//!
//! Fixed-window rate limiting for async Rust: permit ledgers, named
//! registries, and best-effort event sinks.
//!
//! ## Features
//!
//! - **Permit ledger** with lazy, catch-up window replenishment and no
//!   background timer thread
//! - **Blocking acquisition** with bounded waits and FIFO fairness at each
//!   window boundary
//! - **Non-blocking reservations** that commit permits against future windows
//! - **Named registry** with configuration templates and atomic
//!   creation-on-demand
//! - **Event sinks** for acquisition outcomes and registry mutations,
//!   delivered best-effort off the hot path
//! - **Tower middleware** for dropping a limiter in front of any service
//!
//! ## Quick Start
//!
//! ```rust
//! use floodgate::{RateLimiterConfig, RateLimiterRegistry};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = RateLimiterRegistry::new();
//!     let limiter = registry.rate_limiter_with_config(
//!         "search",
//!         RateLimiterConfig::builder()
//!             .limit_for_period(10)
//!             .limit_refresh_period(Duration::from_secs(1))
//!             .timeout_duration(Duration::from_millis(25))
//!             .build()
//!             .unwrap(),
//!     );
//!
//!     let reply = limiter.execute(|| async { Ok::<_, std::io::Error>("ok") }).await;
//!     assert!(reply.is_ok());
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod limiter;
pub mod middleware;
pub mod prelude;
pub mod registry;
pub mod sinks;

// Re-exports
pub use config::{ConfigError, RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::{AcquireError, RateLimitError};
pub use events::{
    AcquisitionEvent, AcquisitionOutcome, EventFilter, EventKind, RateLimiterEvent, RegistryEvent,
};
pub use limiter::{FixedWindowLimiter, RateLimiter};
pub use middleware::{RateLimitLayer, RateLimitService};
pub use registry::{execute_named, RateLimiterRegistry, RegistryError, DEFAULT_CONFIG};
pub use sinks::{ChannelSink, EventSink, FilteredSink, LogSink, MemorySink, NullSink};
