//! Convenient re-exports for common Floodgate types.
pub use crate::{
    config::{ConfigError, RateLimiterConfig, RateLimiterConfigBuilder},
    error::{AcquireError, RateLimitError},
    events::{
        AcquisitionEvent, AcquisitionOutcome, EventFilter, EventKind, RateLimiterEvent,
        RegistryEvent,
    },
    limiter::{FixedWindowLimiter, RateLimiter},
    middleware::{RateLimitLayer, RateLimitService},
    registry::{execute_named, RateLimiterRegistry, RegistryError, DEFAULT_CONFIG},
    sinks::{ChannelSink, EventSink, FilteredSink, LogSink, MemorySink, NullSink},
};
