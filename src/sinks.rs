//! Built-in event sinks.
//!
//! A sink is a bounded, non-blocking delivery target. Offering an event that
//! the sink cannot currently accept (full buffer, no receiver) drops it
//! silently; a publish attempt never blocks the acquisition path.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::events::{EventFilter, RateLimiterEvent};

/// A delivery target for [`RateLimiterEvent`]s.
///
/// Implementations must not block: `offer` runs on the protected call path,
/// immediately after the permit ledger lock is released.
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Offer an event without blocking.
    ///
    /// Returns `false` when the event was dropped because the sink could not
    /// accept it. Dropping is expected, documented behavior, not a fault.
    fn offer(&self, event: &RateLimiterEvent) -> bool;
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn offer(&self, event: &RateLimiterEvent) -> bool {
        (**self).offer(event)
    }
}

/// A no-op sink that discards all events.
///
/// Useful for testing or when observability is disabled.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn offer(&self, _event: &RateLimiterEvent) -> bool {
        true
    }
}

/// A sink that logs events using the `tracing` crate.
///
/// Events are logged at INFO level with structured fields.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn offer(&self, event: &RateLimiterEvent) -> bool {
        tracing::info!(target: "floodgate::events", event = %event, "rate_limiter_event");
        true
    }
}

/// A sink that stores events in a bounded in-memory buffer.
///
/// Useful for testing and debugging. Oldest events are evicted when capacity
/// is exceeded.
///
/// # Example
///
/// ```rust
/// use floodgate::{FixedWindowLimiter, MemorySink, RateLimiterConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let sink = MemorySink::new();
/// let limiter = FixedWindowLimiter::new("api", RateLimiterConfig::default());
/// limiter.attach_sink(sink.clone());
///
/// limiter.acquire_permission(1).await.unwrap();
/// assert_eq!(sink.len(), 1);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MemorySink {
    events: Arc<Mutex<VecDeque<RateLimiterEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemorySink {
    /// Creates a bounded memory sink (default cap: 10,000).
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Creates a bounded memory sink with explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns a snapshot of all buffered events in arrival order.
    pub fn events(&self) -> Vec<RateLimiterEvent> {
        self.events.lock().expect("memory sink poisoned").iter().cloned().collect()
    }

    /// Clears all buffered events.
    pub fn clear(&self) {
        self.events.lock().expect("memory sink poisoned").clear();
    }

    /// Returns the number of buffered events.
    pub fn len(&self) -> usize {
        self.events.lock().expect("memory sink poisoned").len()
    }

    /// Returns true if no events are buffered.
    pub fn is_empty(&self) -> bool {
        self.events.lock().expect("memory sink poisoned").is_empty()
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of evicted events.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MemorySink {
    fn offer(&self, event: &RateLimiterEvent) -> bool {
        let mut guard = self.events.lock().expect("memory sink poisoned");
        if guard.len() >= self.capacity {
            guard.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        guard.push_back(event.clone());
        true
    }
}

/// A sink backed by a bounded channel whose receiver the caller owns.
///
/// This is the boundary for external notification transports: the crate side
/// only ever performs a non-blocking `try_send`, counting events dropped
/// because the buffer was full or the receiver was gone.
///
/// # Example
///
/// ```rust
/// use floodgate::{ChannelSink, FixedWindowLimiter, RateLimiterConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let (sink, mut rx) = ChannelSink::bounded(16);
/// let limiter = FixedWindowLimiter::new("api", RateLimiterConfig::default());
/// limiter.attach_sink(sink);
///
/// limiter.acquire_permission(1).await.unwrap();
/// let event = rx.recv().await.unwrap();
/// assert_eq!(event.kind(), floodgate::EventKind::Acquired);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<RateLimiterEvent>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    /// Create a sink and the receiver it feeds. Capacity is clamped to >= 1.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<RateLimiterEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, dropped: Arc::new(AtomicU64::new(0)) }, rx)
    }

    /// How many events were dropped because the buffer was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelSink {
    fn offer(&self, event: &RateLimiterEvent) -> bool {
        match self.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

/// Wraps a sink with an [`EventFilter`], forwarding only matching events.
///
/// Filtered-out events count as accepted; `false` from `offer` still means
/// the inner sink dropped a matching event.
///
/// # Example
///
/// ```rust
/// use floodgate::{EventFilter, EventKind, FilteredSink, MemorySink};
///
/// let added_only = FilteredSink::new(
///     MemorySink::new(),
///     EventFilter::only([EventKind::Added]),
/// );
/// ```
#[derive(Clone, Debug)]
pub struct FilteredSink<S> {
    inner: S,
    filter: EventFilter,
}

impl<S: EventSink> FilteredSink<S> {
    /// Wrap `inner`, forwarding only events that pass `filter`.
    pub fn new(inner: S, filter: EventFilter) -> Self {
        Self { inner, filter }
    }

    /// The wrapped sink.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: EventSink> EventSink for FilteredSink<S> {
    fn offer(&self, event: &RateLimiterEvent) -> bool {
        if !self.filter.matches(event.kind()) {
            return true;
        }
        self.inner.offer(event)
    }
}
