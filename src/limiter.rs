//! The fixed-window permit ledger.
//!
//! [`FixedWindowLimiter`] bounds how many operations may proceed within
//! successive fixed windows. Replenishment is lazy: there is no background
//! timer thread. On every ledger access the limiter first checks whether the
//! current window has ended and, if so, advances the boundary by as many whole
//! refresh periods as needed to cover "now" and replenishes the balance, so a
//! caller arriving after an idle gap sees a fully refreshed window rather than
//! a stale depleted one.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::time::Instant;

use crate::config::RateLimiterConfig;
use crate::error::{AcquireError, RateLimitError};
use crate::events::{AcquisitionEvent, AcquisitionOutcome, RateLimiterEvent};
use crate::sinks::EventSink;

/// Core interface for permit acquisition.
///
/// Decouples consumers such as the tower middleware from the concrete ledger,
/// so alternative limiter implementations can be swapped in.
#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    /// Attempt to acquire the specified number of permits, suspending up to
    /// the limiter's timeout.
    async fn acquire(&self, permits: u32) -> Result<(), AcquireError>;
}

/// A pending blocking acquisition. The grant side is closed when the waiting
/// caller gives up, in which case no permits are debited on its behalf.
#[derive(Debug)]
struct Waiter {
    id: u64,
    permits: u32,
    grant: oneshot::Sender<()>,
}

/// The state guarded by the ledger lock: balance, window boundary, active and
/// pending capacity, and the FIFO queue of suspended callers. All of it is one
/// logically atomic unit; no field is ever read or written outside the lock.
#[derive(Debug)]
struct Ledger {
    /// Permits remaining in the open window. Negative only while reservations
    /// have committed permits against future windows.
    available: i64,
    /// When the next replenishment happens.
    period_end: Instant,
    /// Capacity of the open window.
    limit: u32,
    /// Capacity change staged for the next window boundary.
    pending_limit: Option<u32>,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

impl Ledger {
    /// Advance the window boundary past `now` and replenish, if due.
    ///
    /// Applies a staged capacity change first, so the new window already uses
    /// the new limit. Reservation debt carries over: each elapsed window pays
    /// down `limit` permits of it before any balance becomes available.
    fn roll_over(&mut self, now: Instant, refresh: Duration) {
        if now < self.period_end {
            return;
        }
        if let Some(limit) = self.pending_limit.take() {
            self.limit = limit;
        }
        let behind = now.duration_since(self.period_end).as_nanos();
        let refresh_ns = refresh.as_nanos().max(1);
        let periods = behind / refresh_ns + 1;
        // Next boundary stays on the original grid, strictly after `now`.
        let until_next = refresh_ns - behind % refresh_ns;
        self.period_end = now + Duration::from_nanos(u64::try_from(until_next).unwrap_or(u64::MAX));
        let credited = i64::try_from(periods.saturating_mul(u128::from(self.limit)))
            .unwrap_or(i64::MAX);
        self.available =
            self.available.min(0).saturating_add(credited).min(i64::from(self.limit));
        self.grant_waiters();
    }

    /// Serve queued callers strictly in arrival order from the current
    /// balance. Entries whose caller has gone away are discarded without a
    /// debit; a live head that does not fit blocks everyone behind it.
    fn grant_waiters(&mut self) {
        while let Some(front) = self.waiters.front() {
            if front.grant.is_closed() {
                self.waiters.pop_front();
                continue;
            }
            if i64::from(front.permits) > self.available {
                break;
            }
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            if waiter.grant.send(()).is_ok() {
                self.available -= i64::from(waiter.permits);
            }
        }
    }

    /// Drop a waiter that timed out, then re-run the grant pass in case the
    /// departure unblocked the head of the queue.
    fn remove_waiter(&mut self, id: u64) {
        self.waiters.retain(|waiter| waiter.id != id);
        self.grant_waiters();
    }
}

/// A named, concurrency-safe fixed-window rate limiter.
///
/// Cheap to share behind an [`Arc`]; all handles observe the same ledger. The
/// active configuration can be changed at runtime: a new timeout applies to
/// future acquisition attempts, a new per-window limit takes effect at the
/// next window boundary.
///
/// # Example
///
/// ```rust
/// use floodgate::{FixedWindowLimiter, RateLimiterConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let limiter = FixedWindowLimiter::new(
///         "search",
///         RateLimiterConfig::builder()
///             .limit_for_period(10)
///             .limit_refresh_period(Duration::from_secs(1))
///             .timeout_duration(Duration::from_millis(25))
///             .build()
///             .unwrap(),
///     );
///
///     let reply = limiter.execute(|| async { Ok::<_, std::io::Error>("ok") }).await;
///     assert!(reply.is_ok());
/// }
/// ```
#[derive(Debug)]
pub struct FixedWindowLimiter {
    name: String,
    config: ArcSwap<RateLimiterConfig>,
    ledger: Mutex<Ledger>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl FixedWindowLimiter {
    /// Create a limiter with a full first window ending one refresh period
    /// from now.
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Self {
        let ledger = Ledger {
            available: i64::from(config.limit_for_period()),
            period_end: Instant::now() + config.limit_refresh_period(),
            limit: config.limit_for_period(),
            pending_limit: None,
            waiters: VecDeque::new(),
            next_waiter_id: 0,
        };
        Self {
            name: name.into(),
            config: ArcSwap::from_pointee(config),
            ledger: Mutex::new(ledger),
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// The limiter's identity. Immutable for the object's lifetime.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the active configuration.
    pub fn config(&self) -> Arc<RateLimiterConfig> {
        self.config.load_full()
    }

    /// Attach a sink that receives this limiter's acquisition events.
    pub fn attach_sink(&self, sink: impl EventSink + 'static) {
        self.sinks.write().expect("sink list poisoned").push(Arc::new(sink));
    }

    /// Acquire `permits` from the current window, suspending until the next
    /// replenishment when the window is exhausted.
    ///
    /// Returns immediately when the open window holds enough permits and no
    /// earlier caller is queued. Otherwise the caller suspends FIFO and is
    /// woken at the window boundary; if the cumulative wait would exceed the
    /// timeout in effect at call entry, the attempt fails with
    /// [`AcquireError::Denied`] and nothing is debited. A request for zero
    /// permits fails with [`AcquireError::InvalidPermits`] before any ledger
    /// access.
    pub async fn acquire_permission(&self, permits: u32) -> Result<(), AcquireError> {
        if permits == 0 {
            return Err(AcquireError::InvalidPermits { provided: permits });
        }
        let config = self.config.load_full();
        let timeout = config.timeout_duration();
        let refresh = config.limit_refresh_period();
        let start = Instant::now();

        let (mut grant, waiter_id) = {
            let mut ledger = self.lock_ledger();
            ledger.roll_over(start, refresh);
            // Clears abandoned queue heads so a live arrival is not parked
            // behind them until the next boundary.
            ledger.grant_waiters();
            if ledger.waiters.is_empty() && i64::from(permits) <= ledger.available {
                ledger.available -= i64::from(permits);
                drop(ledger);
                self.publish_acquisition(AcquisitionOutcome::Acquired, permits);
                return Ok(());
            }
            if timeout.is_zero() {
                drop(ledger);
                self.publish_acquisition(AcquisitionOutcome::Rejected, permits);
                return Err(self.denied(permits, timeout));
            }
            let (tx, rx) = oneshot::channel();
            let id = ledger.next_waiter_id;
            ledger.next_waiter_id += 1;
            ledger.waiters.push_back(Waiter { id, permits, grant: tx });
            (rx, id)
        };

        // The deadline is fixed at call entry; later timeout changes do not
        // move it. `None` means the timeout overflows the clock: wait forever.
        let deadline = start.checked_add(timeout);
        loop {
            let next_refresh = self.lock_ledger().period_end;
            let wake = match deadline {
                Some(deadline) if deadline < next_refresh => deadline,
                _ => next_refresh,
            };
            tokio::select! {
                biased;
                granted = &mut grant => {
                    return if granted.is_ok() {
                        self.publish_acquisition(AcquisitionOutcome::Acquired, permits);
                        Ok(())
                    } else {
                        self.publish_acquisition(AcquisitionOutcome::Rejected, permits);
                        Err(self.denied(permits, timeout))
                    };
                }
                _ = tokio::time::sleep_until(wake) => {
                    let now = Instant::now();
                    let mut ledger = self.lock_ledger();
                    ledger.roll_over(now, refresh);
                    match grant.try_recv() {
                        Ok(()) => {
                            drop(ledger);
                            self.publish_acquisition(AcquisitionOutcome::Acquired, permits);
                            return Ok(());
                        }
                        Err(TryRecvError::Empty) => {
                            if deadline.is_some_and(|deadline| now >= deadline) {
                                ledger.remove_waiter(waiter_id);
                                drop(ledger);
                                self.publish_acquisition(AcquisitionOutcome::Rejected, permits);
                                return Err(self.denied(permits, timeout));
                            }
                        }
                        Err(TryRecvError::Closed) => {
                            drop(ledger);
                            self.publish_acquisition(AcquisitionOutcome::Rejected, permits);
                            return Err(self.denied(permits, timeout));
                        }
                    }
                }
            }
        }
    }

    /// Compute how long the caller must wait for `permits` and commit them
    /// against future capacity, without suspending.
    ///
    /// Returns `Ok(Duration::ZERO)` when the permits were debited from the
    /// open window. Otherwise the permits are committed against upcoming
    /// windows and the returned wait tells the caller when they become theirs;
    /// each elapsed window pays `limit_for_period` permits of the debt before
    /// replenishing the balance. If the computed wait exceeds the timeout the
    /// reservation is refused via [`AcquireError::Denied`] and the ledger is
    /// left untouched. Reservations do not consult the waiter queue.
    pub fn reserve_permission(&self, permits: u32) -> Result<Duration, AcquireError> {
        if permits == 0 {
            return Err(AcquireError::InvalidPermits { provided: permits });
        }
        let config = self.config.load_full();
        let timeout = config.timeout_duration();
        let refresh = config.limit_refresh_period();
        let now = Instant::now();

        let wait = {
            let mut ledger = self.lock_ledger();
            ledger.roll_over(now, refresh);
            let after = ledger.available - i64::from(permits);
            if after >= 0 {
                ledger.available = after;
                Some(Duration::ZERO)
            } else {
                let future_limit = ledger.pending_limit.unwrap_or(ledger.limit);
                if future_limit == 0 {
                    None
                } else {
                    let deficit = u128::from(after.unsigned_abs());
                    let boundaries = deficit.div_ceil(u128::from(future_limit));
                    let wait_ns = ledger.period_end.duration_since(now).as_nanos()
                        + (boundaries - 1) * refresh.as_nanos();
                    if wait_ns > timeout.as_nanos() {
                        None
                    } else {
                        ledger.available = after;
                        Some(Duration::from_nanos(u64::try_from(wait_ns).unwrap_or(u64::MAX)))
                    }
                }
            }
        };

        match wait {
            Some(wait) => {
                self.publish_acquisition(AcquisitionOutcome::Acquired, permits);
                Ok(wait)
            }
            None => {
                self.publish_acquisition(AcquisitionOutcome::Rejected, permits);
                Err(self.denied(permits, timeout))
            }
        }
    }

    /// Exhaust the open window, returning how many permits were drained.
    ///
    /// Outstanding reservation debt and the next replenishment are unaffected.
    pub fn drain_permissions(&self) -> u64 {
        let refresh = self.config.load().limit_refresh_period();
        let mut ledger = self.lock_ledger();
        ledger.roll_over(Instant::now(), refresh);
        let drained = ledger.available.max(0);
        ledger.available -= drained;
        u64::try_from(drained).unwrap_or(0)
    }

    /// Replace the timeout for future acquisition attempts. Callers already
    /// suspended keep their original deadline.
    pub fn change_timeout_duration(&self, timeout: Duration) {
        let current = self.config.load_full();
        self.config.store(Arc::new(current.with_timeout_duration(timeout)));
    }

    /// Replace the per-window capacity, effective at the next window
    /// boundary. The open window's balance and end time are unaffected.
    pub fn change_limit_for_period(&self, limit: u32) {
        {
            let mut ledger = self.lock_ledger();
            ledger.pending_limit = Some(limit);
        }
        let current = self.config.load_full();
        self.config.store(Arc::new(current.with_limit_for_period(limit)));
    }

    /// Permits remaining in the open window, after applying any due
    /// replenishment. Negative while reservations hold future capacity.
    pub fn available_permits(&self) -> i64 {
        let refresh = self.config.load().limit_refresh_period();
        let mut ledger = self.lock_ledger();
        ledger.roll_over(Instant::now(), refresh);
        ledger.available
    }

    /// Number of callers currently suspended waiting for permits.
    pub fn queued_callers(&self) -> usize {
        self.lock_ledger().waiters.len()
    }

    /// Acquire one permit, then run `operation`.
    ///
    /// The operation's own failure is propagated unchanged as
    /// [`RateLimitError::Inner`]; on timeout the operation is never invoked.
    pub async fn execute<T, E, Fut, Op>(&self, operation: Op) -> Result<T, RateLimitError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
        Op: FnOnce() -> Fut,
    {
        self.acquire_permission(1).await?;
        operation().await.map_err(RateLimitError::Inner)
    }

    fn lock_ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().expect("rate limiter ledger poisoned")
    }

    fn denied(&self, permits: u32, timeout: Duration) -> AcquireError {
        AcquireError::Denied { limiter: self.name.clone(), permits, timeout }
    }

    /// Offer an acquisition event to every attached sink. Runs after the
    /// ledger lock is released; sinks are non-blocking by contract.
    fn publish_acquisition(&self, outcome: AcquisitionOutcome, permits: u32) {
        let sinks = self.sinks.read().expect("sink list poisoned");
        if sinks.is_empty() {
            return;
        }
        let event = RateLimiterEvent::Acquisition(AcquisitionEvent {
            outcome,
            limiter_name: self.name.clone(),
            created_at: SystemTime::now(),
            permits,
        });
        for sink in sinks.iter() {
            sink.offer(&event);
        }
    }
}

#[async_trait::async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn acquire(&self, permits: u32) -> Result<(), AcquireError> {
        self.acquire_permission(permits).await
    }
}
