use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ensure_positive, ConfigError, LimiterError};
use crate::rate_limit::RateLimitCore;
use crate::ticker::{cadence_for_rate, Ticker};
use crate::types::Uint;

/// Receives units released by a [`LeakyQueueCore`] drain loop.
///
/// Any `FnMut(T) + Send + 'static` closure is a drain.
pub trait Drain<T>: Send + 'static {
    /// Handles one dequeued unit. Runs on the drain thread, outside any lock.
    fn process(&mut self, unit: T);
}

impl<T, F> Drain<T> for F
where
    F: FnMut(T) + Send + 'static,
{
    #[inline(always)]
    fn process(&mut self, unit: T) {
        self(unit)
    }
}

/// Leaky bucket that queues admitted work and releases it at a fixed cadence.
///
/// Admission only checks for a free slot in a bounded queue of `capacity`
/// units. A background drain loop, owned by the limiter, pops one unit every
/// `1000 / rate_per_second` milliseconds and hands it to the [`Drain`]. The
/// loop keeps its schedule on absolute deadlines whether or not the queue is
/// empty, so the processing rate does not drift.
///
/// Unlike [`LeakyBucketCore`](crate::cores::LeakyBucketCore), which only
/// bounds backlog, this variant actually smooths the rate at which work is
/// processed.
///
/// The limiter is stopped by [`shutdown`](Self::shutdown) or on drop; units
/// still queued at that point are dropped without being processed.
///
/// # Example
///
/// ```rust
/// use std::sync::mpsc;
/// use std::time::Duration;
/// use rate_gate_core::cores::{LeakyQueueCore, LeakyQueueCoreConfig};
///
/// let (tx, rx) = mpsc::channel();
/// let queue: LeakyQueueCore<u32> = LeakyQueueCore::new(LeakyQueueCoreConfig::new(2, 100), move |job: u32| {
///     tx.send(job).ok();
/// })
/// .unwrap();
///
/// assert!(queue.try_acquire(1));
/// assert!(queue.try_acquire(2));
/// assert_eq!(queue.try_enqueue(3), Err(3)); // full, the unit is handed back
///
/// assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(1));
/// assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(2));
/// queue.shutdown();
/// ```
pub struct LeakyQueueCore<T> {
    /// Maximum number of queued units.
    capacity: usize,
    /// Queue shared with the drain loop.
    state: Arc<Mutex<LeakyQueueCoreState<T>>>,
    ticker: Ticker,
}

/// Internal state of the queueing bucket.
struct LeakyQueueCoreState<T> {
    /// Admitted units awaiting the drain loop, oldest first.
    queue: VecDeque<T>,
    /// Set by shutdown; no further units are admitted.
    closed: bool,
}

impl<T: Send + 'static> LeakyQueueCore<T> {
    /// Creates the queue and starts its drain loop.
    ///
    /// The drain loop runs on real time (the monotonic system clock); this
    /// core does not take an injectable [`Clock`](crate::clock::Clock).
    pub fn new<D: Drain<T>>(config: LeakyQueueCoreConfig, drain: D) -> Result<Self, LimiterError> {
        config.validate()?;
        let cadence = cadence_for_rate(config.rate_per_second)?;
        let capacity = config.slots()?;
        debug!(
            capacity = config.capacity,
            rate_per_second = config.rate_per_second,
            "leaky queue limiter created"
        );

        let state = Arc::new(Mutex::new(LeakyQueueCoreState {
            queue: VecDeque::with_capacity(capacity.min(1024)),
            closed: false,
        }));

        let tick_state = state.clone();
        let mut drain = drain;
        let ticker = Ticker::spawn("leaky-queue-drain", cadence, move || {
            // Popping restores the slot; processing happens after the lock is released.
            let unit = tick_state.lock().queue.pop_front();
            if let Some(unit) = unit {
                if panic::catch_unwind(AssertUnwindSafe(|| drain.process(unit))).is_err() {
                    error!("leaky queue drain panicked while processing a unit");
                }
            }
        })?;

        Ok(LeakyQueueCore {
            capacity,
            state,
            ticker,
        })
    }

    /// Queues `unit` if a slot is free, otherwise hands it back.
    pub fn try_enqueue(&self, unit: T) -> Result<(), T> {
        let mut state = self.state.lock();
        if state.closed || state.queue.len() >= self.capacity {
            return Err(unit);
        }
        state.queue.push_back(unit);
        Ok(())
    }

    /// Queues `unit` if a slot is free. A rejected unit is dropped.
    #[inline]
    pub fn try_acquire(&self, unit: T) -> bool {
        self.try_enqueue(unit).is_ok()
    }

    /// Slots still free: `capacity - len()`.
    pub fn remaining_slots(&self) -> usize {
        self.capacity - self.state.lock().queue.len()
    }

    /// Units admitted but not yet released to the drain.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns `true` when nothing is waiting for the drain loop.
    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// Maximum number of queued units.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stops the drain loop, joins its thread and drops any queued units.
    ///
    /// Idempotent. Subsequent admissions are rejected.
    pub fn shutdown(&self) {
        let first = !std::mem::replace(&mut self.state.lock().closed, true);
        self.ticker.shutdown();

        if first {
            let pending = std::mem::take(&mut self.state.lock().queue);
            debug!(dropped = pending.len(), "leaky queue shut down");
        }
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    pub fn is_shutdown(&self) -> bool {
        self.ticker.is_stopped()
    }
}

impl<T> Drop for LeakyQueueCore<T> {
    fn drop(&mut self) {
        self.state.lock().closed = true;
        self.ticker.shutdown();
    }
}

/// Admits `tokens` default units at once, all or nothing.
impl<T: Default + Send + 'static> RateLimitCore for LeakyQueueCore<T> {
    fn try_acquire(&self, tokens: Uint) -> bool {
        if tokens == 0 {
            return true;
        }
        let Ok(count) = usize::try_from(tokens) else {
            return false;
        };

        let mut state = self.state.lock();
        if state.closed || count > self.capacity - state.queue.len() {
            return false;
        }
        state.queue.extend((0..count).map(|_| T::default()));
        true
    }

    #[inline]
    fn capacity_remaining(&self) -> Uint {
        self.remaining_slots() as Uint
    }

    #[inline(always)]
    fn shutdown(&self) {
        self.shutdown()
    }
}

/// Configuration structure for creating a `LeakyQueueCore` limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeakyQueueCoreConfig {
    /// Maximum number of queued units.
    pub capacity: Uint,
    /// Units released to the drain per second.
    pub rate_per_second: Uint,
}

impl LeakyQueueCoreConfig {
    /// Creates a new configuration instance.
    pub fn new(capacity: Uint, rate_per_second: Uint) -> Self {
        Self {
            capacity,
            rate_per_second,
        }
    }

    /// Checks that every field is positive, the capacity is addressable and
    /// the rate has a non-zero cadence.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("capacity", self.capacity)?;
        self.slots()?;
        cadence_for_rate(self.rate_per_second).map(|_| ())
    }

    /// Capacity as a queue length.
    fn slots(&self) -> Result<usize, ConfigError> {
        usize::try_from(self.capacity).map_err(|_| ConfigError::CapacityTooLarge {
            capacity: self.capacity,
            max: usize::MAX as Uint,
        })
    }
}
