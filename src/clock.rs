//! Time sources for limiter cores.
//!
//! Every clock-driven core reads the current instant from a [`Clock`] in
//! milliseconds. Production code uses [`MonotonicClock`]; tests inject a
//! [`ManualClock`] or any closure returning a [`Uint`] so that timing is fully
//! deterministic.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::types::Uint;

/// A monotonic source of "now", in milliseconds.
///
/// Implementations must never go backwards. The cores tolerate it by treating
/// negative elapsed time as zero, but a regressing clock gives up the budget
/// guarantees.
///
/// Any `Fn() -> Uint + Send + Sync` closure is a clock:
///
/// ```rust
/// use std::sync::Arc;
/// use rate_gate_core::clock::Clock;
/// use rate_gate_core::Uint;
///
/// let fixed: Arc<dyn Clock> = Arc::new(|| -> Uint { 42 });
/// assert_eq!(fixed.now_millis(), 42);
/// ```
pub trait Clock: Send + Sync {
    /// Returns the current instant in milliseconds.
    fn now_millis(&self) -> Uint;
}

impl<F> Clock for F
where
    F: Fn() -> Uint + Send + Sync,
{
    #[inline(always)]
    fn now_millis(&self) -> Uint {
        self()
    }
}

/// Milliseconds elapsed since the clock was created, backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose zero is the moment of this call.
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_millis(&self) -> Uint {
        Uint::try_from(self.origin.elapsed().as_millis()).unwrap_or(Uint::MAX)
    }
}

/// A clock that only moves when told to.
///
/// Share it between the test and the limiter through an [`Arc`]:
///
/// ```rust
/// use std::sync::Arc;
/// use rate_gate_core::clock::ManualClock;
/// use rate_gate_core::cores::{FixedWindowCore, FixedWindowCoreConfig};
///
/// let clock = Arc::new(ManualClock::new(0));
/// let limiter = FixedWindowCore::with_clock(FixedWindowCoreConfig::new(1, 1000), clock.clone()).unwrap();
///
/// assert!(limiter.try_acquire(1));
/// assert!(!limiter.try_acquire(1));
///
/// clock.advance(1001);
/// assert!(limiter.try_acquire(1));
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Uint>,
}

impl ManualClock {
    /// Creates a clock reading `start` milliseconds.
    pub fn new(start: Uint) -> Self {
        ManualClock {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `millis`.
    pub fn advance(&self, millis: Uint) {
        let mut now = self.now.lock();
        *now = now.saturating_add(millis);
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, millis: Uint) {
        *self.now.lock() = millis;
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_millis(&self) -> Uint {
        *self.now.lock()
    }
}

/// The clock used by constructors that do not take one.
pub(crate) fn default_clock() -> Arc<dyn Clock> {
    Arc::new(MonotonicClock::new())
}
