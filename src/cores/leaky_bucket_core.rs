use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{default_clock, Clock};
use crate::error::{ensure_positive, ConfigError};
use crate::rate_limit::RateLimitCore;
use crate::types::Uint;

const MILLIS_PER_SECOND: Uint = 1000;

/// Core implementation of the leaky bucket algorithm with virtual leaking.
///
/// The bucket holds "water" up to `capacity`. Every admitted unit adds water;
/// water drains at `rate_per_second` continuously, computed from elapsed time
/// on each call rather than by a background thread.
///
/// # Algorithm Behavior
///
/// - The bucket starts empty.
/// - On each call, `elapsed * rate / 1000` units leak out (never below zero).
///   The leak timestamp only moves when at least one whole unit leaked.
/// - A request of `amount` is admitted iff `water + amount <= capacity`.
///
/// This bounds accumulated backlog, not the emission rate: an empty bucket
/// admits a burst of `capacity` at once. See
/// [`LeakyQueueCore`](crate::cores::LeakyQueueCore) for a bucket that releases
/// work at a steady cadence.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rate_gate_core::clock::ManualClock;
/// use rate_gate_core::cores::{LeakyBucketCore, LeakyBucketCoreConfig};
///
/// // Capacity 10, draining 1 unit per second
/// let clock = Arc::new(ManualClock::new(0));
/// let bucket = LeakyBucketCore::with_clock(LeakyBucketCoreConfig::new(10, 1), clock.clone()).unwrap();
///
/// assert!(bucket.try_consume(5));
///
/// // Two units leak in two seconds: 3 + 6 <= 10
/// clock.advance(2000);
/// assert!(bucket.try_consume(6));
/// assert!(!bucket.try_consume(2));
/// ```
pub struct LeakyBucketCore {
    /// Maximum amount of water the bucket can hold.
    capacity: Uint,
    /// Units drained per second.
    rate_per_second: Uint,
    clock: Arc<dyn Clock>,
    /// Internal state protected by mutex for thread safety.
    state: Mutex<LeakyBucketCoreState>,
}

/// Internal state of the leaky bucket.
struct LeakyBucketCoreState {
    /// Current water level.
    water: Uint,
    /// Instant of the last leak that removed at least one unit.
    last_leak: Uint,
}

impl LeakyBucketCore {
    /// Creates a leaky bucket driven by a monotonic clock.
    pub fn new(config: LeakyBucketCoreConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, default_clock())
    }

    /// Creates a leaky bucket reading time from `clock`.
    pub fn with_clock(config: LeakyBucketCoreConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            capacity = config.capacity,
            rate_per_second = config.rate_per_second,
            "leaky bucket limiter created"
        );

        let last_leak = clock.now_millis();
        Ok(LeakyBucketCore {
            capacity: config.capacity,
            rate_per_second: config.rate_per_second,
            clock,
            state: Mutex::new(LeakyBucketCoreState { water: 0, last_leak }),
        })
    }

    /// Water that has leaked between the last leak and `tick`.
    #[inline(always)]
    fn leaked_since(&self, state: &LeakyBucketCoreState, tick: Uint) -> Uint {
        tick.saturating_sub(state.last_leak)
            .saturating_mul(self.rate_per_second)
            / MILLIS_PER_SECOND
    }

    /// Attempts to pour `amount` units into the bucket at the clock's current instant.
    #[inline]
    pub fn try_consume(&self, amount: Uint) -> bool {
        self.try_consume_at(self.clock.now_millis(), amount)
    }

    /// Attempts to pour `amount` units into the bucket at the given instant.
    ///
    /// The leak and the admission check happen under the same lock.
    pub fn try_consume_at(&self, tick: Uint, amount: Uint) -> bool {
        if amount == 0 {
            return true;
        }

        let mut state = self.state.lock();

        let leaked = self.leaked_since(&state, tick);
        if leaked > 0 {
            state.water = state.water.saturating_sub(leaked);
            state.last_leak = tick;
        }

        if amount <= self.capacity.saturating_sub(state.water) {
            state.water += amount;
            true
        } else {
            false
        }
    }

    /// Same as [`try_consume_at`](Self::try_consume_at).
    #[inline(always)]
    pub fn try_acquire_at(&self, tick: Uint, tokens: Uint) -> bool {
        self.try_consume_at(tick, tokens)
    }

    /// Water level at `tick` after leaking, without persisting the leak.
    pub fn water_at(&self, tick: Uint) -> Uint {
        let state = self.state.lock();
        state.water.saturating_sub(self.leaked_since(&state, tick))
    }

    /// Water level at the clock's current instant.
    #[inline]
    pub fn water(&self) -> Uint {
        self.water_at(self.clock.now_millis())
    }
}

impl RateLimitCore for LeakyBucketCore {
    #[inline(always)]
    fn try_acquire(&self, tokens: Uint) -> bool {
        self.try_consume(tokens)
    }

    #[inline(always)]
    fn capacity_remaining(&self) -> Uint {
        self.capacity.saturating_sub(self.water())
    }
}

/// Configuration structure for creating a `LeakyBucketCore` limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeakyBucketCoreConfig {
    /// Maximum amount of water the bucket can hold.
    pub capacity: Uint,
    /// Units drained per second.
    pub rate_per_second: Uint,
}

impl LeakyBucketCoreConfig {
    /// Creates a new configuration instance.
    pub fn new(capacity: Uint, rate_per_second: Uint) -> Self {
        Self {
            capacity,
            rate_per_second,
        }
    }

    /// Checks that every field is strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("capacity", self.capacity)?;
        ensure_positive("rate_per_second", self.rate_per_second)
    }
}

impl TryFrom<LeakyBucketCoreConfig> for LeakyBucketCore {
    type Error = ConfigError;

    #[inline(always)]
    fn try_from(config: LeakyBucketCoreConfig) -> Result<Self, Self::Error> {
        LeakyBucketCore::new(config)
    }
}
