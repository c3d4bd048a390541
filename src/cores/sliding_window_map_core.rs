use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{default_clock, Clock};
use crate::error::{ensure_positive, ConfigError};
use crate::rate_limit::RateLimitCore;
use crate::types::Uint;

/// Core implementation of the sliding window counter over a time-keyed map.
///
/// Time is cut into sub-windows of `sub_cycle_millis`. Each admitted unit is
/// recorded in the bucket keyed by the start of its sub-window. The window
/// checked on every call spans the current sub-window and the
/// `sub_window_count - 1` before it; older buckets are evicted lazily and never
/// counted.
///
/// # Sliding Window Calculation
///
/// For an instant `tick`:
/// - `current = tick / sub_cycle * sub_cycle`
/// - `floor = current - sub_cycle * (sub_window_count - 1)`
///
/// Buckets keyed below `floor` are dropped; the rest are summed.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rate_gate_core::clock::ManualClock;
/// use rate_gate_core::cores::{SlidingWindowMapCore, SlidingWindowMapCoreConfig};
///
/// // 3 requests per 1000ms, tracked in 5 sub-windows of 200ms
/// let config = SlidingWindowMapCoreConfig::new(200, 5, 3);
/// let limiter = SlidingWindowMapCore::with_clock(config, Arc::new(ManualClock::new(0))).unwrap();
///
/// assert!(limiter.try_acquire_at(0, 1));
/// assert!(limiter.try_acquire_at(25, 1));
/// assert!(limiter.try_acquire_at(50, 1));
///
/// // A fixed window would have reset by now; the sliding window still sees t=0..50
/// assert!(!limiter.try_acquire_at(900, 1));
///
/// // At t=1000 the bucket for [0, 200) has left the window
/// assert!(limiter.try_acquire_at(1000, 1));
/// ```
pub struct SlidingWindowMapCore {
    /// Maximum number of units admitted within the sliding window
    threshold: Uint,
    /// Duration of each sub-window in milliseconds
    sub_cycle_millis: Uint,
    /// Number of sub-windows making up the sliding window
    sub_window_count: Uint,
    clock: Arc<dyn Clock>,
    /// Buckets keyed by sub-window start
    state: Mutex<BTreeMap<Uint, Uint>>,
}

impl SlidingWindowMapCore {
    /// Creates a sliding window counter driven by a monotonic clock.
    pub fn new(config: SlidingWindowMapCoreConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, default_clock())
    }

    /// Creates a sliding window counter reading time from `clock`.
    pub fn with_clock(config: SlidingWindowMapCoreConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            threshold = config.threshold,
            sub_cycle_millis = config.sub_cycle_millis,
            sub_window_count = config.sub_window_count,
            "sliding window (map) limiter created"
        );

        Ok(SlidingWindowMapCore {
            threshold: config.threshold,
            sub_cycle_millis: config.sub_cycle_millis,
            sub_window_count: config.sub_window_count,
            clock,
            state: Mutex::new(BTreeMap::new()),
        })
    }

    /// Total window length in milliseconds.
    #[inline]
    pub fn window_millis(&self) -> Uint {
        self.sub_cycle_millis.saturating_mul(self.sub_window_count)
    }

    /// Start of the sub-window containing `tick`, and the oldest sub-window
    /// start still inside the sliding window.
    #[inline(always)]
    fn window_bounds(&self, tick: Uint) -> (Uint, Uint) {
        let current = tick / self.sub_cycle_millis * self.sub_cycle_millis;
        let span = self.sub_cycle_millis.saturating_mul(self.sub_window_count - 1);
        (current, current.saturating_sub(span))
    }

    /// Attempts to admit `tokens` units at the clock's current instant.
    #[inline]
    pub fn try_acquire(&self, tokens: Uint) -> bool {
        self.try_acquire_at(self.clock.now_millis(), tokens)
    }

    /// Attempts to admit `tokens` units at the given instant.
    ///
    /// Eviction, summation and the increment all happen under one lock.
    /// Eviction cost is proportional to the number of stale buckets, which is
    /// bounded by `sub_window_count`.
    pub fn try_acquire_at(&self, tick: Uint, tokens: Uint) -> bool {
        if tokens == 0 {
            return true;
        }

        let (current, floor) = self.window_bounds(tick);
        let mut buckets = self.state.lock();

        // Keep only buckets at or after the floor.
        let live = buckets.split_off(&floor);
        *buckets = live;

        let total = buckets
            .values()
            .fold(0 as Uint, |sum, count| sum.saturating_add(*count));

        if tokens <= self.threshold.saturating_sub(total) {
            let bucket = buckets.entry(current).or_insert(0);
            *bucket += tokens;
            true
        } else {
            false
        }
    }

    /// Returns how many units the window would still admit at `tick`, without
    /// evicting anything.
    pub fn capacity_remaining_at(&self, tick: Uint) -> Uint {
        let (_, floor) = self.window_bounds(tick);
        let buckets = self.state.lock();
        let total = buckets
            .range(floor..)
            .fold(0 as Uint, |sum, (_, count)| sum.saturating_add(*count));
        self.threshold.saturating_sub(total)
    }

    /// Number of buckets currently stored, live or not yet evicted.
    pub fn bucket_count(&self) -> usize {
        self.state.lock().len()
    }
}

impl RateLimitCore for SlidingWindowMapCore {
    #[inline(always)]
    fn try_acquire(&self, tokens: Uint) -> bool {
        self.try_acquire(tokens)
    }

    #[inline(always)]
    fn capacity_remaining(&self) -> Uint {
        self.capacity_remaining_at(self.clock.now_millis())
    }
}

/// Configuration structure for creating a `SlidingWindowMapCore` limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlidingWindowMapCoreConfig {
    /// Length of each sub-window in milliseconds.
    pub sub_cycle_millis: Uint,
    /// Number of sub-windows in the sliding window.
    pub sub_window_count: Uint,
    /// Maximum number of units admitted within the sliding window.
    pub threshold: Uint,
}

impl SlidingWindowMapCoreConfig {
    /// Creates a new configuration instance.
    pub fn new(sub_cycle_millis: Uint, sub_window_count: Uint, threshold: Uint) -> Self {
        Self {
            sub_cycle_millis,
            sub_window_count,
            threshold,
        }
    }

    /// A one-second window split into `1000 / sub_cycle_millis` sub-windows.
    ///
    /// A `sub_cycle_millis` of zero or above 1000 yields a configuration that
    /// fails validation.
    pub fn per_second(sub_cycle_millis: Uint, threshold: Uint) -> Self {
        let sub_window_count = if sub_cycle_millis == 0 { 0 } else { 1000 / sub_cycle_millis };
        Self::new(sub_cycle_millis, sub_window_count, threshold)
    }

    /// Checks that every field is strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("sub_cycle_millis", self.sub_cycle_millis)?;
        ensure_positive("sub_window_count", self.sub_window_count)?;
        ensure_positive("threshold", self.threshold)
    }
}

impl TryFrom<SlidingWindowMapCoreConfig> for SlidingWindowMapCore {
    type Error = ConfigError;

    #[inline(always)]
    fn try_from(config: SlidingWindowMapCoreConfig) -> Result<Self, Self::Error> {
        SlidingWindowMapCore::new(config)
    }
}
