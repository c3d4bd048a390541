use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{default_clock, Clock};
use crate::error::{ensure_positive, ConfigError};
use crate::rate_limit::RateLimitCore;
use crate::types::Uint;

/// Largest `sub_window_count` a ring accepts. The slots are allocated up front.
pub const MAX_SUB_WINDOWS: Uint = 1 << 16;

/// Core implementation of the sliding window counter over a fixed ring of slots.
///
/// The window of `window_size_millis` is divided into `sub_window_count` slots
/// of `window_size_millis / sub_window_count` each. A cursor points at the slot
/// for the sub-window that started at `window_start`. When time moves past one
/// or more sub-windows, the cursor slides forward and every slot it passes
/// over is zeroed, so the sum of all slots is always the traffic of the last
/// window.
///
/// Unlike [`SlidingWindowMapCore`](crate::cores::SlidingWindowMapCore), memory
/// is fixed at construction and a slide costs at most `sub_window_count` steps.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rate_gate_core::clock::ManualClock;
/// use rate_gate_core::cores::{SlidingWindowRingCore, SlidingWindowRingCoreConfig};
///
/// // 2 requests per 1000ms, 2 slots of 500ms
/// let config = SlidingWindowRingCoreConfig::new(1000, 2, 2);
/// let limiter = SlidingWindowRingCore::with_clock(config, Arc::new(ManualClock::new(0))).unwrap();
///
/// assert!(limiter.try_acquire_at(1, 1));
/// assert!(limiter.try_acquire_at(501, 1));
/// assert!(!limiter.try_acquire_at(502, 1));
///
/// // The slot holding t=1 slides out
/// assert!(limiter.try_acquire_at(1001, 1));
/// ```
pub struct SlidingWindowRingCore {
    /// Maximum number of units admitted within the window
    limit: Uint,
    /// Duration of each slot in milliseconds
    sub_window_millis: Uint,
    clock: Arc<dyn Clock>,
    /// Internal state protected by mutex for thread safety
    state: Mutex<SlidingWindowRingCoreState>,
}

/// Internal state of the ring counter
struct SlidingWindowRingCoreState {
    /// Admitted units per slot (circular array)
    counters: Vec<Uint>,
    /// Slot of the sub-window starting at `window_start`
    index: usize,
    /// Start of the sub-window the cursor points at
    window_start: Uint,
}

impl SlidingWindowRingCoreState {
    /// Number of whole sub-windows between `window_start` and `tick`.
    #[inline(always)]
    fn elapsed_windows(&self, tick: Uint, sub_window_millis: Uint) -> Uint {
        tick.saturating_sub(self.window_start) / sub_window_millis
    }

    /// Moves the cursor forward, zeroing each slot it lands on.
    fn slide(&mut self, elapsed_windows: Uint, sub_window_millis: Uint) {
        if elapsed_windows == 0 {
            return;
        }

        let len = self.counters.len();
        let steps = elapsed_windows.min(len as Uint) as usize;
        for _ in 0..steps {
            self.index = (self.index + 1) % len;
            self.counters[self.index] = 0;
        }

        self.window_start = self
            .window_start
            .saturating_add(elapsed_windows.saturating_mul(sub_window_millis));
    }

    #[inline(always)]
    fn total(&self) -> Uint {
        self.counters
            .iter()
            .fold(0 as Uint, |sum, count| sum.saturating_add(*count))
    }
}

impl SlidingWindowRingCore {
    /// Creates a ring counter driven by a monotonic clock.
    pub fn new(config: SlidingWindowRingCoreConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, default_clock())
    }

    /// Creates a ring counter reading time from `clock`.
    ///
    /// The cursor's sub-window starts at the clock's current instant.
    pub fn with_clock(config: SlidingWindowRingCoreConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let sub_window_millis = config.sub_window_millis();
        debug!(
            limit = config.limit,
            window_size_millis = config.window_size_millis,
            sub_window_count = config.sub_window_count,
            sub_window_millis,
            "sliding window (ring) limiter created"
        );

        let slots = usize::try_from(config.sub_window_count).map_err(|_| ConfigError::TooManySubWindows {
            sub_window_count: config.sub_window_count,
            max: MAX_SUB_WINDOWS,
        })?;

        let window_start = clock.now_millis();
        Ok(SlidingWindowRingCore {
            limit: config.limit,
            sub_window_millis,
            clock,
            state: Mutex::new(SlidingWindowRingCoreState {
                counters: vec![0; slots],
                index: 0,
                window_start,
            }),
        })
    }

    /// Attempts to admit `tokens` units at the clock's current instant.
    #[inline]
    pub fn try_acquire(&self, tokens: Uint) -> bool {
        self.try_acquire_at(self.clock.now_millis(), tokens)
    }

    /// Attempts to admit `tokens` units at the given instant.
    ///
    /// The slide, the sum over all slots and the increment happen under one
    /// lock.
    pub fn try_acquire_at(&self, tick: Uint, tokens: Uint) -> bool {
        if tokens == 0 {
            return true;
        }

        let mut state = self.state.lock();

        let elapsed_windows = state.elapsed_windows(tick, self.sub_window_millis);
        state.slide(elapsed_windows, self.sub_window_millis);

        if tokens <= self.limit.saturating_sub(state.total()) {
            let index = state.index;
            state.counters[index] += tokens;
            true
        } else {
            false
        }
    }

    /// Returns how many units the window would still admit at `tick`, without
    /// sliding the ring.
    pub fn capacity_remaining_at(&self, tick: Uint) -> Uint {
        let state = self.state.lock();
        let len = state.counters.len();
        let elapsed_windows = state.elapsed_windows(tick, self.sub_window_millis);

        if elapsed_windows >= len as Uint {
            return self.limit;
        }

        // Slots a slide would zero: the `elapsed_windows` slots after the cursor.
        let expiring = (1..=elapsed_windows as usize)
            .map(|offset| state.counters[(state.index + offset) % len])
            .fold(0 as Uint, |sum, count| sum.saturating_add(count));

        self.limit
            .saturating_sub(state.total().saturating_sub(expiring))
    }
}

impl RateLimitCore for SlidingWindowRingCore {
    #[inline(always)]
    fn try_acquire(&self, tokens: Uint) -> bool {
        self.try_acquire(tokens)
    }

    #[inline(always)]
    fn capacity_remaining(&self) -> Uint {
        self.capacity_remaining_at(self.clock.now_millis())
    }
}

/// Configuration structure for creating a `SlidingWindowRingCore` limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlidingWindowRingCoreConfig {
    /// Window length in milliseconds.
    pub window_size_millis: Uint,
    /// Maximum number of units admitted within the window.
    pub limit: Uint,
    /// Number of slots the window is divided into.
    pub sub_window_count: Uint,
}

impl SlidingWindowRingCoreConfig {
    /// Creates a new configuration instance.
    pub fn new(window_size_millis: Uint, limit: Uint, sub_window_count: Uint) -> Self {
        Self {
            window_size_millis,
            limit,
            sub_window_count,
        }
    }

    /// Length of one slot in milliseconds.
    #[inline]
    pub fn sub_window_millis(&self) -> Uint {
        if self.sub_window_count == 0 {
            0
        } else {
            self.window_size_millis / self.sub_window_count
        }
    }

    /// Checks that every field is positive, the slot count is at most
    /// [`MAX_SUB_WINDOWS`] and each slot lasts at least 1ms.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("window_size_millis", self.window_size_millis)?;
        ensure_positive("limit", self.limit)?;
        ensure_positive("sub_window_count", self.sub_window_count)?;
        if self.sub_window_count > MAX_SUB_WINDOWS {
            return Err(ConfigError::TooManySubWindows {
                sub_window_count: self.sub_window_count,
                max: MAX_SUB_WINDOWS,
            });
        }
        if self.sub_window_millis() == 0 {
            return Err(ConfigError::ZeroSubWindow {
                window_size_millis: self.window_size_millis,
                sub_window_count: self.sub_window_count,
            });
        }
        Ok(())
    }
}

impl TryFrom<SlidingWindowRingCoreConfig> for SlidingWindowRingCore {
    type Error = ConfigError;

    #[inline(always)]
    fn try_from(config: SlidingWindowRingCoreConfig) -> Result<Self, Self::Error> {
        SlidingWindowRingCore::new(config)
    }
}
