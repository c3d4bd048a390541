use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{default_clock, Clock};
use crate::error::{ensure_positive, ConfigError};
use crate::rate_limit::RateLimitCore;
use crate::types::Uint;

/// Core implementation of the fixed window counter algorithm.
///
/// A single counter guards the current window. Once more than
/// `window_size_millis` have elapsed since the window started, the counter
/// resets to zero and the window restarts at the current instant.
///
/// # Boundary bursts
///
/// Fixed windows are blind to traffic that straddles a reset: a caller can
/// spend the whole threshold at the tail of one window and the whole threshold
/// again at the head of the next. Up to `2 * threshold - 1` units may therefore
/// be admitted within a single window length. Use
/// [`SlidingWindowMapCore`](crate::cores::SlidingWindowMapCore) or
/// [`SlidingWindowRingCore`](crate::cores::SlidingWindowRingCore) when that
/// matters.
///
/// # Example
///
/// ```rust
/// use rate_gate_core::cores::{FixedWindowCore, FixedWindowCoreConfig};
///
/// // 2 requests per 1000ms window, window opened at t=0
/// let limiter = FixedWindowCore::new(FixedWindowCoreConfig::new(2, 1000)).unwrap();
///
/// assert!(limiter.try_acquire_at(0, 1));
/// assert!(limiter.try_acquire_at(100, 1));
/// assert!(!limiter.try_acquire_at(200, 1));
///
/// // More than 1000ms after the window start: counter resets
/// assert!(limiter.try_acquire_at(1500, 1));
/// ```
pub struct FixedWindowCore {
    /// Maximum number of units admitted per window
    threshold: Uint,
    /// Duration of each window in milliseconds
    window_size_millis: Uint,
    clock: Arc<dyn Clock>,
    /// Counter and window start, reset together
    state: Mutex<FixedWindowCoreState>,
}

/// Internal state of the fixed window counter
struct FixedWindowCoreState {
    /// Units admitted in the active window
    count: Uint,
    /// Instant the active window started
    window_start: Uint,
}

impl FixedWindowCore {
    /// Creates a fixed window counter driven by a monotonic clock.
    pub fn new(config: FixedWindowCoreConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, default_clock())
    }

    /// Creates a fixed window counter reading time from `clock`.
    ///
    /// The first window starts at the clock's current instant.
    pub fn with_clock(config: FixedWindowCoreConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            threshold = config.threshold,
            window_size_millis = config.window_size_millis,
            "fixed window limiter created"
        );

        let window_start = clock.now_millis();
        Ok(FixedWindowCore {
            threshold: config.threshold,
            window_size_millis: config.window_size_millis,
            clock,
            state: Mutex::new(FixedWindowCoreState {
                count: 0,
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
    /// The window reset (if due) happens before the admission check, under the
    /// same lock, so no caller can observe a stale count in a new window.
    pub fn try_acquire_at(&self, tick: Uint, tokens: Uint) -> bool {
        if tokens == 0 {
            return true;
        }

        let mut state = self.state.lock();

        if tick.saturating_sub(state.window_start) > self.window_size_millis {
            state.count = 0;
            state.window_start = tick;
        }

        if tokens <= self.threshold.saturating_sub(state.count) {
            state.count += tokens;
            true
        } else {
            false
        }
    }

    /// Returns how many units the window would still admit at `tick`, without
    /// resetting it.
    pub fn capacity_remaining_at(&self, tick: Uint) -> Uint {
        let state = self.state.lock();
        if tick.saturating_sub(state.window_start) > self.window_size_millis {
            self.threshold
        } else {
            self.threshold.saturating_sub(state.count)
        }
    }

    /// Units admitted in the active window, as last recorded.
    pub fn current_count(&self) -> Uint {
        self.state.lock().count
    }
}

impl RateLimitCore for FixedWindowCore {
    #[inline(always)]
    fn try_acquire(&self, tokens: Uint) -> bool {
        self.try_acquire(tokens)
    }

    #[inline(always)]
    fn capacity_remaining(&self) -> Uint {
        self.capacity_remaining_at(self.clock.now_millis())
    }
}

/// Configuration structure for creating a `FixedWindowCore` limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixedWindowCoreConfig {
    /// Maximum number of units admitted per window.
    pub threshold: Uint,
    /// Window length in milliseconds.
    pub window_size_millis: Uint,
}

impl FixedWindowCoreConfig {
    /// Creates a new configuration instance.
    pub fn new(threshold: Uint, window_size_millis: Uint) -> Self {
        Self {
            threshold,
            window_size_millis,
        }
    }

    /// Checks that every field is strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("threshold", self.threshold)?;
        ensure_positive("window_size_millis", self.window_size_millis)
    }
}

impl TryFrom<FixedWindowCoreConfig> for FixedWindowCore {
    type Error = ConfigError;

    #[inline(always)]
    fn try_from(config: FixedWindowCoreConfig) -> Result<Self, Self::Error> {
        FixedWindowCore::new(config)
    }
}
