use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{default_clock, Clock};
use crate::error::{ensure_positive, ConfigError};
use crate::rate_limit::RateLimitCore;
use crate::types::Uint;

/// Core implementation of the token bucket algorithm with on-demand refill.
///
/// The bucket holds up to `capacity` tokens and starts full. Instead of a
/// timer, every call works out how many whole refill intervals have passed
/// since the last refill and adds `tokens_per_interval` for each, capped at
/// capacity. This keeps the limiter free of background threads at the cost of
/// slightly coarser timing: the partial interval in progress at refill time
/// is forfeited.
///
/// # Algorithm Behavior
///
/// - The bucket starts full with `capacity` tokens
/// - When at least `refill_interval_millis` have passed since the last refill,
///   `(elapsed / interval) * tokens_per_interval` tokens are added and the
///   refill timestamp moves to now
/// - A request for `num` tokens is admitted iff at least `num` are available
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rate_gate_core::clock::ManualClock;
/// use rate_gate_core::cores::{TokenBucketCore, TokenBucketCoreConfig};
///
/// // Capacity 5, one token added every 500ms
/// let clock = Arc::new(ManualClock::new(0));
/// let bucket = TokenBucketCore::with_clock(TokenBucketCoreConfig::new(5, 500, Some(1)), clock.clone()).unwrap();
///
/// for _ in 0..5 {
///     assert!(bucket.try_acquire(1));
/// }
/// assert!(!bucket.try_acquire(1));
///
/// clock.advance(500);
/// assert!(bucket.try_acquire(1));
/// ```
pub struct TokenBucketCore {
    /// Maximum number of tokens the bucket can hold
    capacity: Uint,
    /// Milliseconds between refill events
    refill_interval_millis: Uint,
    /// Tokens added per elapsed interval
    tokens_per_interval: Uint,
    clock: Arc<dyn Clock>,
    /// Internal state protected by mutex for thread safety
    state: Mutex<TokenBucketCoreState>,
}

/// Internal state of the token bucket
struct TokenBucketCoreState {
    /// Current number of tokens available in the bucket
    available: Uint,
    /// Instant of the last refill
    last_refill: Uint,
}

impl TokenBucketCore {
    /// Creates a token bucket driven by a monotonic clock.
    pub fn new(config: TokenBucketCoreConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, default_clock())
    }

    /// Creates a token bucket reading time from `clock`.
    pub fn with_clock(config: TokenBucketCoreConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let tokens_per_interval = config.tokens_per_interval();
        debug!(
            capacity = config.capacity,
            refill_interval_millis = config.refill_interval_millis,
            tokens_per_interval,
            "token bucket limiter created"
        );

        let last_refill = clock.now_millis();
        Ok(TokenBucketCore {
            capacity: config.capacity,
            refill_interval_millis: config.refill_interval_millis,
            tokens_per_interval,
            clock,
            state: Mutex::new(TokenBucketCoreState {
                available: config.capacity, // Bucket starts full
                last_refill,
            }),
        })
    }

    /// Tokens the refill at `tick` would add, or `None` before a whole interval passed.
    #[inline(always)]
    fn refill_due(&self, state: &TokenBucketCoreState, tick: Uint) -> Option<Uint> {
        let elapsed = tick.saturating_sub(state.last_refill);
        if elapsed >= self.refill_interval_millis {
            Some((elapsed / self.refill_interval_millis).saturating_mul(self.tokens_per_interval))
        } else {
            None
        }
    }

    /// Attempts to take `tokens` tokens at the clock's current instant.
    #[inline]
    pub fn try_acquire(&self, tokens: Uint) -> bool {
        self.try_acquire_at(self.clock.now_millis(), tokens)
    }

    /// Attempts to take `tokens` tokens at the given instant.
    ///
    /// The refill and the admission check happen under the same lock. A
    /// rejected request leaves the token count as refilled.
    pub fn try_acquire_at(&self, tick: Uint, tokens: Uint) -> bool {
        if tokens == 0 {
            return true;
        }

        let mut state = self.state.lock();

        if let Some(refilled) = self.refill_due(&state, tick) {
            state.last_refill = tick;
            state.available = state.available.saturating_add(refilled).min(self.capacity);
        }

        if state.available == 0 || state.available < tokens {
            return false;
        }
        state.available -= tokens;
        true
    }

    /// Tokens available at `tick`, without persisting the refill.
    pub fn tokens_at(&self, tick: Uint) -> Uint {
        let state = self.state.lock();
        match self.refill_due(&state, tick) {
            Some(refilled) => state.available.saturating_add(refilled).min(self.capacity),
            None => state.available,
        }
    }

    /// Gets the current token count without applying any refill.
    #[inline]
    pub fn current_tokens(&self) -> Uint {
        self.state.lock().available
    }
}

impl RateLimitCore for TokenBucketCore {
    #[inline(always)]
    fn try_acquire(&self, tokens: Uint) -> bool {
        self.try_acquire(tokens)
    }

    #[inline(always)]
    fn capacity_remaining(&self) -> Uint {
        self.tokens_at(self.clock.now_millis())
    }
}

/// Configuration structure for creating a `TokenBucketCore` limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenBucketCoreConfig {
    /// Maximum number of tokens the bucket can hold.
    pub capacity: Uint,
    /// Milliseconds between refill events.
    pub refill_interval_millis: Uint,
    /// Tokens added per interval. Defaults to `capacity * interval / 1000`,
    /// at least 1, i.e. a full bucket per second.
    #[serde(default)]
    pub avg_tokens_per_interval: Option<Uint>,
}

impl TokenBucketCoreConfig {
    /// Creates a new configuration instance.
    pub fn new(capacity: Uint, refill_interval_millis: Uint, avg_tokens_per_interval: Option<Uint>) -> Self {
        Self {
            capacity,
            refill_interval_millis,
            avg_tokens_per_interval,
        }
    }

    /// Tokens added per elapsed interval, resolving the default.
    pub fn tokens_per_interval(&self) -> Uint {
        self.avg_tokens_per_interval.unwrap_or_else(|| {
            (self.capacity.saturating_mul(self.refill_interval_millis) / 1000).max(1)
        })
    }

    /// Checks that every field is strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("capacity", self.capacity)?;
        ensure_positive("refill_interval_millis", self.refill_interval_millis)?;
        if let Some(avg) = self.avg_tokens_per_interval {
            ensure_positive("avg_tokens_per_interval", avg)?;
        }
        Ok(())
    }
}

impl TryFrom<TokenBucketCoreConfig> for TokenBucketCore {
    type Error = ConfigError;

    /// Converts a `TokenBucketCoreConfig` into a `TokenBucketCore` instance.
    ///
    /// ```
    /// use rate_gate_core::cores::{TokenBucketCore, TokenBucketCoreConfig};
    ///
    /// let limiter: TokenBucketCore = TokenBucketCoreConfig {
    ///     capacity: 100,
    ///     refill_interval_millis: 10,
    ///     avg_tokens_per_interval: None,
    /// }
    /// .try_into()
    /// .unwrap();
    /// assert_eq!(limiter.current_tokens(), 100);
    /// ```
    #[inline(always)]
    fn try_from(config: TokenBucketCoreConfig) -> Result<Self, Self::Error> {
        TokenBucketCore::new(config)
    }
}
