use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ensure_positive, ConfigError, LimiterError};
use crate::rate_limit::RateLimitCore;
use crate::ticker::{cadence_for_rate, Ticker};
use crate::types::Uint;

/// Token bucket refilled by an owned background timer.
///
/// The bucket starts full. Every `1000 / rate_per_second` milliseconds the
/// timer adds one token, clamped to `capacity`; requests spend tokens. The
/// timer thread belongs to the limiter: it is stopped by
/// [`shutdown`](Self::shutdown) or when the limiter is dropped. After shutdown
/// the remaining tokens can still be spent but are no longer replenished.
///
/// # Example
///
/// ```rust
/// use rate_gate_core::cores::{TickingTokenBucketCore, TickingTokenBucketCoreConfig};
///
/// let bucket = TickingTokenBucketCore::new(TickingTokenBucketCoreConfig::new(5, 2)).unwrap();
///
/// assert!(bucket.try_acquire(5));
/// assert!(!bucket.try_acquire(1));
/// bucket.shutdown();
/// ```
pub struct TickingTokenBucketCore {
    /// Maximum number of tokens the bucket can hold
    capacity: Uint,
    /// Available tokens, shared with the refill timer
    tokens: Arc<Mutex<Uint>>,
    ticker: Ticker,
}

/// One refill tick: add a token, never beyond capacity.
#[inline(always)]
fn add_token(tokens: &Mutex<Uint>, capacity: Uint) {
    let mut available = tokens.lock();
    *available = available.saturating_add(1).min(capacity);
}

impl TickingTokenBucketCore {
    /// Creates a full bucket and starts its refill timer.
    ///
    /// The timer runs on real time (the monotonic system clock); this core does
    /// not take an injectable [`Clock`](crate::clock::Clock).
    pub fn new(config: TickingTokenBucketCoreConfig) -> Result<Self, LimiterError> {
        config.validate()?;
        let cadence = cadence_for_rate(config.rate_per_second)?;
        debug!(
            capacity = config.capacity,
            rate_per_second = config.rate_per_second,
            "ticking token bucket limiter created"
        );

        let capacity = config.capacity;
        let tokens = Arc::new(Mutex::new(capacity));
        let tick_tokens = tokens.clone();
        let ticker = Ticker::spawn("token-bucket-refill", cadence, move || {
            add_token(&tick_tokens, capacity)
        })?;

        Ok(TickingTokenBucketCore {
            capacity,
            tokens,
            ticker,
        })
    }

    /// Attempts to spend `cost` tokens.
    pub fn try_acquire(&self, cost: Uint) -> bool {
        if cost == 0 {
            return true;
        }

        let mut available = self.tokens.lock();
        if *available >= cost {
            *available -= cost;
            true
        } else {
            false
        }
    }

    /// Tokens currently in the bucket.
    pub fn tokens(&self) -> Uint {
        *self.tokens.lock()
    }

    /// Maximum number of tokens the bucket can hold.
    pub fn capacity(&self) -> Uint {
        self.capacity
    }

    /// Stops the refill timer and joins its thread. Idempotent.
    pub fn shutdown(&self) {
        self.ticker.shutdown();
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    pub fn is_shutdown(&self) -> bool {
        self.ticker.is_stopped()
    }
}

impl RateLimitCore for TickingTokenBucketCore {
    #[inline(always)]
    fn try_acquire(&self, tokens: Uint) -> bool {
        self.try_acquire(tokens)
    }

    #[inline(always)]
    fn capacity_remaining(&self) -> Uint {
        self.tokens()
    }

    #[inline(always)]
    fn shutdown(&self) {
        self.shutdown()
    }
}

/// Configuration structure for creating a `TickingTokenBucketCore` limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TickingTokenBucketCoreConfig {
    /// Maximum number of tokens the bucket can hold.
    pub capacity: Uint,
    /// Tokens added per second, one at a time.
    pub rate_per_second: Uint,
}

impl TickingTokenBucketCoreConfig {
    /// Creates a new configuration instance.
    pub fn new(capacity: Uint, rate_per_second: Uint) -> Self {
        Self {
            capacity,
            rate_per_second,
        }
    }

    /// Checks that every field is positive and the rate has a non-zero cadence.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("capacity", self.capacity)?;
        cadence_for_rate(self.rate_per_second).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Rate 1 gives a one-second cadence, long enough that the timer stays out
    // of the way while ticks are driven by hand.
    fn idle_bucket(capacity: Uint) -> TickingTokenBucketCore {
        TickingTokenBucketCore::new(TickingTokenBucketCoreConfig::new(capacity, 1)).unwrap()
    }

    #[test]
    fn test_refill_saturates_at_capacity() {
        let bucket = idle_bucket(3);
        for _ in 0..100 {
            add_token(&bucket.tokens, bucket.capacity);
        }
        assert_eq!(bucket.tokens(), 3);
        bucket.shutdown();
    }

    #[test]
    fn test_refill_after_spending() {
        let bucket = idle_bucket(3);
        assert!(bucket.try_acquire(3));
        assert!(!bucket.try_acquire(1));

        add_token(&bucket.tokens, bucket.capacity);
        assert_eq!(bucket.tokens(), 1);
        assert!(!bucket.try_acquire(2));
        assert_eq!(bucket.tokens(), 1);
        assert!(bucket.try_acquire(1));
        bucket.shutdown();
    }
}
