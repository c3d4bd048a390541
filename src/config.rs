//! Algorithm-agnostic limiter configuration.
//!
//! [`LimiterConfig`] names an algorithm together with its parameters and can be
//! deserialized from any serde format. [`build_limiter`] turns it into a boxed
//! [`RateLimitCore`], so callers can pick the algorithm in configuration files
//! instead of code.
//!
//! ```rust
//! use rate_gate_core::clock::MonotonicClock;
//! use rate_gate_core::config::{build_limiter, LimiterConfig};
//! use rate_gate_core::cores::FixedWindowCoreConfig;
//! use std::sync::Arc;
//!
//! let config = LimiterConfig::FixedWindow(FixedWindowCoreConfig::new(2, 1000));
//! let limiter = build_limiter(config, Arc::new(MonotonicClock::new())).unwrap();
//!
//! assert!(limiter.try_acquire_one());
//! assert!(limiter.try_acquire_one());
//! assert!(!limiter.try_acquire_one());
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::cores::{
    FixedWindowCore, FixedWindowCoreConfig, LeakyBucketCore, LeakyBucketCoreConfig, LeakyQueueCore,
    LeakyQueueCoreConfig, SlidingWindowMapCore, SlidingWindowMapCoreConfig, SlidingWindowRingCore,
    SlidingWindowRingCoreConfig, TickingTokenBucketCore, TickingTokenBucketCoreConfig, TokenBucketCore,
    TokenBucketCoreConfig,
};
use crate::error::{ConfigError, LimiterError};
use crate::rate_limit::RateLimitCore;

/// One limiter, described by its algorithm and parameters.
///
/// Serialized with an `algorithm` tag:
///
/// ```json
/// { "algorithm": "token_bucket", "capacity": 5, "refill_interval_millis": 500 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum LimiterConfig {
    FixedWindow(FixedWindowCoreConfig),
    SlidingWindowMap(SlidingWindowMapCoreConfig),
    SlidingWindowRing(SlidingWindowRingCoreConfig),
    LeakyBucket(LeakyBucketCoreConfig),
    /// Queued units are `()` tickets; their drain is a no-op.
    LeakyQueue(LeakyQueueCoreConfig),
    TokenBucket(TokenBucketCoreConfig),
    TickingTokenBucket(TickingTokenBucketCoreConfig),
}

impl LimiterConfig {
    /// Validates the parameters of the selected algorithm.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            LimiterConfig::FixedWindow(config) => config.validate(),
            LimiterConfig::SlidingWindowMap(config) => config.validate(),
            LimiterConfig::SlidingWindowRing(config) => config.validate(),
            LimiterConfig::LeakyBucket(config) => config.validate(),
            LimiterConfig::LeakyQueue(config) => config.validate(),
            LimiterConfig::TokenBucket(config) => config.validate(),
            LimiterConfig::TickingTokenBucket(config) => config.validate(),
        }
    }
}

/// Builds the limiter described by `config`.
///
/// Clock-driven algorithms read time from `clock`; the timer-driven ones
/// (`leaky_queue`, `ticking_token_bucket`) run on real time and ignore it.
pub fn build_limiter(config: LimiterConfig, clock: Arc<dyn Clock>) -> Result<Box<dyn RateLimitCore>, LimiterError> {
    let limiter: Box<dyn RateLimitCore> = match config {
        LimiterConfig::FixedWindow(config) => Box::new(FixedWindowCore::with_clock(config, clock)?),
        LimiterConfig::SlidingWindowMap(config) => Box::new(SlidingWindowMapCore::with_clock(config, clock)?),
        LimiterConfig::SlidingWindowRing(config) => Box::new(SlidingWindowRingCore::with_clock(config, clock)?),
        LimiterConfig::LeakyBucket(config) => Box::new(LeakyBucketCore::with_clock(config, clock)?),
        LimiterConfig::LeakyQueue(config) => Box::new(LeakyQueueCore::<()>::new(config, |_: ()| {})?),
        LimiterConfig::TokenBucket(config) => Box::new(TokenBucketCore::with_clock(config, clock)?),
        LimiterConfig::TickingTokenBucket(config) => Box::new(TickingTokenBucketCore::new(config)?),
    };
    Ok(limiter)
}
