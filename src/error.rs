//! error.rs
//! Construction errors for every limiter core.
//!
//! Rejecting a request is never an error: admission methods return `false`.
//! Errors only occur while building a limiter.

use crate::types::Uint;
use thiserror::Error;

/// A limiter configuration that cannot describe a working limiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A numeric field that must be strictly positive was zero.
    #[error("`{field}` must be greater than 0")]
    NonPositive {
        field: &'static str,
    },
    /// The ring window cannot be split into sub-windows of at least one millisecond.
    #[error(
        "window of {window_size_millis}ms cannot be split into {sub_window_count} sub-windows of at least 1ms"
    )]
    ZeroSubWindow {
        window_size_millis: Uint,
        sub_window_count: Uint,
    },
    /// The ring would need more slots than it may preallocate.
    #[error("{sub_window_count} sub-windows exceeds the supported maximum of {max}")]
    TooManySubWindows {
        sub_window_count: Uint,
        max: Uint,
    },
    /// The queue capacity does not fit in `usize` on this target.
    #[error("capacity of {capacity} exceeds the addressable maximum of {max}")]
    CapacityTooLarge {
        capacity: Uint,
        max: Uint,
    },
    /// The rate is too high to express one tick as a non-zero duration.
    #[error("rate of {rate_per_second}/s exceeds the supported maximum of 1000000000/s")]
    RateTooHigh {
        rate_per_second: Uint,
    },
}

/// Error returned when building a limiter that owns a background timer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LimiterError {
    /// The configuration was rejected by validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The background timer thread could not be spawned.
    #[error("failed to spawn background timer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Fails with [`ConfigError::NonPositive`] when `value` is zero.
#[inline]
pub(crate) fn ensure_positive(field: &'static str, value: Uint) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::NonPositive { field })
    } else {
        Ok(())
    }
}
