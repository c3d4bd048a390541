//! Core trait for rate limiter algorithms.
//!
//! This module defines the unified trait used by all limiter implementations.
//! It allows consistent use and interchangeability across fixed window, sliding
//! window, leaky bucket and token bucket algorithms.

pub use crate::types::Uint;

/// The core trait implemented by all limiter algorithms.
///
/// Admission is a plain boolean: `true` means the caller may proceed, `false`
/// means it must back off or shed the work. Rejection never allocates, logs or
/// mutates limiter state.
///
/// # Example
///
/// ```rust
/// use rate_gate_core::rate_limit::RateLimitCore;
/// use rate_gate_core::cores::{TokenBucketCore, TokenBucketCoreConfig};
///
/// let limiter: Box<dyn RateLimitCore> =
///     Box::new(TokenBucketCore::new(TokenBucketCoreConfig::new(2, 500, Some(1))).unwrap());
///
/// assert!(limiter.try_acquire_one());
/// assert!(limiter.try_acquire(1));
/// assert!(!limiter.try_acquire_one());
/// ```
pub trait RateLimitCore: Send + Sync {
    /// Attempts to admit `tokens` units of work at the limiter clock's current instant.
    ///
    /// A request for zero tokens is always admitted and changes nothing.
    fn try_acquire(&self, tokens: Uint) -> bool;

    /// Attempts to admit a single unit of work.
    #[inline]
    fn try_acquire_one(&self) -> bool {
        self.try_acquire(1)
    }

    /// Returns how many more units would be admitted right now.
    ///
    /// This is a read-only view: it accounts for elapsed time (leaks, refills,
    /// window slides) without persisting any of it.
    fn capacity_remaining(&self) -> Uint;

    /// Stops any background timer owned by the limiter.
    ///
    /// Idempotent. Limiters without a background timer do nothing.
    fn shutdown(&self) {}
}
