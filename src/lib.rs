//! A thread-safe admission control library for Rust applications.
//!
//! Each limiter guards one throughput budget and answers, per unit of work,
//! whether it may proceed. Rejection is an ordinary `false`, never an error.
//! All implementations are safe to share across threads.
//!
//! # Quick Start
//!
//! ```rust
//! use rate_gate_core::cores::{TokenBucketCore, TokenBucketCoreConfig};
//!
//! // Capacity 100, refilling 10 tokens every 100ms
//! let limiter = TokenBucketCore::new(TokenBucketCoreConfig::new(100, 100, Some(10))).unwrap();
//!
//! if limiter.try_acquire(20) {
//!     println!("Request allowed");
//! } else {
//!     println!("Request denied");
//! }
//! ```
//!
//! # Available Algorithms
//!
//! ## [Fixed Window](cores::FixedWindowCore)
//! One counter per window, reset when the window expires:
//! ```rust
//! # use rate_gate_core::cores::{FixedWindowCore, FixedWindowCoreConfig};
//! let limiter = FixedWindowCore::new(FixedWindowCoreConfig::new(100, 1000)).unwrap(); // 100 per second
//! ```
//!
//! ## [Sliding Window, map](cores::SlidingWindowMapCore) and [ring](cores::SlidingWindowRingCore)
//! Counts the last window as a set of sub-windows:
//! ```rust
//! # use rate_gate_core::cores::*;
//! let map = SlidingWindowMapCore::new(SlidingWindowMapCoreConfig::new(100, 10, 50)).unwrap();
//! let ring = SlidingWindowRingCore::new(SlidingWindowRingCoreConfig::new(1000, 50, 10)).unwrap();
//! ```
//!
//! ## [Leaky Bucket](cores::LeakyBucketCore) and [Leaky Queue](cores::LeakyQueueCore)
//! Bound the backlog, or queue work and release it at a steady cadence:
//! ```rust
//! # use rate_gate_core::cores::*;
//! let bucket = LeakyBucketCore::new(LeakyBucketCoreConfig::new(10, 1)).unwrap();
//! let queue = LeakyQueueCore::<String>::new(LeakyQueueCoreConfig::new(5, 2), |job: String| println!("{}", job)).unwrap();
//! ```
//!
//! ## [Token Bucket](cores::TokenBucketCore) and [Ticking Token Bucket](cores::TickingTokenBucketCore)
//! Allow bursts up to capacity, refilled lazily or by a background timer:
//! ```rust
//! # use rate_gate_core::cores::*;
//! let lazy = TokenBucketCore::new(TokenBucketCoreConfig::new(5, 500, None)).unwrap();
//! let ticking = TickingTokenBucketCore::new(TickingTokenBucketCoreConfig::new(5, 2)).unwrap();
//! ```
//!
//! # Core Concepts
//!
//! ## Time Representation
//! Clock-driven cores read milliseconds from an injectable [`Clock`]. Each also
//! offers a `*_at(tick, ..)` entry point taking the instant explicitly, which is
//! convenient when the caller already has a timestamp.
//!
//! ## Uniform Interface
//! Every core implements [`RateLimitCore`], so callers can hold a
//! `Box<dyn RateLimitCore>` built from a [`LimiterConfig`](config::LimiterConfig).
//!
//! ## Background Timers
//! [`LeakyQueueCore`](cores::LeakyQueueCore) and
//! [`TickingTokenBucketCore`](cores::TickingTokenBucketCore) own one timer
//! thread each. It stops on `shutdown()` or when the limiter is dropped.
//!
//! # Algorithm Selection Guide
//!
//! - **Steady processing rate**: [`LeakyQueueCore`](cores::LeakyQueueCore)
//! - **Bounded backlog, bursts allowed**: [`LeakyBucketCore`](cores::LeakyBucketCore)
//! - **Controlled bursts**: [`TokenBucketCore`](cores::TokenBucketCore)
//! - **Simplest counting**: [`FixedWindowCore`](cores::FixedWindowCore)
//! - **No boundary bursts**: [`SlidingWindowRingCore`](cores::SlidingWindowRingCore)

pub mod clock;
pub mod config;
pub mod cores;
pub mod error;
pub mod rate_limit;
mod ticker;
pub mod types;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{ConfigError, LimiterError};
pub use rate_limit::RateLimitCore;
pub use types::Uint;
