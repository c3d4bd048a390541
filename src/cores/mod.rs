//! Core admission algorithm implementations.
//!
//! Each core is a thread-safe limiter guarding one budget. Clock-driven cores
//! compute leaks, refills and window slides from elapsed time on every call;
//! the two timer-driven cores own one background thread each.
//!
//! # Available Algorithms
//!
//! - **[`FixedWindowCore`]** - One counter reset every window
//! - **[`SlidingWindowMapCore`]** - Sliding window over buckets keyed by sub-window start
//! - **[`SlidingWindowRingCore`]** - Sliding window over a fixed ring of sub-window slots
//! - **[`LeakyBucketCore`]** - Water level drained virtually from elapsed time
//! - **[`LeakyQueueCore`]** - Bounded queue drained at a fixed cadence by a background loop
//! - **[`TokenBucketCore`]** - Token bucket refilled on demand
//! - **[`TickingTokenBucketCore`]** - Token bucket refilled by a background timer
//!
//! # Algorithm Comparison
//!
//! | Algorithm | Memory | Accuracy | Burst Handling | Background thread |
//! |-----------|--------|----------|----------------|-------------------|
//! | Fixed Window | O(1) | Medium | Up to 2x at boundaries | No |
//! | Sliding Window (map) | O(N) | High | Smooth | No |
//! | Sliding Window (ring) | O(N), fixed | High | Smooth | No |
//! | Leaky Bucket | O(1) | High | Bursts up to capacity | No |
//! | Leaky Queue | O(capacity) | High | Queued, released steadily | Yes |
//! | Token Bucket | O(1) | Interval-grained | Bursts up to capacity | No |
//! | Ticking Token Bucket | O(1) | Tick-grained | Bursts up to capacity | Yes |
//!
//! # Thread Safety
//!
//! Every core guards its state with a single mutex. The advance step (leak,
//! slide, refill) and the admission decision form one critical section, so
//! decisions on one limiter are totally ordered.

pub mod fixed_window_core;
pub use fixed_window_core::FixedWindowCore;
pub use fixed_window_core::FixedWindowCoreConfig;

pub mod sliding_window_map_core;
pub use sliding_window_map_core::SlidingWindowMapCore;
pub use sliding_window_map_core::SlidingWindowMapCoreConfig;

pub mod sliding_window_ring_core;
pub use sliding_window_ring_core::SlidingWindowRingCore;
pub use sliding_window_ring_core::SlidingWindowRingCoreConfig;
pub use sliding_window_ring_core::MAX_SUB_WINDOWS;

pub mod leaky_bucket_core;
pub use leaky_bucket_core::LeakyBucketCore;
pub use leaky_bucket_core::LeakyBucketCoreConfig;

pub mod leaky_queue_core;
pub use leaky_queue_core::Drain;
pub use leaky_queue_core::LeakyQueueCore;
pub use leaky_queue_core::LeakyQueueCoreConfig;

pub mod token_bucket_core;
pub use token_bucket_core::TokenBucketCore;
pub use token_bucket_core::TokenBucketCoreConfig;

pub mod ticking_token_bucket_core;
pub use ticking_token_bucket_core::TickingTokenBucketCore;
pub use ticking_token_bucket_core::TickingTokenBucketCoreConfig;
