use std::sync::Arc;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use rate_gate_core::clock::ManualClock;
use rate_gate_core::cores::*;
use rate_gate_core::Uint;

/// Request sequences as (milliseconds since previous request, tokens).
fn requests() -> impl Strategy<Value = Vec<(Uint, Uint)>> {
    prop::collection::vec((0u64..250, 0u64..6), 1..200).prop_map(|requests| {
        requests
            .into_iter()
            .map(|(delta, tokens)| (delta as Uint, tokens as Uint))
            .collect()
    })
}

fn clock_at_zero() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(0))
}

/// Tokens admitted at or after `floor`.
fn admitted_since(log: &[(Uint, Uint)], floor: Uint) -> Uint {
    log.iter().filter(|(tick, _)| *tick >= floor).map(|(_, tokens)| *tokens).sum()
}

/// Start of the oldest sub-window still counted at `tick`, for windows aligned to 0.
fn window_floor(tick: Uint, sub: Uint, count: Uint) -> Uint {
    (tick - tick % sub).saturating_sub((count - 1) * sub)
}

/// A request is admitted exactly when it fits in the remaining capacity, and a
/// rejected request leaves that capacity unchanged.
fn check_admission_matches_remaining(
    requests: Vec<(Uint, Uint)>,
    acquire: impl Fn(Uint, Uint) -> bool,
    remaining: impl Fn(Uint) -> Uint,
) -> Result<(), TestCaseError> {
    let mut tick: Uint = 0;
    for (delta, tokens) in requests {
        tick += delta;
        let before = remaining(tick);
        let admitted = acquire(tick, tokens);
        prop_assert_eq!(admitted, tokens <= before);
        if !admitted {
            prop_assert_eq!(remaining(tick), before);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn sliding_map_never_exceeds_threshold(
        sub in 1u64..100,
        count in 1u64..10,
        threshold in 1u64..20,
        requests in requests(),
    ) {
        let (sub, count, threshold) = (sub as Uint, count as Uint, threshold as Uint);
        let limiter = SlidingWindowMapCore::with_clock(
            SlidingWindowMapCoreConfig::new(sub, count, threshold),
            clock_at_zero(),
        )
        .unwrap();

        let mut tick: Uint = 0;
        let mut log = Vec::new();
        for (delta, tokens) in requests {
            tick += delta;
            if limiter.try_acquire_at(tick, tokens) {
                log.push((tick, tokens));
            }
            prop_assert!(admitted_since(&log, window_floor(tick, sub, count)) <= threshold);
            prop_assert!(limiter.bucket_count() as Uint <= count);
        }
    }

    #[test]
    fn sliding_ring_never_exceeds_limit(
        sub in 1u64..100,
        count in 1u64..10,
        limit in 1u64..20,
        requests in requests(),
    ) {
        let (sub, count, limit) = (sub as Uint, count as Uint, limit as Uint);
        let limiter = SlidingWindowRingCore::with_clock(
            SlidingWindowRingCoreConfig::new(sub * count, limit, count),
            clock_at_zero(),
        )
        .unwrap();

        let mut tick: Uint = 0;
        let mut log = Vec::new();
        for (delta, tokens) in requests {
            tick += delta;
            if limiter.try_acquire_at(tick, tokens) {
                log.push((tick, tokens));
            }
            prop_assert!(admitted_since(&log, window_floor(tick, sub, count)) <= limit);
        }
    }

    #[test]
    fn ring_and_map_agree_on_aligned_windows(
        sub in 1u64..100,
        count in 1u64..10,
        limit in 1u64..20,
        requests in requests(),
    ) {
        let (sub, count, limit) = (sub as Uint, count as Uint, limit as Uint);
        let map = SlidingWindowMapCore::with_clock(
            SlidingWindowMapCoreConfig::new(sub, count, limit),
            clock_at_zero(),
        )
        .unwrap();
        let ring = SlidingWindowRingCore::with_clock(
            SlidingWindowRingCoreConfig::new(sub * count, limit, count),
            clock_at_zero(),
        )
        .unwrap();

        let mut tick: Uint = 0;
        for (delta, tokens) in requests {
            tick += delta;
            prop_assert_eq!(map.try_acquire_at(tick, tokens), ring.try_acquire_at(tick, tokens));
        }
    }

    #[test]
    fn leaky_bucket_water_bounded_and_draining(
        capacity in 1u64..50,
        rate in 1u64..2000,
        requests in requests(),
    ) {
        let capacity = capacity as Uint;
        let bucket = LeakyBucketCore::with_clock(
            LeakyBucketCoreConfig::new(capacity, rate as Uint),
            clock_at_zero(),
        )
        .unwrap();

        let mut tick: Uint = 0;
        for (delta, tokens) in requests {
            tick += delta;
            bucket.try_consume_at(tick, tokens);
            let water = bucket.water_at(tick);
            prop_assert!(water <= capacity);
            // Without new water the level only goes down
            prop_assert!(bucket.water_at(tick + delta) <= water);
        }
    }

    #[test]
    fn token_bucket_never_exceeds_capacity(
        capacity in 1u64..50,
        interval in 1u64..500,
        avg in prop::option::of(1u64..20),
        requests in requests(),
    ) {
        let capacity = capacity as Uint;
        let bucket = TokenBucketCore::with_clock(
            TokenBucketCoreConfig::new(capacity, interval as Uint, avg.map(|avg| avg as Uint)),
            clock_at_zero(),
        )
        .unwrap();

        let mut tick: Uint = 0;
        for (delta, tokens) in requests {
            tick += delta;
            bucket.try_acquire_at(tick, tokens);
            prop_assert!(bucket.current_tokens() <= capacity);
            prop_assert!(bucket.tokens_at(tick + 1_000_000) <= capacity);
        }
    }

    #[test]
    fn fixed_window_admission_matches_remaining(
        threshold in 1u64..20,
        window in 1u64..500,
        requests in requests(),
    ) {
        let limiter = FixedWindowCore::with_clock(
            FixedWindowCoreConfig::new(threshold as Uint, window as Uint),
            clock_at_zero(),
        )
        .unwrap();
        check_admission_matches_remaining(
            requests,
            |tick, tokens| limiter.try_acquire_at(tick, tokens),
            |tick| limiter.capacity_remaining_at(tick),
        )?;
    }

    #[test]
    fn sliding_map_admission_matches_remaining(
        sub in 1u64..100,
        count in 1u64..10,
        threshold in 1u64..20,
        requests in requests(),
    ) {
        let limiter = SlidingWindowMapCore::with_clock(
            SlidingWindowMapCoreConfig::new(sub as Uint, count as Uint, threshold as Uint),
            clock_at_zero(),
        )
        .unwrap();
        check_admission_matches_remaining(
            requests,
            |tick, tokens| limiter.try_acquire_at(tick, tokens),
            |tick| limiter.capacity_remaining_at(tick),
        )?;
    }

    #[test]
    fn sliding_ring_admission_matches_remaining(
        window in 1u64..1000,
        count in 1u64..10,
        limit in 1u64..20,
        requests in requests(),
    ) {
        prop_assume!(window >= count);
        let limiter = SlidingWindowRingCore::with_clock(
            SlidingWindowRingCoreConfig::new(window as Uint, limit as Uint, count as Uint),
            clock_at_zero(),
        )
        .unwrap();
        check_admission_matches_remaining(
            requests,
            |tick, tokens| limiter.try_acquire_at(tick, tokens),
            |tick| limiter.capacity_remaining_at(tick),
        )?;
    }

    #[test]
    fn leaky_bucket_admission_matches_remaining(
        capacity in 1u64..50,
        rate in 1u64..2000,
        requests in requests(),
    ) {
        let capacity = capacity as Uint;
        let bucket = LeakyBucketCore::with_clock(
            LeakyBucketCoreConfig::new(capacity, rate as Uint),
            clock_at_zero(),
        )
        .unwrap();
        check_admission_matches_remaining(
            requests,
            |tick, tokens| bucket.try_consume_at(tick, tokens),
            |tick| capacity - bucket.water_at(tick),
        )?;
    }

    #[test]
    fn token_bucket_admission_matches_remaining(
        capacity in 1u64..50,
        interval in 1u64..500,
        avg in prop::option::of(1u64..20),
        requests in requests(),
    ) {
        let bucket = TokenBucketCore::with_clock(
            TokenBucketCoreConfig::new(capacity as Uint, interval as Uint, avg.map(|avg| avg as Uint)),
            clock_at_zero(),
        )
        .unwrap();
        check_admission_matches_remaining(
            requests,
            |tick, tokens| bucket.try_acquire_at(tick, tokens),
            |tick| bucket.tokens_at(tick),
        )?;
    }
}
