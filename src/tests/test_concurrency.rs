use std::{
    sync::atomic::{AtomicU64, Ordering},
    thread,
};

use crate::{
    FixedWindowLimiter, Limiter, SlidingWindowLimiter, TokenBucketLimiter,
    tests::common::{clock, memory_remote, secs},
};

const THREADS: u64 = 8;
const CALLS_PER_THREAD: u64 = 50;

/// Hammers `limiter` from several threads with a frozen clock and returns how
/// many calls were admitted.
fn admitted_under_contention(limiter: &dyn Limiter) -> u64 {
    let admitted = AtomicU64::new(0);

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..CALLS_PER_THREAD {
                    if limiter.allow() {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    admitted.into_inner()
}

#[test]
fn local_limiters_never_over_admit() {
    let clock = clock();

    let fixed = FixedWindowLimiter::new(secs(60), 100).with_clock(clock.clone());
    assert_eq!(admitted_under_contention(&fixed), 100);

    let sliding = SlidingWindowLimiter::new(secs(60), 100, 10).with_clock(clock.clone());
    assert_eq!(admitted_under_contention(&sliding), 100);

    let tokens = TokenBucketLimiter::new(100, 1).with_clock(clock.clone());
    assert_eq!(admitted_under_contention(&tokens), 100);

    let leaky = crate::LeakyBucketLimiter::new(100, 1).with_clock(clock);
    assert_eq!(admitted_under_contention(&leaky), 100);
}

#[test]
fn remote_instances_never_over_admit() {
    let clock = clock();
    let (remote, _store) = memory_remote(&clock);

    let limiters: Vec<_> = (0..THREADS)
        .map(|_| crate::token_bucket(100, 1).attach_remote(&remote, "contended"))
        .collect();
    let admitted = AtomicU64::new(0);

    thread::scope(|scope| {
        for limiter in &limiters {
            let admitted = &admitted;
            scope.spawn(move || {
                for _ in 0..CALLS_PER_THREAD {
                    if limiter.allow() {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(admitted.into_inner(), 100);
    assert!(limiters.iter().all(|limiter| limiter.last_error().is_none()));
}
