use crate::{AlgorithmKind, BackendError, Throttle};

use super::{Algorithm, BucketParams, sealed};

/// Leaky bucket state: queued volume and when it last drained.
///
/// Time is tracked in whole seconds. Each call drains
/// `elapsed_seconds * rate` units (never below zero), then admits `n` if the
/// bucket still has room for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakyBucket {
    pub(crate) last_time_s: i64,
    pub(crate) level: u64,
}

impl LeakyBucket {
    /// When the bucket last drained (Unix seconds).
    pub fn last_time_s(&self) -> i64 {
        self.last_time_s
    }

    /// Volume currently in the bucket.
    pub fn level(&self) -> u64 {
        self.level
    }
}

impl sealed::Sealed for LeakyBucket {}

impl Algorithm for LeakyBucket {
    type Params = BucketParams;

    const KIND: AlgorithmKind = AlgorithmKind::LeakyBucket;

    fn initial(_params: &Self::Params, now_ms: i64) -> Self {
        Self {
            last_time_s: now_ms.div_euclid(1000),
            level: 0,
        }
    }

    fn try_admit(&mut self, params: &Self::Params, now_ms: i64, n: u64) -> bool {
        let now_s = now_ms.div_euclid(1000);
        let elapsed_s = now_s.saturating_sub(self.last_time_s).max(0) as u64;

        let outflow = elapsed_s.saturating_mul(*params.rate);
        self.level = self.level.saturating_sub(outflow);
        self.last_time_s = self.last_time_s.max(now_s);

        match self.level.checked_add(n) {
            Some(level) if level <= *params.capacity => {
                self.level = level;
                true
            }
            _ => false,
        }
    }

    fn script_args(params: &Self::Params, n: u64) -> Vec<i64> {
        params.script_args(n)
    }

    fn from_script_args(args: &[i64]) -> Result<(Self::Params, u64), BackendError> {
        BucketParams::from_script_args(args)
    }
}

/// Leaky bucket limiter: admitted volume drains at `rate` units per second
/// and may never exceed `capacity`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tollgate::{LeakyBucketLimiter, ManualClock};
///
/// let clock = ManualClock::new(0);
/// let limiter = LeakyBucketLimiter::new(4, 2).with_clock(clock.clone());
///
/// assert!(limiter.allow_n(4));
/// assert!(!limiter.allow());
///
/// clock.advance(Duration::from_secs(1));
/// assert!(limiter.allow_n(2));
/// assert!(!limiter.allow());
/// ```
pub type LeakyBucketLimiter = Throttle<LeakyBucket>;

impl Throttle<LeakyBucket> {
    /// Create a leaky bucket holding `capacity` units and draining `rate` per second.
    ///
    /// Invalid parameters do not panic: the limiter is returned with a
    /// [`ConfigError`](crate::ConfigError) in its error slot and denies every call.
    pub fn new(capacity: u64, rate: u64) -> Self {
        Self::from_params(BucketParams::new(capacity, rate))
    }
}
