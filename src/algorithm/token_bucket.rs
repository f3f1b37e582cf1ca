use crate::{AlgorithmKind, BackendError, Throttle};

use super::{Algorithm, BucketParams, sealed};

/// Token bucket state: available credit and when it last refilled.
///
/// Starts full. Each call adds `elapsed_seconds * rate` tokens (capped at
/// capacity), then spends `n` if that many are available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBucket {
    pub(crate) last_time_s: i64,
    pub(crate) tokens: u64,
}

impl TokenBucket {
    /// When the bucket last refilled (Unix seconds).
    pub fn last_time_s(&self) -> i64 {
        self.last_time_s
    }

    /// Tokens currently available.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }
}

impl sealed::Sealed for TokenBucket {}

impl Algorithm for TokenBucket {
    type Params = BucketParams;

    const KIND: AlgorithmKind = AlgorithmKind::TokenBucket;

    fn initial(params: &Self::Params, now_ms: i64) -> Self {
        Self {
            last_time_s: now_ms.div_euclid(1000),
            tokens: *params.capacity,
        }
    }

    fn try_admit(&mut self, params: &Self::Params, now_ms: i64, n: u64) -> bool {
        let now_s = now_ms.div_euclid(1000);
        let elapsed_s = now_s.saturating_sub(self.last_time_s).max(0) as u64;

        let refill = elapsed_s.saturating_mul(*params.rate);
        self.tokens = self.tokens.saturating_add(refill).min(*params.capacity);
        self.last_time_s = self.last_time_s.max(now_s);

        match self.tokens.checked_sub(n) {
            Some(tokens) => {
                self.tokens = tokens;
                true
            }
            None => false,
        }
    }

    fn script_args(params: &Self::Params, n: u64) -> Vec<i64> {
        params.script_args(n)
    }

    fn from_script_args(args: &[i64]) -> Result<(Self::Params, u64), BackendError> {
        BucketParams::from_script_args(args)
    }
}

/// Token bucket limiter: bursts up to `capacity`, sustained `rate` units per second.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tollgate::{TokenBucketLimiter, ManualClock};
///
/// let clock = ManualClock::new(0);
/// let limiter = TokenBucketLimiter::new(4, 2).with_clock(clock.clone());
///
/// assert!(limiter.allow_n(4));
/// assert!(!limiter.allow());
///
/// clock.advance(Duration::from_secs(1));
/// assert!(limiter.allow_n(2));
/// assert!(!limiter.allow());
/// ```
pub type TokenBucketLimiter = Throttle<TokenBucket>;

impl Throttle<TokenBucket> {
    /// Create a token bucket holding `capacity` tokens and refilling `rate` per second.
    ///
    /// Invalid parameters do not panic: the limiter is returned with a
    /// [`ConfigError`](crate::ConfigError) in its error slot and denies every call.
    pub fn new(capacity: u64, rate: u64) -> Self {
        Self::from_params(BucketParams::new(capacity, rate))
    }
}
