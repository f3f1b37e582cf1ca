//! The four admission state machines.
//!
//! Each algorithm is a plain state record plus a pure transition
//! `(state, params, now, n) -> admitted`. The same transition runs behind the
//! local mutex, inside [`MemoryStore`](crate::MemoryStore), and (as Lua) inside
//! Redis, so every execution path reaches the same decision for the same
//! inputs.
//!
//! - [`FixedWindow`]: one counter per window
//! - [`SlidingWindow`]: a ring of sub-window counters
//! - [`LeakyBucket`]: load drains at a fixed rate
//! - [`TokenBucket`]: credit refills at a fixed rate

use std::fmt::Debug;

use crate::{AlgorithmKind, BackendError, Capacity, ConfigError, Rate};

mod fixed_window;
pub use fixed_window::*;

mod sliding_window;
pub use sliding_window::*;

mod leaky_bucket;
pub use leaky_bucket::*;

mod token_bucket;
pub use token_bucket::*;

mod sealed {
    pub trait Sealed {}
}

/// A throttling algorithm: its validated parameters, its state and its transition.
///
/// This trait is sealed; the four implementations live in this module.
pub trait Algorithm: sealed::Sealed + Debug + Clone + Send + Sync + 'static {
    /// Validated construction parameters.
    type Params: Debug + Clone + Send + Sync;

    /// Tag naming this algorithm's store script and key namespace.
    const KIND: AlgorithmKind;

    /// Neutral starting state at `now_ms`.
    fn initial(params: &Self::Params, now_ms: i64) -> Self;

    /// Advance the state to `now_ms` and try to admit `n` units.
    ///
    /// On admission the state records `n`; otherwise only the time-based
    /// update is kept.
    fn try_admit(&mut self, params: &Self::Params, now_ms: i64, n: u64) -> bool;

    /// Arguments passed to the store script, in script order.
    fn script_args(params: &Self::Params, n: u64) -> Vec<i64>;

    /// Inverse of [`Algorithm::script_args`], used by stores that evaluate
    /// transitions natively.
    fn from_script_args(args: &[i64]) -> Result<(Self::Params, u64), BackendError>;
}

/// Validated parameters shared by the leaky bucket and the token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketParams {
    pub(crate) capacity: Capacity,
    pub(crate) rate: Rate,
}

impl BucketParams {
    /// Validate `capacity` and `rate` (units per second).
    ///
    /// Checks run in order capacity, rate, `capacity >= rate`; the first
    /// failure is reported.
    pub fn new(capacity: u64, rate: u64) -> Result<Self, ConfigError> {
        let capacity = Capacity::try_from(capacity)?;
        let rate = Rate::try_from(rate)?;

        if *capacity < *rate {
            return Err(ConfigError::CapacityLessThanRate {
                capacity: *capacity,
                rate: *rate,
            });
        }

        Ok(Self { capacity, rate })
    }

    /// Bucket capacity.
    pub fn capacity(&self) -> u64 {
        *self.capacity
    }

    /// Units per second.
    pub fn rate(&self) -> u64 {
        *self.rate
    }

    fn script_args(&self, n: u64) -> Vec<i64> {
        vec![to_arg(*self.capacity), to_arg(*self.rate), to_arg(n)]
    }

    fn from_script_args(args: &[i64]) -> Result<(Self, u64), BackendError> {
        let [capacity, rate, n] = expect_args::<3>(args)?;
        let params = Self::new(from_arg(capacity)?, from_arg(rate)?).map_err(invalid)?;

        Ok((params, from_arg(n)?))
    }
}

/// Script arguments travel as signed integers; anything past `i64::MAX`
/// saturates, which can only ever be denied.
pub(crate) fn to_arg(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_arg(value: i64) -> Result<u64, BackendError> {
    u64::try_from(value)
        .map_err(|_| BackendError::InvalidArguments(format!("negative argument {value}")))
}

fn expect_args<const N: usize>(args: &[i64]) -> Result<[i64; N], BackendError> {
    <[i64; N]>::try_from(args).map_err(|_| {
        BackendError::InvalidArguments(format!("expected {N} arguments, got {}", args.len()))
    })
}

fn invalid(err: ConfigError) -> BackendError {
    BackendError::InvalidArguments(err.to_string())
}
