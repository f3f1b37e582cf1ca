use std::time::Duration;

use crate::{AlgorithmKind, BackendError, ConfigError, IntervalMs, Limit, Throttle};

use super::{Algorithm, expect_args, from_arg, invalid, sealed, to_arg};

/// Parameters of a fixed window: `limit` units per `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWindowParams {
    pub(crate) interval_ms: IntervalMs,
    pub(crate) limit: Limit,
}

impl FixedWindowParams {
    /// Validate an interval (must exceed 100ms) and a limit (at least 1).
    pub fn new(interval: Duration, limit: u64) -> Result<Self, ConfigError> {
        Ok(Self {
            interval_ms: IntervalMs::try_from(interval)?,
            limit: Limit::try_from(limit)?,
        })
    }

    /// Window length in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        *self.interval_ms
    }

    /// Units admitted per window.
    pub fn limit(&self) -> u64 {
        *self.limit
    }
}

/// Fixed window state: when the current window opened and how much it admitted.
///
/// A window rolls over once `interval` has elapsed since it opened; the first
/// call after that opens a new window at its own timestamp. Bursts straddling
/// the boundary can therefore admit up to twice the limit in a short span,
/// which is inherent to the algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWindow {
    pub(crate) window_start_ms: i64,
    pub(crate) count: u64,
}

impl FixedWindow {
    /// When the current window opened (Unix ms).
    pub fn window_start_ms(&self) -> i64 {
        self.window_start_ms
    }

    /// Units admitted in the current window.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl sealed::Sealed for FixedWindow {}

impl Algorithm for FixedWindow {
    type Params = FixedWindowParams;

    const KIND: AlgorithmKind = AlgorithmKind::FixedWindow;

    fn initial(_params: &Self::Params, now_ms: i64) -> Self {
        Self {
            window_start_ms: now_ms,
            count: 0,
        }
    }

    fn try_admit(&mut self, params: &Self::Params, now_ms: i64, n: u64) -> bool {
        let elapsed_ms = now_ms.saturating_sub(self.window_start_ms);

        if elapsed_ms >= to_arg(*params.interval_ms) {
            self.window_start_ms = now_ms;
            self.count = 0;
        }

        match self.count.checked_add(n) {
            Some(total) if total <= *params.limit => {
                self.count = total;
                true
            }
            _ => false,
        }
    }

    fn script_args(params: &Self::Params, n: u64) -> Vec<i64> {
        vec![to_arg(*params.limit), to_arg(n), to_arg(*params.interval_ms)]
    }

    fn from_script_args(args: &[i64]) -> Result<(Self::Params, u64), BackendError> {
        let [limit, n, interval_ms] = expect_args::<3>(args)?;

        let params = FixedWindowParams {
            interval_ms: IntervalMs::try_from(from_arg(interval_ms)?).map_err(invalid)?,
            limit: Limit::try_from(from_arg(limit)?).map_err(invalid)?,
        };

        Ok((params, from_arg(n)?))
    }
}

/// Fixed window limiter: at most `limit` units per `interval`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tollgate::FixedWindowLimiter;
///
/// let limiter = FixedWindowLimiter::new(Duration::from_secs(1), 2);
///
/// assert!(limiter.allow());
/// assert!(limiter.allow());
/// assert!(!limiter.allow());
/// assert!(limiter.last_error().is_none());
/// ```
pub type FixedWindowLimiter = Throttle<FixedWindow>;

impl Throttle<FixedWindow> {
    /// Create a fixed window limiter.
    ///
    /// Invalid parameters do not panic: the limiter is returned with a
    /// [`ConfigError`] in its error slot and denies every call.
    pub fn new(interval: Duration, limit: u64) -> Self {
        Self::from_params(FixedWindowParams::new(interval, limit))
    }
}
