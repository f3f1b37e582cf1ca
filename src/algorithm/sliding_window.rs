use std::time::Duration;

use crate::{AlgorithmKind, BackendError, ConfigError, IntervalMs, Limit, SlotCount, Throttle};

use super::{Algorithm, expect_args, from_arg, invalid, sealed, to_arg};

/// Parameters of a sliding window: `limit` units per trailing `interval`,
/// tracked in `slots` sub-windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindowParams {
    pub(crate) interval_ms: IntervalMs,
    pub(crate) limit: Limit,
    pub(crate) slots: SlotCount,
    pub(crate) slot_width_ms: u64,
}

impl SlidingWindowParams {
    /// Validate an interval (must exceed 100ms), a limit (at least 1) and a
    /// slot count (in `(1, 100]`).
    pub fn new(interval: Duration, limit: u64, slots: u64) -> Result<Self, ConfigError> {
        let interval_ms = IntervalMs::try_from(interval)?;
        let limit = Limit::try_from(limit)?;
        let slots = SlotCount::try_from(slots)?;

        Ok(Self {
            interval_ms,
            limit,
            slots,
            slot_width_ms: *interval_ms / *slots,
        })
    }

    /// Window length in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        *self.interval_ms
    }

    /// Units admitted per trailing window.
    pub fn limit(&self) -> u64 {
        *self.limit
    }

    /// Number of sub-windows.
    pub fn slots(&self) -> u64 {
        *self.slots
    }

    /// Width of one sub-window in milliseconds (`interval / slots`, rounded down).
    pub fn slot_width_ms(&self) -> u64 {
        self.slot_width_ms
    }
}

/// One sub-window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slot {
    pub(crate) last_touched_ms: i64,
    pub(crate) count: u64,
}

impl Slot {
    /// Last time this slot was selected (Unix ms).
    pub fn last_touched_ms(&self) -> i64 {
        self.last_touched_ms
    }

    /// Units recorded in this slot. Only meaningful while the slot is fresh.
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Sliding window state: a ring of slots anchored at `window_start_ms`.
///
/// The current slot is `floor((now - window_start) / slot_width) mod slots`.
/// A slot whose last touch predates the start of its current cycle is reset
/// when selected; every other stale slot is ignored by the sum rather than
/// cleared. Only slots touched within the trailing interval count toward the
/// limit, so the approximation error is bounded by one slot width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidingWindow {
    pub(crate) window_start_ms: i64,
    pub(crate) slots: Vec<Slot>,
}

impl SlidingWindow {
    /// When the ring was anchored (Unix ms).
    pub fn window_start_ms(&self) -> i64 {
        self.window_start_ms
    }

    /// The slots, in ring order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Units counted toward the limit at `now_ms`.
    pub fn in_window(&self, params: &SlidingWindowParams, now_ms: i64) -> u64 {
        let horizon_ms = now_ms.saturating_sub(to_arg(*params.interval_ms));

        self.slots
            .iter()
            .filter(|slot| slot.last_touched_ms >= horizon_ms)
            .fold(0u64, |sum, slot| sum.saturating_add(slot.count))
    }
}

impl sealed::Sealed for SlidingWindow {}

impl Algorithm for SlidingWindow {
    type Params = SlidingWindowParams;

    const KIND: AlgorithmKind = AlgorithmKind::SlidingWindow;

    fn initial(params: &Self::Params, now_ms: i64) -> Self {
        Self {
            window_start_ms: now_ms,
            slots: vec![Slot::default(); *params.slots as usize],
        }
    }

    fn try_admit(&mut self, params: &Self::Params, now_ms: i64, n: u64) -> bool {
        let slot_count = *params.slots as usize;
        if self.slots.len() != slot_count {
            self.slots.resize(slot_count, Slot::default());
        }

        let slot_width_ms = to_arg(params.slot_width_ms);
        let elapsed_ms = now_ms.saturating_sub(self.window_start_ms).max(0);
        let absolute_slot = elapsed_ms / slot_width_ms;
        let index = (absolute_slot % slot_count as i64) as usize;
        let slot_start_ms = self
            .window_start_ms
            .saturating_add(absolute_slot.saturating_mul(slot_width_ms));

        let slot = &mut self.slots[index];
        if slot.last_touched_ms < slot_start_ms {
            // left over from an earlier cycle of the ring
            slot.count = 0;
        }
        slot.last_touched_ms = slot.last_touched_ms.max(now_ms);

        match self.in_window(params, now_ms).checked_add(n) {
            Some(total) if total <= *params.limit => {
                self.slots[index].count += n;
                true
            }
            _ => false,
        }
    }

    fn script_args(params: &Self::Params, n: u64) -> Vec<i64> {
        vec![
            to_arg(*params.slots),
            to_arg(*params.interval_ms),
            to_arg(params.slot_width_ms),
            to_arg(*params.limit),
            to_arg(n),
        ]
    }

    fn from_script_args(args: &[i64]) -> Result<(Self::Params, u64), BackendError> {
        let [slots, interval_ms, slot_width_ms, limit, n] = expect_args::<5>(args)?;

        let slot_width_ms = from_arg(slot_width_ms)?;
        if slot_width_ms == 0 {
            return Err(BackendError::InvalidArguments(
                "slot width must be greater than 0".to_string(),
            ));
        }

        let params = SlidingWindowParams {
            interval_ms: IntervalMs::try_from(from_arg(interval_ms)?).map_err(invalid)?,
            limit: Limit::try_from(from_arg(limit)?).map_err(invalid)?,
            slots: SlotCount::try_from(from_arg(slots)?).map_err(invalid)?,
            slot_width_ms,
        };

        Ok((params, from_arg(n)?))
    }
}

/// Sliding window limiter: at most `limit` units in any trailing `interval`,
/// approximated with a fixed number of sub-window counters.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tollgate::{SlidingWindowLimiter, SlotCount};
///
/// let limiter = SlidingWindowLimiter::new(Duration::from_secs(1), 3, *SlotCount::default());
///
/// assert!(limiter.allow_n(3));
/// assert!(!limiter.allow());
/// ```
pub type SlidingWindowLimiter = Throttle<SlidingWindow>;

impl Throttle<SlidingWindow> {
    /// Create a sliding window limiter split into `slots` sub-windows.
    ///
    /// Invalid parameters do not panic: the limiter is returned with a
    /// [`ConfigError`] in its error slot and denies every call.
    pub fn new(interval: Duration, limit: u64, slots: u64) -> Self {
        Self::from_params(SlidingWindowParams::new(interval, limit, slots))
    }
}
