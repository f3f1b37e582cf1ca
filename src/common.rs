use std::{fmt, ops::Deref, time::Duration};

use crate::ConfigError;

/// Window length in milliseconds. Must be greater than 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IntervalMs(u64);

impl Deref for IntervalMs {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for IntervalMs {
    type Error = ConfigError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value <= 100 {
            Err(ConfigError::IntervalTooSmall(value))
        } else {
            Ok(Self(value))
        }
    }
}

impl TryFrom<Duration> for IntervalMs {
    type Error = ConfigError;

    /// A sub-millisecond remainder rounds up, so any duration over 100ms is accepted.
    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        let whole_ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);

        if value <= Duration::from_millis(100) {
            return Err(ConfigError::IntervalTooSmall(whole_ms));
        }

        let ms = if value.subsec_nanos() % 1_000_000 == 0 {
            whole_ms
        } else {
            whole_ms.saturating_add(1)
        };

        Self::try_from(ms)
    }
}

/// Maximum admitted volume per window. Must be at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Limit(u64);

impl Deref for Limit {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for Limit {
    type Error = ConfigError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value < 1 {
            Err(ConfigError::LimitTooSmall)
        } else {
            Ok(Self(value))
        }
    }
}

/// Number of sub-windows a sliding window is split into.
///
/// Valid range is `(1, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotCount(u64);

impl Default for SlotCount {
    /// Returns 10 slots.
    fn default() -> Self {
        Self(10)
    }
}

impl Deref for SlotCount {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for SlotCount {
    type Error = ConfigError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value <= 1 || value > 100 {
            Err(ConfigError::InvalidSlotCount(value))
        } else {
            Ok(Self(value))
        }
    }
}

/// Bucket size. Must be at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Capacity(u64);

impl Deref for Capacity {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for Capacity {
    type Error = ConfigError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value < 1 {
            Err(ConfigError::CapacityTooSmall)
        } else {
            Ok(Self(value))
        }
    }
}

/// Units drained or refilled per second. Must be at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rate(u64);

impl Deref for Rate {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for Rate {
    type Error = ConfigError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value < 1 {
            Err(ConfigError::RateTooSmall)
        } else {
            Ok(Self(value))
        }
    }
}

/// How long a remote key survives without a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyTtl(Duration);

impl Default for KeyTtl {
    /// Returns 10 minutes.
    fn default() -> Self {
        Self(Duration::from_secs(600))
    }
}

impl Deref for KeyTtl {
    type Target = Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<Duration> for KeyTtl {
    type Error = ConfigError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        if value.is_zero() {
            Err(ConfigError::InvalidKeyTtl)
        } else {
            Ok(Self(value))
        }
    }
}

/// Algorithm tag, used to namespace remote keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    /// Fixed window counter.
    FixedWindow,
    /// Sliding window of sub-window counters.
    SlidingWindow,
    /// Leaky bucket.
    LeakyBucket,
    /// Token bucket.
    TokenBucket,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmKind::FixedWindow => write!(f, "fw"),
            AlgorithmKind::SlidingWindow => write!(f, "sw"),
            AlgorithmKind::LeakyBucket => write!(f, "lb"),
            AlgorithmKind::TokenBucket => write!(f, "tb"),
        }
    }
}
