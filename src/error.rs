/// Error type for this crate.
///
/// Limiters never return this from a decision. It is recorded in the limiter's
/// error slot and read back through [`Limiter::last_error`](crate::Limiter::last_error).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TollgateError {
    /// Invalid construction parameters. Sticky for the lifetime of the limiter.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The shared store could not produce a decision. Cleared by the next successful call.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl TollgateError {
    /// Whether this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Whether this is a backend error.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// Invalid construction parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The time interval must be strictly greater than 100ms.
    #[error("time interval must be greater than 100ms, got {0}ms")]
    IntervalTooSmall(u64),
    /// The limit must be at least 1.
    #[error("limit must be at least 1")]
    LimitTooSmall,
    /// The sliding window slot count must be in `(1, 100]`.
    #[error("slot count must be greater than 1 and at most 100, got {0}")]
    InvalidSlotCount(u64),
    /// The bucket capacity must be at least 1.
    #[error("capacity must be at least 1")]
    CapacityTooSmall,
    /// The bucket rate must be at least 1.
    #[error("rate must be at least 1")]
    RateTooSmall,
    /// The bucket capacity must not be smaller than its rate.
    #[error("capacity {capacity} must not be less than rate {rate}")]
    CapacityLessThanRate {
        /// Configured capacity.
        capacity: u64,
        /// Configured rate.
        rate: u64,
    },
    /// The remote key name is not usable as a store key segment.
    #[error("invalid remote key: {0}")]
    InvalidRemoteKey(String),
    /// Key TTLs must be non-zero.
    #[error("key ttl must be greater than 0")]
    InvalidKeyTtl,
    /// A store needs at least one connection.
    #[error("connection count must be greater than 0")]
    InvalidConnectionCount,
}

/// Failure to evaluate a decision against the shared store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The store did not answer within the configured timeout.
    #[error("store call timed out")]
    Timeout,
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The store rejected or failed the script.
    #[error("script evaluation failed: {0}")]
    Script(String),
    /// The script returned something other than `0` or `1`.
    #[error("unexpected script result: {0}")]
    UnexpectedResult(i64),
    /// The script arguments did not match the script's signature.
    #[error("invalid script arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Script(err.to_string())
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for TollgateError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.into())
    }
}
