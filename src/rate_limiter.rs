//! The capability every limiter shares, and constructors returning it.
//!
//! All eight variants (four algorithms, each local or remote) answer the same
//! four questions, so call sites can hold a `Box<dyn Limiter>` and stay
//! agnostic of both the algorithm and where its state lives.

use std::time::Duration;

use crate::{
    FixedWindowLimiter, LeakyBucketLimiter, Remote, SlidingWindowLimiter, TokenBucketLimiter,
    TollgateError,
};

/// Admission control capability.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tollgate::{Limiter, MemoryStore, Remote, RemoteOptions};
///
/// let remote = Remote::new(RemoteOptions::new(Arc::new(MemoryStore::new())));
///
/// let limiter = tollgate::token_bucket(10, 5).attach_remote(&remote, "login");
///
/// if limiter.allow() {
///     // proceed
/// }
/// assert!(limiter.last_error().is_none());
/// ```
pub trait Limiter: Send + Sync {
    /// Admit a single unit. Same as `allow_n(1)`.
    fn allow(&self) -> bool {
        self.allow_n(1)
    }

    /// Admit `n` units at once, or none of them.
    ///
    /// The answer is only meaningful while [`Limiter::last_error`] is `None`.
    fn allow_n(&self, n: u64) -> bool;

    /// Move every future decision to the shared store behind `remote`, under `name`.
    ///
    /// Returns the limiter so construction can be chained.
    fn attach_remote(self: Box<Self>, remote: &Remote, name: &str) -> Box<dyn Limiter>;

    /// The configuration error, if any, otherwise the last backend error.
    fn last_error(&self) -> Option<TollgateError>;
}

/// A fixed window admitting `limit` units per `interval`.
pub fn fixed_window(interval: Duration, limit: u64) -> Box<dyn Limiter> {
    Box::new(FixedWindowLimiter::new(interval, limit))
}

/// A sliding window admitting `limit` units per trailing `interval`, split into `slots`.
pub fn sliding_window(interval: Duration, limit: u64, slots: u64) -> Box<dyn Limiter> {
    Box::new(SlidingWindowLimiter::new(interval, limit, slots))
}

/// A leaky bucket of `capacity` units draining `rate` units per second.
pub fn leaky_bucket(capacity: u64, rate: u64) -> Box<dyn Limiter> {
    Box::new(LeakyBucketLimiter::new(capacity, rate))
}

/// A token bucket of `capacity` tokens refilling `rate` tokens per second.
pub fn token_bucket(capacity: u64, rate: u64) -> Box<dyn Limiter> {
    Box::new(TokenBucketLimiter::new(capacity, rate))
}
