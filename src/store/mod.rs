//! Shared state for cross-process limiting.
//!
//! A remote limiter keeps no decision state of its own. Each decision is
//! submitted to an [`AtomicStore`] as one script evaluation: read the record,
//! advance it with the store's clock, decide, write back. The store runs
//! evaluations on the same key one at a time, which is the only cross-process
//! mutual exclusion needed; there is no separate lock.
//!
//! # Implementations
//!
//! - [`MemoryStore`]: in-process, with an injectable clock
//! - `RedisStore` (feature `redis`): Lua scripts over `EVALSHA`
//!
//! # Key layout
//!
//! `<prefix>:<name>:<kind>`, where `kind` is `fw`, `sw`, `lb` or `tb`. Each key
//! holds one hash:
//!
//! | kind | fields |
//! |------|--------|
//! | `fw` | `window_start`, `count` |
//! | `sw` | `window_start`, `t0..tN-1`, `c0..cN-1` |
//! | `lb` | `last_time`, `level` |
//! | `tb` | `last_time`, `tokens` |

use std::{fmt::Debug, time::Duration};

use crate::{AlgorithmKind, BackendError};

mod memory_store;
pub use memory_store::*;

mod remote;
pub use remote::*;

/// A store that evaluates one limiter transition atomically per call.
///
/// Script arguments, in order:
///
/// - fixed window: `limit, n, interval_ms`
/// - sliding window: `slot_count, interval_ms, slot_width_ms, limit, n`
/// - leaky and token bucket: `capacity, rate, n`
///
/// Each evaluation must initialize missing state to the algorithm's neutral
/// values without overwriting existing state, use the store's own clock, and
/// return `1` (admit) or `0` (deny).
pub trait AtomicStore: Debug + Send + Sync {
    /// Evaluate the `script` transition against `key`.
    fn eval_script(
        &self,
        key: &str,
        script: AlgorithmKind,
        args: &[i64],
    ) -> Result<i64, BackendError>;

    /// Set `key` to expire after `ttl`. A missing key is not an error.
    fn expire(&self, key: &str, ttl: Duration) -> Result<(), BackendError>;
}
