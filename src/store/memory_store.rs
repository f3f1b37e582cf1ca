use std::{any::Any, sync::Arc, time::Duration};

use dashmap::DashMap;

use crate::{
    Algorithm, AlgorithmKind, AtomicStore, BackendError, Clock, FixedWindow, LeakyBucket,
    SlidingWindow, SystemClock, TokenBucket,
};

/// In-process [`AtomicStore`].
///
/// Evaluates the same transitions as the local limiters, under a per-key lock
/// (a [`DashMap`] shard), with its own clock standing in for the server clock.
/// Expired keys are dropped lazily when next touched, after which the next
/// evaluation starts from neutral state again, as a Redis key would.
///
/// Useful for tests and for sharing one budget between limiter instances in
/// the same process.
#[derive(Debug)]
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    entries: DashMap<String, Entry>,
}

#[derive(Debug)]
struct Entry {
    state: Box<dyn Any + Send + Sync>,
    expires_at_ms: Option<i64>,
}

impl Entry {
    fn new<A: Algorithm>(state: A) -> Self {
        Self {
            state: Box::new(state),
            expires_at_ms: None,
        }
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_some_and(|at| at <= now_ms)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// A store on the given clock.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
            entries: DashMap::new(),
        }
    }

    /// Whether `key` holds live state.
    pub fn contains_key(&self, key: &str) -> bool {
        let now_ms = self.clock.now_ms();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now_ms))
    }

    /// Remaining time to live of `key`, if it exists and has one.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now_ms = self.clock.now_ms();
        let entry = self.entries.get(key)?;

        match entry.expires_at_ms {
            Some(at) if at > now_ms => Some(Duration::from_millis((at - now_ms) as u64)),
            _ => None,
        }
    }

    /// A copy of the state held under `key`, if it is live and of type `A`.
    pub fn state<A: Algorithm>(&self, key: &str) -> Option<A> {
        let now_ms = self.clock.now_ms();
        let entry = self.entries.get(key)?;

        if entry.is_expired(now_ms) {
            return None;
        }

        entry.state.downcast_ref::<A>().cloned()
    }

    /// Number of stored keys, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn eval<A: Algorithm>(&self, key: &str, args: &[i64]) -> Result<i64, BackendError> {
        let (params, n) = A::from_script_args(args)?;

        // the entry guard holds the shard lock for the whole transition
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(A::initial(&params, self.clock.now_ms())));
        let now_ms = self.clock.now_ms();

        if entry.is_expired(now_ms) {
            *entry = Entry::new(A::initial(&params, now_ms));
        }

        let Some(state) = entry.state.downcast_mut::<A>() else {
            return Err(BackendError::Script(format!(
                "key {key} holds state of another algorithm"
            )));
        };

        Ok(i64::from(state.try_admit(&params, now_ms, n)))
    }
}

impl AtomicStore for MemoryStore {
    fn eval_script(
        &self,
        key: &str,
        script: AlgorithmKind,
        args: &[i64],
    ) -> Result<i64, BackendError> {
        match script {
            AlgorithmKind::FixedWindow => self.eval::<FixedWindow>(key, args),
            AlgorithmKind::SlidingWindow => self.eval::<SlidingWindow>(key, args),
            AlgorithmKind::LeakyBucket => self.eval::<LeakyBucket>(key, args),
            AlgorithmKind::TokenBucket => self.eval::<TokenBucket>(key, args),
        }
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<(), BackendError> {
        let now_ms = self.clock.now_ms();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        self.entries.remove_if(key, |_, entry| entry.is_expired(now_ms));

        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at_ms = Some(now_ms.saturating_add(ttl_ms));
        }

        Ok(())
    }
}
