use std::{
    fmt,
    ops::Deref,
    sync::{
        Arc,
        mpsc::{self, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use dashmap::DashMap;

use crate::{AlgorithmKind, AtomicStore, BackendError, ConfigError, KeyTtl, TollgateError};

/// A validated segment of a store key.
///
/// This is a string with the following constraints:
/// - Must not be empty
/// - Must not be longer than 255 bytes
/// - Must not contain colons
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash, Eq)]
pub struct RemoteKey(Arc<str>);

impl RemoteKey {
    /// The prefix used when none is configured.
    pub fn default_prefix() -> Self {
        Self(Arc::from("tollgate"))
    }
}

impl Deref for RemoteKey {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for RemoteKey {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(ConfigError::InvalidRemoteKey(
                "key must not be empty".to_string(),
            ))
        } else if value.len() > 255 {
            Err(ConfigError::InvalidRemoteKey(
                "key must not be longer than 255 bytes".to_string(),
            ))
        } else if value.contains(':') {
            Err(ConfigError::InvalidRemoteKey(
                "key must not contain colons".to_string(),
            ))
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

impl TryFrom<String> for RemoteKey {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

/// Configuration for a [`Remote`].
#[derive(Clone, Debug)]
pub struct RemoteOptions {
    /// The store evaluating decisions.
    pub store: Arc<dyn AtomicStore>,
    /// Prefix for every key. Defaults to `"tollgate"`.
    pub prefix: Option<RemoteKey>,
    /// Expiry applied to bound keys by [`Remote::refresh_key_ttls`].
    pub key_ttl: KeyTtl,
}

impl RemoteOptions {
    /// Options with the default prefix and key TTL.
    pub fn new(store: Arc<dyn AtomicStore>) -> Self {
        Self {
            store,
            prefix: None,
            key_ttl: KeyTtl::default(),
        }
    }
}

/// Handle to a shared store, used to bind limiters to remote keys.
///
/// Cheap to clone; clones share the set of bound keys. A key stays bound while
/// at least one limiter bound to it is alive, and is released when the last
/// one is dropped. Keys stay in the store until they expire, so long-lived
/// processes should keep their bound keys alive with
/// [`Remote::run_refresh_loop`] or periodic calls to
/// [`Remote::refresh_key_ttls`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tollgate::{FixedWindowLimiter, MemoryStore, Remote, RemoteOptions};
///
/// let remote = Remote::new(RemoteOptions::new(Arc::new(MemoryStore::new())));
///
/// // two instances sharing one budget
/// let a = FixedWindowLimiter::new(Duration::from_secs(60), 3).with_remote(&remote, "search");
/// let b = FixedWindowLimiter::new(Duration::from_secs(60), 3).with_remote(&remote, "search");
///
/// assert!(a.allow_n(2));
/// assert!(b.allow());
/// assert!(!a.allow());
/// assert_eq!(a.remote_key(), Some("tollgate:search:fw"));
/// ```
#[derive(Clone, Debug)]
pub struct Remote {
    inner: Arc<RemoteInner>,
}

#[derive(Debug)]
struct RemoteInner {
    store: Arc<dyn AtomicStore>,
    prefix: RemoteKey,
    key_ttl: KeyTtl,
    // bound key -> number of live limiters bound to it
    keys: DashMap<Arc<str>, usize>,
}

impl Remote {
    /// Create a handle from options.
    pub fn new(options: RemoteOptions) -> Self {
        Self {
            inner: Arc::new(RemoteInner {
                store: options.store,
                prefix: options.prefix.unwrap_or_else(RemoteKey::default_prefix),
                key_ttl: options.key_ttl,
                keys: DashMap::new(),
            }),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn AtomicStore> {
        &self.inner.store
    }

    /// Store key for `name` under algorithm `kind`.
    pub fn key_for(&self, name: &RemoteKey, kind: AlgorithmKind) -> String {
        format!("{}:{}:{}", self.inner.prefix, name, kind)
    }

    /// Every key currently bound through this handle.
    pub fn bound_keys(&self) -> Vec<Arc<str>> {
        self.inner.keys.iter().map(|key| key.key().clone()).collect()
    }

    pub(crate) fn bind(&self, name: &RemoteKey, kind: AlgorithmKind) -> RemoteBinding {
        let key: Arc<str> = Arc::from(self.key_for(name, kind));
        *self.inner.keys.entry(key.clone()).or_insert(0) += 1;

        tracing::debug!(key = &*key, "limiter bound to remote key");

        RemoteBinding {
            remote: self.inner.clone(),
            key,
        }
    }

    /// Re-apply the key TTL to every bound key.
    ///
    /// Every key is attempted; returns how many were refreshed, or the first
    /// failure.
    pub fn refresh_key_ttls(&self) -> Result<usize, TollgateError> {
        let mut refreshed = 0;
        let mut first_error = None;

        for key in self.bound_keys() {
            match self.inner.store.expire(&key, *self.inner.key_ttl) {
                Ok(()) => refreshed += 1,
                Err(err) => {
                    tracing::debug!(key = &*key, error = %err, "failed to refresh key ttl");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            None => Ok(refreshed),
            Some(err) => Err(err.into()),
        }
    }

    /// Refresh key TTLs every half TTL on a background thread.
    pub fn run_refresh_loop(&self) -> RefreshLoop {
        self.run_refresh_loop_with_interval(*self.inner.key_ttl / 2)
    }

    /// Refresh key TTLs every `every` on a background thread.
    ///
    /// Failures are logged and the loop keeps going. The loop ends when the
    /// returned handle is stopped or dropped.
    pub fn run_refresh_loop_with_interval(&self, every: Duration) -> RefreshLoop {
        let (stop, stopped) = mpsc::channel::<()>();
        let remote = self.clone();

        let handle = thread::spawn(move || {
            loop {
                match stopped.recv_timeout(every) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                if let Err(err) = remote.refresh_key_ttls() {
                    tracing::error!(error = %err, "remote.refresh.error, failed to refresh key ttls");
                }
            }
        });

        RefreshLoop {
            stop: Some(stop),
            handle: Some(handle),
        }
    }
}

/// A running TTL refresh loop. Dropping it stops the loop without waiting.
#[derive(Debug)]
pub struct RefreshLoop {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshLoop {
    /// Stop the loop and wait for an in-flight refresh to finish.
    pub fn stop(mut self) {
        self.stop.take();

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RefreshLoop {
    fn drop(&mut self) {
        self.stop.take();
    }
}

/// A limiter's link to its store record.
#[derive(Debug)]
pub(crate) struct RemoteBinding {
    remote: Arc<RemoteInner>,
    key: Arc<str>,
}

impl RemoteBinding {
    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn evaluate(
        &self,
        script: AlgorithmKind,
        args: &[i64],
    ) -> Result<bool, BackendError> {
        match self.remote.store.eval_script(&self.key, script, args)? {
            1 => Ok(true),
            0 => Ok(false),
            other => Err(BackendError::UnexpectedResult(other)),
        }
    }
}

impl Drop for RemoteBinding {
    fn drop(&mut self) {
        if let Some(mut bound) = self.remote.keys.get_mut(&*self.key) {
            *bound = bound.saturating_sub(1);
        }

        if self.remote.keys.remove_if(&*self.key, |_, bound| *bound == 0).is_some() {
            tracing::debug!(key = &*self.key, "remote key released");
        }
    }
}
