use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    Algorithm, BackendError, Clock, ConfigError, Limiter, Remote, RemoteBinding, RemoteKey,
    SystemClock, TollgateError,
};

/// A limiter running one [`Algorithm`], either in process or against a shared store.
///
/// Use the aliases [`FixedWindowLimiter`](crate::FixedWindowLimiter),
/// [`SlidingWindowLimiter`](crate::SlidingWindowLimiter),
/// [`LeakyBucketLimiter`](crate::LeakyBucketLimiter) and
/// [`TokenBucketLimiter`](crate::TokenBucketLimiter) to construct one.
///
/// # Local mode
///
/// State lives behind a mutex held for the whole read-decide-write sequence,
/// so concurrent callers on one instance are serialized and no update is lost.
/// State is created on the first decision.
///
/// # Remote mode
///
/// After [`Throttle::with_remote`], every decision is one atomic script
/// evaluation against the shared store, using the store's clock. The instance
/// keeps no decision state of its own.
///
/// # Errors
///
/// Decisions never return errors. Check [`Throttle::last_error`]:
///
/// - a [`ConfigError`] is recorded at construction (or on binding an invalid
///   remote key) and stays for the lifetime of the limiter; every decision is
///   denied while it is present
/// - a [`BackendError`] is recorded when a remote evaluation fails; that
///   decision is denied and the error stays until the next successful call
#[derive(Debug)]
pub struct Throttle<A: Algorithm> {
    params: Option<A::Params>,
    config_error: Option<ConfigError>,
    clock: Arc<dyn Clock>,
    backing: Backing<A>,
    backend_error: Mutex<Option<BackendError>>,
}

#[derive(Debug)]
enum Backing<A> {
    Local(Mutex<Option<A>>),
    Remote(RemoteBinding),
}

impl<A: Algorithm> Throttle<A> {
    pub(crate) fn from_params(params: Result<A::Params, ConfigError>) -> Self {
        let (params, config_error) = match params {
            Ok(params) => (Some(params), None),
            Err(err) => {
                tracing::debug!(kind = %A::KIND, error = %err, "limiter constructed with invalid configuration");
                (None, Some(err))
            }
        };

        Self {
            params,
            config_error,
            clock: Arc::new(SystemClock),
            backing: Backing::Local(Mutex::new(None)),
            backend_error: Mutex::new(None),
        }
    }

    /// Replace the clock used by local decisions.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Move every future decision to the shared store behind `remote`.
    ///
    /// The store key is `name` namespaced by the remote's prefix and this
    /// algorithm's kind, so the same name can be reused across algorithms.
    /// An invalid `name` records [`ConfigError::InvalidRemoteKey`] and the
    /// limiter stays local.
    pub fn with_remote(mut self, remote: &Remote, name: &str) -> Self {
        match RemoteKey::try_from(name) {
            Ok(name) => {
                self.backing = Backing::Remote(remote.bind(&name, A::KIND));
            }
            Err(err) => {
                tracing::debug!(kind = %A::KIND, error = %err, "refusing to bind remote key");
                self.config_error.get_or_insert(err);
            }
        }

        self
    }

    /// Whether decisions go to a shared store.
    pub fn is_remote(&self) -> bool {
        matches!(self.backing, Backing::Remote(_))
    }

    /// The namespaced store key, when bound to a remote.
    pub fn remote_key(&self) -> Option<&str> {
        match &self.backing {
            Backing::Local(_) => None,
            Backing::Remote(binding) => Some(binding.key()),
        }
    }

    /// Validated parameters, or `None` when construction failed.
    pub fn params(&self) -> Option<&A::Params> {
        self.params.as_ref()
    }

    /// A copy of the local state, if any decision has been made locally.
    pub fn local_state(&self) -> Option<A> {
        match &self.backing {
            Backing::Local(state) => state.lock().clone(),
            Backing::Remote(_) => None,
        }
    }

    /// Admit a single unit. Same as `allow_n(1)`.
    pub fn allow(&self) -> bool {
        self.allow_n(1)
    }

    /// Admit `n` units at once, or none of them.
    ///
    /// Never blocks beyond the mutex (local) or one store round-trip bounded
    /// by the store's timeout (remote). Returns `false` while a configuration
    /// error is present and when the store call fails.
    pub fn allow_n(&self, n: u64) -> bool {
        let Some(params) = self.params.as_ref() else {
            return false;
        };

        if self.config_error.is_some() {
            return false;
        }

        match &self.backing {
            Backing::Local(state) => {
                let mut state = state.lock();
                let now_ms = self.clock.now_ms();
                let state = state.get_or_insert_with(|| A::initial(params, now_ms));

                state.try_admit(params, now_ms, n)
            }
            Backing::Remote(binding) => {
                match binding.evaluate(A::KIND, &A::script_args(params, n)) {
                    Ok(admitted) => {
                        *self.backend_error.lock() = None;
                        admitted
                    }
                    Err(err) => {
                        tracing::warn!(key = binding.key(), error = %err, "remote evaluation failed");
                        *self.backend_error.lock() = Some(err);
                        false
                    }
                }
            }
        }
    }

    /// The configuration error, if any, otherwise the last backend error.
    pub fn last_error(&self) -> Option<TollgateError> {
        if let Some(err) = &self.config_error {
            return Some(err.clone().into());
        }

        self.backend_error.lock().clone().map(TollgateError::from)
    }
}

impl<A: Algorithm> Limiter for Throttle<A> {
    fn allow_n(&self, n: u64) -> bool {
        Throttle::allow_n(self, n)
    }

    fn attach_remote(self: Box<Self>, remote: &Remote, name: &str) -> Box<dyn Limiter> {
        Box::new((*self).with_remote(remote, name))
    }

    fn last_error(&self) -> Option<TollgateError> {
        Throttle::last_error(self)
    }
}
