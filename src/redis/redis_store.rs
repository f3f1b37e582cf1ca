use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use parking_lot::Mutex;
use redis::{Client, Connection, RedisResult};

use crate::{AlgorithmKind, AtomicStore, BackendError, ConfigError, TollgateError};

use super::scripts::Scripts;

/// Configuration for [`RedisStore`].
#[derive(Clone, Debug)]
pub struct RedisStoreOptions {
    /// Number of connections to spread calls over. Must be greater than 0.
    pub connection_count: usize,
    /// Bound on connecting, writing a command and reading its reply.
    ///
    /// A call that exceeds it fails with [`BackendError::Timeout`].
    pub timeout: Duration,
}

impl Default for RedisStoreOptions {
    /// One connection, one second timeout.
    fn default() -> Self {
        Self {
            connection_count: 1,
            timeout: Duration::from_secs(1),
        }
    }
}

/// [`AtomicStore`] backed by Redis.
///
/// Each decision is one `EVALSHA` of the algorithm's Lua script (loaded
/// automatically on first use), so Redis serializes every transition on a key
/// and timestamps it with its own `TIME`.
///
/// Connections are opened lazily and handed out round-robin. A connection
/// that fails with an I/O error or a timeout is discarded and reopened by a
/// later call; the failing call itself is not retried.
///
/// # Requirements
///
/// - **Redis:** >= 4.0 (multi-field `HSET`; scripts switch to effects
///   replication before reading `TIME`, which is the default from 5.0)
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tollgate::{Limiter, RedisStore, Remote, RemoteOptions};
///
/// let store = RedisStore::open("redis://127.0.0.1:6379/")?;
/// let remote = Remote::new(RemoteOptions::new(Arc::new(store)));
/// let _refresh = remote.run_refresh_loop();
///
/// let limiter = tollgate::sliding_window(std::time::Duration::from_secs(1), 100, 10)
///     .attach_remote(&remote, "api");
///
/// if !limiter.allow() {
///     if let Some(err) = limiter.last_error() {
///         eprintln!("undecided: {err}");
///     }
/// }
/// # Ok::<(), tollgate::TollgateError>(())
/// ```
pub struct RedisStore {
    client: Client,
    timeout: Duration,
    connections: Vec<Mutex<Option<Connection>>>,
    track_index: AtomicUsize,
    scripts: Scripts,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("client", &self.client)
            .field("timeout", &self.timeout)
            .field("connection_count", &self.connections.len())
            .finish()
    }
}

impl RedisStore {
    /// Create a store for `url` with default options.
    pub fn open(url: &str) -> Result<Self, TollgateError> {
        Self::from_client(Client::open(url)?, RedisStoreOptions::default())
    }

    /// Create a store from a client. No connection is made until first use.
    pub fn from_client(client: Client, options: RedisStoreOptions) -> Result<Self, TollgateError> {
        if options.connection_count == 0 {
            return Err(ConfigError::InvalidConnectionCount.into());
        }

        let connections = (0..options.connection_count)
            .map(|_| Mutex::new(None))
            .collect();

        Ok(Self {
            client,
            timeout: options.timeout,
            connections,
            track_index: AtomicUsize::new(0),
            scripts: Scripts::new(),
        })
    }

    fn connect(&self) -> Result<Connection, BackendError> {
        let connection = self.client.get_connection_with_timeout(self.timeout)?;
        connection.set_read_timeout(Some(self.timeout))?;
        connection.set_write_timeout(Some(self.timeout))?;

        Ok(connection)
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> Result<T, BackendError> {
        let index = self.track_index.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.connections[index % self.connections.len()].lock();

        let connection = match slot.as_mut() {
            Some(connection) => connection,
            None => slot.insert(self.connect()?),
        };

        f(connection).map_err(|err| {
            if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
                // the reply stream may be out of sync; start over on a fresh connection
                *slot = None;
            }

            BackendError::from(err)
        })
    }
}

impl AtomicStore for RedisStore {
    fn eval_script(
        &self,
        key: &str,
        script: AlgorithmKind,
        args: &[i64],
    ) -> Result<i64, BackendError> {
        let script = self.scripts.get(script);

        self.with_connection(|connection| {
            let mut invocation = script.key(key);
            for arg in args {
                invocation.arg(*arg);
            }

            invocation.invoke::<i64>(connection)
        })
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<(), BackendError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        self.with_connection(|connection| {
            redis::cmd("PEXPIRE")
                .arg(key)
                .arg(ttl_ms)
                .query::<i64>(connection)
                .map(|_| ())
        })
    }
}
