use std::{sync::Arc, time::Duration};

use crate::{ManualClock, MemoryStore, Remote, RemoteOptions};

/// An arbitrary, whole-second starting point so bucket arithmetic is easy to follow.
pub(crate) const T0_MS: i64 = 1_700_000_000_000;

pub(crate) fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

pub(crate) fn secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

pub(crate) fn clock() -> ManualClock {
    ManualClock::new(T0_MS)
}

/// A remote over a [`MemoryStore`] driven by `clock`.
pub(crate) fn memory_remote(clock: &ManualClock) -> (Remote, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let remote = Remote::new(RemoteOptions::new(store.clone()));

    (remote, store)
}
