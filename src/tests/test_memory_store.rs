use crate::{
    AlgorithmKind, AtomicStore, BackendError, FixedWindow, MemoryStore, TokenBucket,
    tests::common::{T0_MS, clock, secs},
};

#[test]
fn evaluates_fixed_window_script() {
    let store = MemoryStore::with_clock(clock());

    // limit, n, interval_ms
    let args = [2, 1, 1000];
    assert_eq!(store.eval_script("k", AlgorithmKind::FixedWindow, &args), Ok(1));
    assert_eq!(store.eval_script("k", AlgorithmKind::FixedWindow, &args), Ok(1));
    assert_eq!(store.eval_script("k", AlgorithmKind::FixedWindow, &args), Ok(0));

    let state = store.state::<FixedWindow>("k").unwrap();
    assert_eq!(state.window_start_ms(), T0_MS);
    assert_eq!(state.count(), 2);
}

#[test]
fn state_is_initialized_once_per_key() {
    let clock = clock();
    let store = MemoryStore::with_clock(clock.clone());

    // capacity, rate, n
    assert_eq!(store.eval_script("k", AlgorithmKind::TokenBucket, &[5, 1, 5]), Ok(1));

    clock.advance(secs(30));
    store.eval_script("other", AlgorithmKind::TokenBucket, &[5, 1, 1]).unwrap();

    let state = store.state::<TokenBucket>("k").unwrap();
    assert_eq!(state.tokens(), 0);
    assert_eq!(state.last_time_s(), T0_MS / 1000);
    assert_eq!(store.len(), 2);
}

#[test]
fn rejects_wrong_argument_count() {
    let store = MemoryStore::new();

    assert!(matches!(
        store.eval_script("k", AlgorithmKind::SlidingWindow, &[10, 1000, 100, 5]),
        Err(BackendError::InvalidArguments(_))
    ));
    assert!(store.is_empty());
}

#[test]
fn rejects_negative_arguments() {
    let store = MemoryStore::new();

    assert!(matches!(
        store.eval_script("k", AlgorithmKind::LeakyBucket, &[5, 1, -1]),
        Err(BackendError::InvalidArguments(_))
    ));
}

#[test]
fn rejects_invalid_parameters() {
    let store = MemoryStore::new();

    assert!(matches!(
        store.eval_script("k", AlgorithmKind::FixedWindow, &[5, 1, 100]),
        Err(BackendError::InvalidArguments(_))
    ));
    assert!(matches!(
        store.eval_script("k", AlgorithmKind::TokenBucket, &[1, 2, 1]),
        Err(BackendError::InvalidArguments(_))
    ));
    assert!(store.is_empty());
}

#[test]
fn key_holding_other_algorithm_is_a_script_error() {
    let store = MemoryStore::new();

    store.eval_script("k", AlgorithmKind::FixedWindow, &[5, 1, 1000]).unwrap();

    assert!(matches!(
        store.eval_script("k", AlgorithmKind::TokenBucket, &[5, 1, 1]),
        Err(BackendError::Script(_))
    ));
    assert!(store.state::<TokenBucket>("k").is_none());
    assert!(store.state::<FixedWindow>("k").is_some());
}

#[test]
fn expire_sets_ttl_and_expired_keys_start_over() {
    let clock = clock();
    let store = MemoryStore::with_clock(clock.clone());

    assert_eq!(store.eval_script("k", AlgorithmKind::TokenBucket, &[5, 1, 5]), Ok(1));
    assert_eq!(store.ttl("k"), None);

    store.expire("k", secs(10)).unwrap();
    assert_eq!(store.ttl("k"), Some(secs(10)));

    clock.advance(secs(4));
    assert_eq!(store.ttl("k"), Some(secs(6)));
    assert!(store.contains_key("k"));

    clock.advance(secs(6));
    assert!(!store.contains_key("k"));
    assert!(store.state::<TokenBucket>("k").is_none());
    // dropped lazily
    assert_eq!(store.len(), 1);

    // a fresh bucket is full again
    assert_eq!(store.eval_script("k", AlgorithmKind::TokenBucket, &[5, 1, 5]), Ok(1));
    assert_eq!(store.ttl("k"), None);
}

#[test]
fn expire_on_missing_key_creates_nothing() {
    let store = MemoryStore::new();

    assert_eq!(store.expire("missing", secs(10)), Ok(()));
    assert!(!store.contains_key("missing"));
    assert!(store.is_empty());
}
