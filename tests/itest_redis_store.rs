#![cfg(feature = "redis")]

use std::{env, sync::Arc, thread, time::Duration};

use tollgate::{
    BackendError, KeyTtl, RedisStore, RedisStoreOptions, Remote, RemoteKey,
    RemoteOptions, TollgateError,
};

fn redis_url() -> Option<String> {
    env::var("REDIS_URL").ok()
}

fn unique_prefix() -> RemoteKey {
    let n: u64 = rand::random();
    RemoteKey::try_from(format!("tollgate_test_{n}")).unwrap()
}

fn build_remote(url: &str) -> (Remote, RemoteKey) {
    let store = RedisStore::from_client(
        redis::Client::open(url).unwrap(),
        RedisStoreOptions {
            connection_count: 4,
            ..Default::default()
        },
    )
    .unwrap();
    let prefix = unique_prefix();

    let remote = Remote::new(RemoteOptions {
        prefix: Some(prefix.clone()),
        key_ttl: KeyTtl::try_from(Duration::from_secs(30)).unwrap(),
        ..RemoteOptions::new(Arc::new(store))
    });

    (remote, prefix)
}

fn connection(url: &str) -> redis::Connection {
    redis::Client::open(url).unwrap().get_connection().unwrap()
}

#[test]
fn fixed_window_admits_limit_then_denies() {
    let Some(url) = redis_url() else {
        return;
    };
    let (remote, _prefix) = build_remote(&url);

    let limiter = tollgate::fixed_window(Duration::from_secs(60), 3).attach_remote(&remote, "k");

    assert!(limiter.allow());
    assert!(limiter.allow_n(2));
    assert!(!limiter.allow());
    assert!(limiter.last_error().is_none());
}

#[test]
fn fixed_window_reopens_after_interval() {
    let Some(url) = redis_url() else {
        return;
    };
    let (remote, _prefix) = build_remote(&url);

    let limiter =
        tollgate::fixed_window(Duration::from_millis(300), 1).attach_remote(&remote, "k");

    assert!(limiter.allow());
    assert!(!limiter.allow());

    thread::sleep(Duration::from_millis(350));
    assert!(limiter.allow());
}

#[test]
fn sliding_window_admits_limit_then_denies() {
    let Some(url) = redis_url() else {
        return;
    };
    let (remote, prefix) = build_remote(&url);

    let limiter =
        tollgate::sliding_window(Duration::from_secs(60), 5, 10).attach_remote(&remote, "k");

    assert!(limiter.allow_n(4));
    assert!(!limiter.allow_n(2));
    assert!(limiter.allow());
    assert!(!limiter.allow());
    assert!(limiter.last_error().is_none());

    let mut conn = connection(&url);
    let key = format!("{prefix}:k:sw");
    let fields: Vec<String> = redis::cmd("HKEYS").arg(&key).query(&mut conn).unwrap();
    // window_start plus a touched and a count field per slot
    assert_eq!(fields.len(), 21);
}

#[test]
fn leaky_bucket_fills_then_denies() {
    let Some(url) = redis_url() else {
        return;
    };
    let (remote, _prefix) = build_remote(&url);

    let limiter = tollgate::leaky_bucket(10, 1).attach_remote(&remote, "k");

    assert!(limiter.allow_n(10));
    // at most one second can drain between calls
    assert!(!limiter.allow_n(5));
    assert!(limiter.last_error().is_none());
}

#[test]
fn token_bucket_starts_full_and_refills() {
    let Some(url) = redis_url() else {
        return;
    };
    let (remote, prefix) = build_remote(&url);

    let limiter = tollgate::token_bucket(10, 1).attach_remote(&remote, "k");

    assert!(limiter.allow_n(10));
    assert!(!limiter.allow_n(5));

    thread::sleep(Duration::from_millis(2100));
    assert!(limiter.allow_n(2));

    let mut conn = connection(&url);
    let tokens: i64 = redis::cmd("HGET")
        .arg(format!("{prefix}:k:tb"))
        .arg("tokens")
        .query(&mut conn)
        .unwrap();
    assert!((0..=1).contains(&tokens));
}

#[test]
fn instances_share_budget_per_name_and_kind() {
    let Some(url) = redis_url() else {
        return;
    };
    let (remote, _prefix) = build_remote(&url);

    let a = tollgate::fixed_window(Duration::from_secs(60), 2).attach_remote(&remote, "shared");
    let b = tollgate::fixed_window(Duration::from_secs(60), 2).attach_remote(&remote, "shared");
    let other = tollgate::fixed_window(Duration::from_secs(60), 2).attach_remote(&remote, "other");
    let tokens = tollgate::token_bucket(2, 1).attach_remote(&remote, "shared");

    assert!(a.allow());
    assert!(b.allow());
    assert!(!a.allow());
    assert!(!b.allow());

    assert!(other.allow_n(2));
    assert!(tokens.allow_n(2));
}

#[test]
fn refresh_sets_key_ttl() {
    let Some(url) = redis_url() else {
        return;
    };
    let (remote, prefix) = build_remote(&url);

    let limiter = tollgate::token_bucket(5, 1).attach_remote(&remote, "k");
    assert!(limiter.allow());

    let mut conn = connection(&url);
    let key = format!("{prefix}:k:tb");

    let ttl: i64 = redis::cmd("PTTL").arg(&key).query(&mut conn).unwrap();
    assert_eq!(ttl, -1);

    assert_eq!(remote.refresh_key_ttls(), Ok(1));

    let ttl: i64 = redis::cmd("PTTL").arg(&key).query(&mut conn).unwrap();
    assert!(ttl > 0 && ttl <= 30_000, "ttl = {ttl}");
}

#[test]
fn concurrent_callers_never_over_admit() {
    let Some(url) = redis_url() else {
        return;
    };
    let (remote, _prefix) = build_remote(&url);

    let limit = 50;
    let admitted: usize = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let remote = remote.clone();
                scope.spawn(move || {
                    let limiter = tollgate::fixed_window(Duration::from_secs(60), limit)
                        .attach_remote(&remote, "contended");
                    (0..20).filter(|_| limiter.allow()).count()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(admitted, limit as usize);
}

#[test]
fn unreachable_store_is_a_backend_error() {
    let store = RedisStore::from_client(
        redis::Client::open("redis://127.0.0.1:1/").unwrap(),
        RedisStoreOptions {
            connection_count: 1,
            timeout: Duration::from_millis(200),
        },
    )
    .unwrap();
    let remote = Remote::new(RemoteOptions::new(Arc::new(store)));

    let limiter = tollgate::token_bucket(5, 1).attach_remote(&remote, "k");

    assert!(!limiter.allow());
    assert!(matches!(
        limiter.last_error(),
        Some(TollgateError::Backend(
            BackendError::Unavailable(_) | BackendError::Timeout
        ))
    ));
    assert!(remote.refresh_key_ttls().is_err());
}

#[test]
fn zero_connections_is_rejected() {
    let err = RedisStore::from_client(
        redis::Client::open("redis://127.0.0.1:6379/").unwrap(),
        RedisStoreOptions {
            connection_count: 0,
            ..Default::default()
        },
    )
    .unwrap_err();

    assert!(err.is_config());
}
