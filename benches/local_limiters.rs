use std::{hint::black_box, sync::Arc, time::Duration};

use criterion::{Criterion, criterion_group, criterion_main};

use tollgate::{Limiter, MemoryStore, Remote, RemoteOptions};

fn limiters(limit: u64) -> Vec<(&'static str, Box<dyn Limiter>)> {
    vec![
        ("fixed_window", tollgate::fixed_window(Duration::from_secs(60), limit)),
        (
            "sliding_window",
            tollgate::sliding_window(Duration::from_secs(60), limit, 10),
        ),
        ("leaky_bucket", tollgate::leaky_bucket(limit, 1)),
        ("token_bucket", tollgate::token_bucket(limit, 1)),
    ]
}

fn bench_allowed(c: &mut Criterion) {
    let mut group = c.benchmark_group("local/allowed");
    group.sample_size(200);

    for (name, limiter) in limiters(u64::MAX / 2) {
        group.bench_function(name, |b| {
            b.iter(|| black_box(limiter.allow_n(black_box(1))));
        });
    }

    group.finish();
}

fn bench_rejected(c: &mut Criterion) {
    let mut group = c.benchmark_group("local/rejected");
    group.sample_size(200);

    for (name, limiter) in limiters(10) {
        // saturate so every measured call takes the deny path
        while limiter.allow() {}

        group.bench_function(name, |b| {
            b.iter(|| black_box(limiter.allow_n(black_box(1))));
        });
    }

    group.finish();
}

fn bench_memory_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_store/allowed");
    group.sample_size(100);

    let remote = Remote::new(RemoteOptions::new(Arc::new(MemoryStore::new())));

    for (name, limiter) in limiters(u64::MAX / 2) {
        let limiter = limiter.attach_remote(&remote, name);

        group.bench_function(name, |b| {
            b.iter(|| black_box(limiter.allow_n(black_box(1))));
        });
    }

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("local/contended");
    group.sample_size(50);

    for threads in [2_usize, 8] {
        group.bench_function(format!("token_bucket/threads={threads}"), |b| {
            let limiter = tollgate::token_bucket(u64::MAX / 2, 1);

            b.iter(|| {
                std::thread::scope(|scope| {
                    for _ in 0..threads {
                        scope.spawn(|| {
                            for _ in 0..1_000 {
                                black_box(limiter.allow());
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_allowed,
    bench_rejected,
    bench_memory_store,
    bench_contended
);
criterion_main!(benches);
