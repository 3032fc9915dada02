//! Throughput Benchmark for FlashMC
//!
//! This benchmark measures the command handler on top of the storage engine
//! under various workloads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use flashmc::{CommandHandler, Cookie, StorageEngine};
use std::sync::Arc;
use std::time::Duration;

const CONN: Cookie = Cookie(1);

fn handler() -> CommandHandler {
    CommandHandler::new(Arc::new(StorageEngine::with_config(flashmc::EngineConfig {
        max_memory: 1024 * 1024 * 1024,
        ..Default::default()
    })))
}

/// Benchmark set operations
fn bench_set(c: &mut Criterion) {
    let handler = handler();

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        let value = Bytes::from("small_value");
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            black_box(handler.set(CONN, &key, value.clone(), 0, 0, 0).ok());
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            black_box(handler.set(CONN, &key, value.clone(), 0, 0, 0).ok());
            i += 1;
        });
    });

    group.bench_function("set_with_cas", |b| {
        let key = Bytes::from("cas-key");
        let mut cas = handler.set(CONN, &key, Bytes::from("v"), 0, 0, 0).unwrap_or(0);
        b.iter(|| {
            cas = handler
                .set(CONN, &key, Bytes::from("v"), 0, 0, cas)
                .unwrap_or(0);
        });
    });

    group.finish();
}

/// Benchmark get operations
fn bench_get(c: &mut Criterion) {
    let handler = handler();

    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        handler.set(CONN, &key, value, 0, 0, 0).unwrap();
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            black_box(handler.get(CONN, &key).ok());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("missing:{}", i));
            black_box(handler.get(CONN, &key).ok());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark increment operations
fn bench_increment(c: &mut Criterion) {
    let handler = handler();

    let mut group = c.benchmark_group("increment");
    group.throughput(Throughput::Elements(1));

    // Single counter (high contention)
    group.bench_function("single_counter", |b| {
        let key = Bytes::from("counter");
        b.iter(|| {
            black_box(handler.increment(CONN, &key, 1, 0, 0).ok());
        });
    });

    // Multiple counters (low contention)
    group.bench_function("multiple_counters", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("counter:{}", i % 1000));
            black_box(handler.increment(CONN, &key, 1, 0, 0).ok());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark append, which copies the whole value each time
fn bench_append(c: &mut Criterion) {
    let handler = handler();

    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Elements(1));

    group.bench_function("append_1kb", |b| {
        let mut i = 0u64;
        let chunk = Bytes::from("y".repeat(16));
        b.iter(|| {
            let key = Bytes::from(format!("log:{}", i % 1000));
            if i % 64 == 0 {
                handler
                    .set(CONN, &key, Bytes::from("x".repeat(1024)), 0, 0, 0)
                    .ok();
            }
            black_box(handler.append(CONN, &key, chunk.clone(), 0).ok());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let handler = handler();
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let handler = handler.clone();
                    thread::spawn(move || {
                        let conn = Cookie(t);
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            handler.set(conn, &key, Bytes::from("value"), 0, 0, 0).ok();
                            handler.get(conn, &key).ok();
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(handler.store().len());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_increment,
    bench_append,
    bench_concurrent,
);

criterion_main!(benches);
