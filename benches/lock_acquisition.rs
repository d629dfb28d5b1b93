//! Benchmarks for lock acquisition latency

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lease_lock_core::prelude::*;
use std::time::Duration;

fn bench_memory_lock_acquisition(c: &mut Criterion) {
    let client = LeaseLockClient::new(MemoryStore::new(), LockOptions::default()).unwrap();
    let ctx = LockContext::background();

    let mut group = c.benchmark_group("memory_lock");
    group.bench_function("try_acquire", |b| {
        b.to_async(tokio::runtime::Runtime::new().unwrap())
            .iter(|| async {
                if let Ok(Some(handle)) = client.try_acquire("bench-lock").await {
                    let _ = handle.release(&ctx).await;
                }
            });
    });

    group.bench_function("acquire_release", |b| {
        b.to_async(tokio::runtime::Runtime::new().unwrap())
            .iter(|| async {
                if let Ok(handle) = client.acquire(&ctx, "bench-lock").await {
                    black_box(handle.release(&ctx).await.ok());
                }
            });
    });

    group.bench_function("contended_retry_exhaustion", |b| {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let holder = rt.block_on(client.acquire(&ctx, "bench-held")).unwrap();
        b.to_async(&rt).iter(|| async {
            let retry = FixedIntervalRetry::new(Duration::ZERO, 2);
            black_box(client.acquire_with_retry(&ctx, "bench-held", retry).await.is_err());
        });
        let _ = rt.block_on(holder.release(&ctx));
    });

    group.finish();
}

fn bench_token_generation(c: &mut Criterion) {
    c.bench_function("token_generate", |b| b.iter(|| black_box(LockToken::generate())));
}

criterion_group!(benches, bench_memory_lock_acquisition, bench_token_generation);
criterion_main!(benches);
