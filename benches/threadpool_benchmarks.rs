use criterion::{criterion_group, criterion_main, Criterion, BenchmarkId, Throughput};
use worker_pool::pool::{WorkerPool, Config as PoolConfig};
use std::{
    hint::black_box,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

fn create_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .enable_all()
        .build()
        .unwrap()
}

/// Ждёт, пока пул выполнит `target` задач
fn wait_for(done: &AtomicUsize, target: usize) {
    while done.load(Ordering::Acquire) < target {
        std::hint::spin_loop();
    }
}

// Benchmark 1: Submit overhead
fn bench_submit_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_overhead");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(
            BenchmarkId::new("default_config", size),
            &size,
            |b, &size| {
                let pool = WorkerPool::with_config(PoolConfig::default()).unwrap();
                let done = Arc::new(AtomicUsize::new(0));

                b.iter(|| {
                    done.store(0, Ordering::Release);
                    for i in 0..size {
                        let done = done.clone();
                        pool.submit(move || {
                            black_box(i);
                            done.fetch_add(1, Ordering::Release);
                        }).unwrap();
                    }
                    wait_for(&done, size);
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("cpu_bound", size),
            &size,
            |b, &size| {
                let pool = WorkerPool::with_config(PoolConfig::cpu_bound()).unwrap();
                let done = Arc::new(AtomicUsize::new(0));

                b.iter(|| {
                    done.store(0, Ordering::Release);
                    for i in 0..size {
                        let done = done.clone();
                        pool.submit(move || {
                            black_box(i);
                            done.fetch_add(1, Ordering::Release);
                        }).unwrap();
                    }
                    wait_for(&done, size);
                });
            },
        );
    }

    group.finish();
}

// Benchmark 2: Handle round-trip
fn bench_handles(c: &mut Criterion) {
    let mut group = c.benchmark_group("handles");

    for size in [100, 1000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(
            BenchmarkId::new("blocking_join", size),
            &size,
            |b, &size| {
                let pool = WorkerPool::with_config(PoolConfig::io_bound()).unwrap();

                b.iter(|| {
                    let handles: Vec<_> = (0..size)
                        .map(|i| pool.submit_with_handle(move || black_box(i)).unwrap())
                        .collect();
                    for handle in handles {
                        black_box(handle.join().unwrap());
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("await", size),
            &size,
            |b, &size| {
                let rt = create_runtime();
                let pool = WorkerPool::with_config(PoolConfig::io_bound()).unwrap();

                b.to_async(&rt).iter(|| {
                    let pool = &pool;
                    async move {
                        let handles: Vec<_> = (0..size)
                            .map(|i| pool.submit_with_handle(move || black_box(i)).unwrap())
                            .collect();
                        for r in futures::future::join_all(handles).await {
                            black_box(r.unwrap());
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

// Benchmark 3: Growth from core to max and back
fn bench_burst(c: &mut Criterion) {
    c.bench_function("burst_grow_and_retire", |b| {
        b.iter(|| {
            let pool = WorkerPool::new(1, 8, Duration::from_millis(1)).unwrap();
            for _ in 0..64 {
                pool.submit(|| std::thread::sleep(Duration::from_micros(50))).unwrap();
            }
            pool.shutdown_timeout(Duration::from_secs(10))
        });
    });
}

criterion_group!(benches, bench_submit_overhead, bench_handles, bench_burst);
criterion_main!(benches);
