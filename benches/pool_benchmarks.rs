use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use tally_pool::{Config, WorkerPoolInner};

fn create_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .enable_all()
        .build()
        .unwrap()
}

// Benchmark 1: spawn-and-await overhead against a plain tokio::spawn baseline
fn bench_spawn_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_overhead");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("pool_spawn", size), &size, |b, &size| {
            let rt = create_runtime();
            let pool = rt.block_on(async { WorkerPoolInner::with_config(Config::default()).unwrap() });

            b.to_async(&rt).iter(|| {
                let pool = &pool;
                async move {
                    let handles: Vec<_> = (0..size)
                        .map(|i| pool.spawn(move || black_box(i as f64)).unwrap())
                        .collect();

                    for handle in handles {
                        black_box(handle.await.unwrap());
                    }
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("tokio_spawn", size), &size, |b, &size| {
            let rt = create_runtime();

            b.to_async(&rt).iter(|| async {
                let handles: Vec<_> = (0..size)
                    .map(|i| tokio::spawn(async move { black_box(i as f64) }))
                    .collect();

                for handle in handles {
                    black_box(handle.await.unwrap());
                }
            });
        });
    }

    group.finish();
}

// Benchmark 2: round-trip latency of one blocking submit
fn bench_blocking_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking_submit");
    group.sample_size(50);

    for workers in [1, 4] {
        group.bench_with_input(
            BenchmarkId::new("single_submit", workers),
            &workers,
            |b, &workers| {
                let rt = create_runtime();
                let pool = rt.block_on(async { WorkerPoolInner::new(workers).unwrap() });

                b.to_async(&rt).iter(|| {
                    let pool = &pool;
                    async move {
                        black_box(pool.submit(|| black_box(1.0)).await.unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

// Benchmark 3: throughput scaling with the worker count
fn bench_worker_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker_scaling");
    group.sample_size(20);

    let tasks = 5000;
    group.throughput(Throughput::Elements(tasks as u64));

    for workers in [2, 4, 8].iter() {
        if *workers <= num_cpus::get() * 2 {
            group.bench_with_input(BenchmarkId::new("workers", workers), workers, |b, &workers| {
                let rt = create_runtime();

                b.to_async(&rt).iter(|| async move {
                    let pool = WorkerPoolInner::new(workers).unwrap();
                    for i in 0..tasks {
                        pool.spawn(move || black_box((i % 10) as f64)).unwrap();
                    }
                    pool.join_all().await;
                    black_box(pool.average().await.unwrap());
                    pool.shutdown().await.unwrap();
                });
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_spawn_overhead,
    bench_blocking_submit,
    bench_worker_scaling,
);

criterion_main!(benches);
