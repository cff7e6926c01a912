use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use elastic_pool::{join_handles, Config, JoinOrdering, PoolMode, ResultHandle, ThreadPool};
use std::{hint::black_box, thread, time::Duration};

fn create_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

// Benchmark 1: submit + get overhead
fn bench_submit_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_overhead");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("fixed", size), &size, |b, &size| {
            let pool = ThreadPool::with_config(Config::cpu_bound()).unwrap();
            b.iter(|| {
                let handles: Vec<_> = (0..size).map(|i| pool.submit(move || black_box(i))).collect();
                for handle in handles {
                    black_box(handle.get().unwrap());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("cached", size), &size, |b, &size| {
            let pool = ThreadPool::with_config(Config::io_bound()).unwrap();
            b.iter(|| {
                let handles: Vec<_> = (0..size).map(|i| pool.submit(move || black_box(i))).collect();
                for handle in handles {
                    black_box(handle.get().unwrap());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("std_thread_spawn", size), &size, |b, &size| {
            b.iter(|| {
                let handles: Vec<_> = (0..size).map(|i| thread::spawn(move || black_box(i))).collect();
                for handle in handles {
                    black_box(handle.join().unwrap());
                }
            });
        });
    }

    group.finish();
}

// Benchmark 2: blocking work, where Cached growth pays off
fn bench_blocking_tasks(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking_tasks");
    group.sample_size(10);

    let workers = num_cpus::get().max(2);
    for mode in [PoolMode::Fixed, PoolMode::Cached] {
        group.bench_function(BenchmarkId::new("sleep_200us", format!("{:?}", mode)), |b| {
            let pool = ThreadPool::with_config(Config {
                mode,
                initial_threads: workers,
                max_threads: workers * 4,
                ..Default::default()
            })
            .unwrap();
            b.iter(|| {
                let handles: Vec<_> = (0..256)
                    .map(|i| {
                        pool.submit(move || {
                            thread::sleep(Duration::from_micros(200));
                            i
                        })
                    })
                    .collect();
                black_box(ResultHandle::wait_all(handles));
            });
        });
    }

    group.finish();
}

// Benchmark 3: awaiting handles from async code
fn bench_join_handles(c: &mut Criterion) {
    let mut group = c.benchmark_group("join_handles");
    let rt = create_runtime();
    let pool = ThreadPool::with_config(Config::cpu_bound()).unwrap();

    for ordering in ["ordered", "unordered"] {
        group.bench_function(ordering, |b| {
            b.to_async(&rt).iter(|| {
                let pool = &pool;
                async move {
                    let handles: Vec<_> = (0..1000u64).map(|i| pool.submit(move || i * i)).collect();
                    let ordering = if ordering == "ordered" {
                        JoinOrdering::Ordered
                    } else {
                        JoinOrdering::UnOrdered
                    };
                    black_box(join_handles(handles, ordering).await);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_submit_overhead, bench_blocking_tasks, bench_join_handles);
criterion_main!(benches);
