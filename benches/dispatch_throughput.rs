//! Benchmarks for dispatch overhead and end-to-end throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use queue_dispatch::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn run_batch(initial: usize, max: usize, tasks: usize) -> usize {
    let config = Config::builder()
        .name("bench")
        .initial_workers(initial)
        .max_workers(max)
        .shutdown_policy(ShutdownPolicy::Drain)
        .build()
        .expect("valid config");
    let mut dispatcher = Dispatcher::with_config(config).expect("dispatcher");
    let counter = Arc::new(AtomicUsize::new(0));

    for i in 0..tasks {
        let counter = counter.clone();
        dispatcher.dispatch_fn(move |_, _| {
            black_box((0..100).map(|j| i + j).sum::<usize>());
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }

    dispatcher.shutdown().expect("shutdown");
    counter.load(Ordering::Relaxed)
}

fn bench_dispatch_only(c: &mut Criterion) {
    let dispatcher = Dispatcher::new("bench-dispatch", 4, 4).expect("dispatcher");

    c.bench_function("dispatch_noop", |b| {
        b.iter(|| dispatcher.dispatch_fn(|congested, len| {
            black_box((congested, len));
        }))
    });
}

fn bench_fixed_vs_elastic(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");

    for tasks in [1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("fixed_4", tasks), tasks, |b, &tasks| {
            b.iter(|| run_batch(4, 4, black_box(tasks)))
        });

        group.bench_with_input(BenchmarkId::new("elastic_1_to_8", tasks), tasks, |b, &tasks| {
            b.iter(|| run_batch(1, 8, black_box(tasks)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch_only, bench_fixed_vs_elastic);
criterion_main!(benches);
