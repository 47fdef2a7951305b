use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use pipeweld::prelude::*;

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("receive", size), size, |b, &size| {
            b.iter(|| {
                tokio::runtime::Runtime::new().unwrap().block_on(async {
                    let pipe = Pipe::from(from_iter(0..size));
                    black_box(pipe.receive().collect_all().await);
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("filter_transform", size), size, |b, &size| {
            b.iter(|| {
                tokio::runtime::Runtime::new().unwrap().block_on(async {
                    let pipe = Pipe::from(from_iter(0..size))
                        .filter(|x| x % 2 == 0)
                        .transform(|x: i64| black_box(x * 3));
                    black_box(pipe.receive().collect_all().await);
                })
            });
        });
    }

    group.finish();
}

fn bench_buffer_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_size");

    for buffer_size in [1, 16, 256].iter() {
        group.bench_with_input(
            BenchmarkId::new("transform_chain", buffer_size),
            buffer_size,
            |b, &buffer_size| {
                b.iter(|| {
                    tokio::runtime::Runtime::new().unwrap().block_on(async {
                        let pipe = Pipe::from(from_iter(0..10000i64))
                            .buffer_size(buffer_size)
                            .transform(|x| x + 1)
                            .transform(|x| x * 2)
                            .transform(|x| x - 1);
                        black_box(pipe.receive().collect_all().await);
                    })
                });
            },
        );
    }

    group.finish();
}

fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");

    for fan_out in [1, 4, 16].iter() {
        group.bench_with_input(BenchmarkId::new("to", fan_out), fan_out, |b, &fan_out| {
            b.iter(|| {
                tokio::runtime::Runtime::new().unwrap().block_on(async {
                    let (senders, receivers): (Vec<_>, Vec<_>) =
                        (0..fan_out).map(|_| channel::<u64>(64)).unzip();
                    let handle = Pipe::from(from_iter(0..1000u64)).to(senders);
                    let drained = receivers.into_iter().map(Receiver::collect_all);
                    black_box(futures::future::join_all(drained).await);
                    handle.join().await.unwrap();
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_stages, bench_buffer_size, bench_broadcast);
criterion_main!(benches);
