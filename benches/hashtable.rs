use bufcore::{ExtendibleHashTable, HashTableApi as _};
use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};

fn bench_insert_grow(c: &mut Criterion) {
    let mut group = c.benchmark_group("extendible_hash");
    for bucket_size in [4usize, 16, 64] {
        group.throughput(Throughput::Elements(10_000));
        group.bench_function(format!("insert_grow_bucket_{}", bucket_size), |b| {
            b.iter_batched(
                || ExtendibleHashTable::<u64, u64>::new(bucket_size),
                |table| {
                    for i in 0..10_000u64 {
                        table.insert(std::hint::black_box(i), i);
                    }
                    table
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_find_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("extendible_hash");
    let table = ExtendibleHashTable::<u64, u64>::new(16);
    for i in 0..10_000u64 {
        table.insert(i, i);
    }
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("find_hit", |b| {
        b.iter(|| {
            for i in 0..10_000u64 {
                let _ = std::hint::black_box(table.find(&std::hint::black_box(i)));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_insert_grow, bench_find_hit);
criterion_main!(benches);
