//! Benchmarks for block-list store operations.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use runebuf::address::Address;
use runebuf::runes::Runes;
use runebuf::store::Bytes;

fn filled(block_size: usize, len: usize) -> Bytes {
    let mut b = Bytes::new(block_size);
    b.insert(&vec![b'x'; len], 0).unwrap();
    b
}

fn bench_interior_insert(c: &mut Criterion) {
    c.bench_function("interior_insert", |b| {
        b.iter_batched(
            || filled(4096, 1 << 20),
            |mut store| store.insert(black_box(b"hello"), 500_001).unwrap(),
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_delete_range(c: &mut Criterion) {
    c.bench_function("delete_range", |b| {
        b.iter_batched(
            || filled(4096, 1 << 20),
            |mut store| store.delete(black_box(100_000), 123_456).unwrap(),
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_read_across_blocks(c: &mut Criterion) {
    let store = filled(256, 1 << 20);
    c.bench_function("read_across_blocks", |b| {
        b.iter(|| store.read(black_box(Address::new(1000, 65_000))).unwrap())
    });
}

fn bench_runes_round_trip(c: &mut Criterion) {
    let text = "Grüße, 世界! ".repeat(10_000);
    c.bench_function("runes_round_trip", |b| {
        b.iter(|| {
            let mut runes = Runes::new(1024);
            runes.read_from(black_box(text.as_bytes())).unwrap();
            let mut out = Vec::with_capacity(text.len());
            runes.write_to(&mut out).unwrap();
            out
        })
    });
}

criterion_group!(
    benches,
    bench_interior_insert,
    bench_delete_range,
    bench_read_across_blocks,
    bench_runes_round_trip
);
criterion_main!(benches);
