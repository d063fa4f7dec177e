//! Codec benchmarks for ephemera-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use ephemera_protocol::{codec, render};

fn bench_encode_small(c: &mut Criterion) {
    let body = "x".repeat(64);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("small_64B", |b| {
        b.iter(|| codec::encode(black_box("alice"), black_box(&body), false))
    });
    group.finish();
}

fn bench_decode_small(c: &mut Criterion) {
    let encoded = codec::encode("alice", &"x".repeat(64), false).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("small_64B", |b| {
        b.iter(|| codec::decode(black_box(&encoded)))
    });
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let body = "<b>hello</b> & welcome ".repeat(8);

    c.bench_function("render_escaped_184B", |b| {
        b.iter(|| render::render(black_box("alice"), black_box(&body), false))
    });
}

criterion_group!(benches, bench_encode_small, bench_decode_small, bench_render);
criterion_main!(benches);
