//! Marshalling micro-benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use girder_bridge::ffi::marshal::{BorrowedBytes, MarshalContext};

fn bench_encode_str(c: &mut Criterion) {
    c.bench_function("marshal/encode_str", |b| {
        b.iter(|| {
            let mut ctx = MarshalContext::new();
            let ptr = ctx.encode_str(black_box("the quick brown fox")).unwrap();
            black_box(ptr);
        })
    });
}

fn bench_borrowed_bytes(c: &mut Criterion) {
    let data = vec![0xa5u8; 4096];
    c.bench_function("marshal/borrowed_bytes_4k", |b| {
        b.iter(|| {
            let buffer = BorrowedBytes::from_slice(black_box(&data));
            black_box((buffer.as_ptr(), buffer.len()));
        })
    });
}

criterion_group!(benches, bench_encode_str, bench_borrowed_bytes);
criterion_main!(benches);
