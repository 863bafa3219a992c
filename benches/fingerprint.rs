//! Benchmarks for the OpenSubtitles fingerprint
//!
//! The hash reads at most 128 KiB, so time should stay flat as the file grows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Cursor;
use subkeeper::fingerprint::{fingerprint, fingerprint_reader};

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn bench_in_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint_reader");

    for len in [4 * 1024, 64 * 1024, 1024 * 1024, 16 * 1024 * 1024] {
        let data = sample(len);
        group.throughput(Throughput::Bytes(len.min(128 * 1024) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &data, |b, data| {
            b.iter(|| {
                let mut cursor = Cursor::new(black_box(data.as_slice()));
                fingerprint_reader(&mut cursor, data.len() as u64).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_file(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.mkv");
    std::fs::write(&path, sample(8 * 1024 * 1024)).unwrap();

    c.bench_function("fingerprint_file_8mib", |b| {
        b.iter(|| fingerprint(black_box(&path)).unwrap())
    });
}

criterion_group!(benches, bench_in_memory, bench_file);
criterion_main!(benches);
