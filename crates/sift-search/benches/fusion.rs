use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sift_search::{RrfConfig, fuse, fuse_hybrid};
use sift_store::ScoredChunk;
use std::hint::black_box;

fn ranked(count: usize, offset: usize) -> Vec<ScoredChunk> {
    (0..count)
        .map(|i| ScoredChunk {
            chunk_id: format!("{:016x}", (i + offset) * 7919),
            score: 1.0 / (i as f32 + 1.0),
        })
        .collect()
}

fn fuse_two_sources(c: &mut Criterion) {
    let mut group = c.benchmark_group("fuse_hybrid");
    let config = RrfConfig::default();

    for count in [10, 50, 200, 1000] {
        let sparse = ranked(count, 0);
        let dense = ranked(count, count / 2);
        group.bench_with_input(BenchmarkId::new("results", count), &count, |b, _| {
            b.iter(|| fuse_hybrid(black_box(&sparse), black_box(&dense), &config));
        });
    }

    group.finish();
}

fn fuse_many_sources(c: &mut Criterion) {
    let mut group = c.benchmark_group("fuse_sources");

    for sources in [2, 4, 8] {
        let lists: Vec<Vec<ScoredChunk>> = (0..sources).map(|s| ranked(100, s * 13)).collect();
        group.bench_with_input(BenchmarkId::new("sources", sources), &sources, |b, _| {
            b.iter(|| fuse(black_box(&lists), &[], 60));
        });
    }

    group.finish();
}

criterion_group!(benches, fuse_two_sources, fuse_many_sources);
criterion_main!(benches);
