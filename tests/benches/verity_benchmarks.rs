//! # Block-Verity Benchmarks
//!
//! | Operation | Measures |
//! |-----------|----------|
//! | Tree build | Formatting throughput over an in-memory image |
//! | Cold read | Full verification with an empty hash cache |
//! | Warm read | Data hashing only, tree path already verified |
//! | Parallel read | `read_many` across the worker pool |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

use verity_engine::test_utils::{patterned_data, Fixture};
use verity_engine::{
    BlockVerityApi, HashTreeBuilder, MemoryRegion, ReadRequest, VerityConfig, VerityConfigBuilder,
    VerityDependencies, VerityTarget,
};

const BLOCK_SIZE: u32 = 4096;

fn config(blocks: u64, algorithm: &str) -> VerityConfig {
    VerityConfigBuilder::new()
        .block_sizes(BLOCK_SIZE, BLOCK_SIZE)
        .data_block_count(blocks)
        .algorithm(algorithm)
        .salt(b"bench-salt".to_vec())
        .build_unrooted()
        .unwrap()
}

fn target(fixture: &Fixture) -> VerityTarget {
    VerityTarget::new(
        fixture.config.clone(),
        VerityDependencies::new(fixture.data.clone(), fixture.hash.clone()),
    )
    .unwrap()
}

// ============================================================================
// Tree build
// ============================================================================

fn bench_tree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree-build");
    group.measurement_time(Duration::from_secs(10));

    for blocks in [256u64, 4096] {
        let data = MemoryRegion::new(BLOCK_SIZE as usize, patterned_data(blocks, BLOCK_SIZE as usize));
        group.throughput(Throughput::Bytes(blocks * BLOCK_SIZE as u64));
        for algorithm in ["sha256", "blake3"] {
            let builder = HashTreeBuilder::from_config(&config(blocks, algorithm)).unwrap();
            group.bench_with_input(BenchmarkId::new(algorithm, blocks), &data, |b, data| {
                b.iter(|| black_box(builder.build(data).unwrap()))
            });
        }
    }
    group.finish();
}

// ============================================================================
// Reads
// ============================================================================

fn bench_reads(c: &mut Criterion) {
    let blocks = 4096u64;
    let fixture = Fixture::build(config(blocks, "sha256"), patterned_data(blocks, BLOCK_SIZE as usize));

    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Bytes(64 * BLOCK_SIZE as u64));

    group.bench_function("cold_64_blocks", |b| {
        b.iter_with_setup(
            || target(&fixture),
            |target| black_box(target.read_blocks(1024, 64).unwrap()),
        )
    });

    let warm = target(&fixture);
    warm.read_blocks(1024, 64).unwrap();
    group.bench_function("warm_64_blocks", |b| {
        b.iter(|| black_box(warm.read_blocks(1024, 64).unwrap()))
    });

    let requests: Vec<ReadRequest> = (0..16).map(|i| ReadRequest::new(i * 256, 64)).collect();
    group.throughput(Throughput::Bytes(16 * 64 * BLOCK_SIZE as u64));
    group.bench_function("parallel_16x64_blocks", |b| {
        b.iter(|| black_box(warm.read_many(&requests)))
    });
    group.finish();
}

fn bench_shared_target(c: &mut Criterion) {
    let blocks = 1024u64;
    let fixture = Fixture::build(config(blocks, "sha256"), patterned_data(blocks, BLOCK_SIZE as usize));
    let target = Arc::new(target(&fixture));

    c.bench_function("read/threads_4x16_blocks", |b| {
        b.iter(|| {
            std::thread::scope(|s| {
                for t in 0..4u64 {
                    let target = target.clone();
                    s.spawn(move || black_box(target.read_blocks(t * 256, 16).unwrap()));
                }
            })
        })
    });
}

criterion_group!(benches, bench_tree_build, bench_reads, bench_shared_target);
criterion_main!(benches);
