//! Benchmarks for searchbench metrics and reference-backend hot paths

use std::sync::LazyLock;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-Z0-9]+").unwrap());

/// Generate sample documents for benchmarking
fn generate_docs(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            format!(
                "Document {} about search engines, inverted indexes, vector \
                 quantization and approximate nearest neighbor graphs.",
                i
            )
        })
        .collect()
}

/// Deterministic pseudo-random latencies in milliseconds
fn generate_latencies(count: usize) -> Vec<f64> {
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            0.5 + (state % 10_000) as f64 / 1000.0
        })
        .collect()
}

fn precision(returned: &[u64], expected: &[u64], k: usize) -> f64 {
    let expected: FxHashSet<u64> = expected.iter().copied().collect();
    let returned: FxHashSet<u64> = returned.iter().copied().collect();
    returned.intersection(&expected).count() as f64 / k as f64
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// Benchmark per-query precision at typical top-k sizes
fn bench_precision(c: &mut Criterion) {
    let mut group = c.benchmark_group("precision");

    for k in [10usize, 100, 1000].iter() {
        let expected: Vec<u64> = (0..*k as u64).collect();
        let returned: Vec<u64> = (*k as u64 / 2..*k as u64 * 3 / 2).collect();

        group.bench_with_input(BenchmarkId::from_parameter(k), k, |b, &k| {
            b.iter(|| black_box(precision(black_box(&returned), black_box(&expected), k)));
        });
    }
    group.finish();
}

/// Benchmark the latency summary over a measured run
fn bench_latency_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("latency_stats");

    for size in [1_000usize, 10_000, 100_000].iter() {
        let latencies = generate_latencies(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut sorted = latencies.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
                let var = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>()
                    / sorted.len() as f64;
                black_box((mean, var.sqrt(), percentile(&sorted, 95.0), percentile(&sorted, 99.0)))
            });
        });
    }
    group.finish();
}

/// Benchmark the posting-list build used by the memory backend's BM25 index
fn bench_bm25_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_build");

    for size in [100, 1000, 10000].iter() {
        let docs = generate_docs(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut postings: FxHashMap<String, Vec<(usize, u32)>> = FxHashMap::default();

                for (row, doc) in docs.iter().enumerate() {
                    let mut counts: FxHashMap<String, u32> = FxHashMap::default();
                    for m in TOKEN_REGEX.find_iter(doc) {
                        let token = m.as_str().to_lowercase();
                        if token.len() > 1 {
                            *counts.entry(token).or_insert(0) += 1;
                        }
                    }
                    for (term, count) in counts {
                        postings.entry(term).or_default().push((row, count));
                    }
                }
                black_box(postings)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_precision, bench_latency_stats, bench_bm25_build);

criterion_main!(benches);
