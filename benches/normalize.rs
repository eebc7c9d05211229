//! Benchmarks for entry normalization and desired-set construction.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use relaysync::cidr::{normalize, NormalizeOptions};
use relaysync::fetcher::parse_lines;
use relaysync::reconciler::{desired_set, diff_sets, partition_entries};

/// Mixed IPv4/IPv6 feed lines with a sprinkling of invalid entries
fn generate_entries(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 10 {
            0..=5 => format!("{}.{}.{}.0/24", 1 + i % 223, (i / 256) % 256, i % 256),
            6 => format!("{}.{}.{}.{}", 1 + i % 223, (i / 256) % 256, i % 256, i % 250),
            7 | 8 => format!("2001:db8:{:x}:{:x}::/64", (i / 65536) % 65536, i % 65536),
            _ => format!("bogus-{}", i),
        })
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    let opts = NormalizeOptions::default();

    for size in [100, 1000, 10000, 50000] {
        let entries = generate_entries(size);
        group.bench_with_input(BenchmarkId::new("entries", size), &entries, |b, entries| {
            b.iter(|| {
                black_box(
                    entries
                        .iter()
                        .filter_map(|e| normalize(e, opts))
                        .count(),
                )
            });
        });
    }

    group.finish();
}

fn bench_desired_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("desired_set");
    let opts = NormalizeOptions::default();

    for size in [1000, 10000, 50000] {
        let body = generate_entries(size).join("\n");
        group.bench_with_input(BenchmarkId::new("feed_to_set", size), &body, |b, body| {
            b.iter(|| {
                let raw = parse_lines(body);
                let partition = partition_entries(&raw, opts);
                black_box(desired_set(&partition.normalized))
            });
        });
    }

    group.finish();
}

fn bench_diff(c: &mut Criterion) {
    let opts = NormalizeOptions::default();
    let entries = generate_entries(20_000);
    let desired = desired_set(&partition_entries(&entries, opts).normalized);
    let mut existing = desired.clone();
    existing.truncate(desired.len() - 500);
    existing.reverse();

    c.bench_function("diff_20000", |b| {
        b.iter(|| black_box(diff_sets(&desired, &existing)))
    });
}

criterion_group!(benches, bench_normalize, bench_desired_set, bench_diff);
criterion_main!(benches);
