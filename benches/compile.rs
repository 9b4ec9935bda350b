//! Compilation benchmarks
//!
//! One pattern per executor kind, plus the trace finder, node splitting and
//! cache paths.
//!
//! Run with: cargo bench --bench compile

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use retrace::engine::{compile, CompilerOptions, PatternCache};

const PATTERNS: &[(&str, &str)] = &[
    ("literal", "hello world"),
    ("alternation", "foo|bar|baz|qux"),
    ("trace_finder", r"(\d{3})-(\d{4})"),
    ("capture_dfa", r"([a-z]+)@([a-z]+)\.(com|org|net)"),
    ("backtracking", r"(\w+)\s+\1"),
    ("look_around", r"\d+(?=px)"),
];

fn bench_compile(c: &mut Criterion) {
    let mut g = c.benchmark_group("compile");
    for (name, pattern) in PATTERNS {
        g.bench_function(*name, |b| {
            b.iter(|| compile(black_box(pattern), "", CompilerOptions::default()))
        });
    }
    g.finish();
}

fn bench_options(c: &mut Criterion) {
    let mut g = c.benchmark_group("options");
    let pattern = "(ab|a)*(c|d)+e";
    g.bench_function("default", |b| {
        b.iter(|| compile(black_box(pattern), "", CompilerOptions::default()))
    });
    g.bench_function("node_splitting", |b| {
        let options = CompilerOptions::default().with_node_splitting(true);
        b.iter(|| compile(black_box(pattern), "", options))
    });
    g.bench_function("boolean_match_only", |b| {
        let options = CompilerOptions::default().with_boolean_match_only(true);
        b.iter(|| compile(black_box(pattern), "", options))
    });
    g.finish();
}

fn bench_cache(c: &mut Criterion) {
    let cache = PatternCache::default();
    c.bench_function("cache_hit", |b| {
        b.iter(|| cache.get_or_compile(black_box(r"([a-z]+)@([a-z]+)"), "i"))
    });
}

criterion_group!(benches, bench_compile, bench_options, bench_cache);
criterion_main!(benches);
