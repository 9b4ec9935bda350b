//! Matching benchmarks
//!
//! Compares executor kinds on the same haystack, and the automaton against a
//! forced backtracking build of the same pattern.
//!
//! Run with: cargo bench --bench exec

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use retrace::engine::{compile, CompiledMatcher, CompilerOptions};

fn haystack() -> String {
    let mut text = String::new();
    for i in 0..200 {
        text.push_str(&format!("user{}@example{}.org call 555-{:04} ", i, i % 7, i));
    }
    text.push_str("needle");
    text
}

fn scan_all(matcher: &CompiledMatcher, input: &str) -> usize {
    let mut count = 0;
    let mut from = 0;
    while let Some(m) = matcher.exec(input, from) {
        count += 1;
        let Some((start, end)) = m.group(0) else {
            break;
        };
        from = if end > start { end } else { end + 1 };
        if from > input.len() {
            break;
        }
    }
    count
}

fn bench_kinds(c: &mut Criterion) {
    let text = haystack();
    let mut g = c.benchmark_group("exec");
    g.throughput(Throughput::Bytes(text.len() as u64));
    for (name, pattern) in [
        ("literal", "needle"),
        ("automaton", r"([a-z]+)(\d+)@"),
        ("trace_finder", r"(\d{3})-(\d{4})"),
        ("backtracking", r"\d+(?= )"),
    ] {
        let matcher = compile(pattern, "", CompilerOptions::default()).unwrap();
        g.bench_function(name, |b| b.iter(|| scan_all(&matcher, black_box(&text))));
    }
    g.finish();
}

fn bench_automaton_vs_backtracking(c: &mut Criterion) {
    let text = haystack();
    let pattern = r"(\w+)@(\w+)\.org";
    let automaton = compile(pattern, "", CompilerOptions::default()).unwrap();
    let forced = CompilerOptions::default().with_force_backtracking(true);
    let backtracking = compile(pattern, "", forced).unwrap();

    let mut g = c.benchmark_group("captures");
    g.throughput(Throughput::Bytes(text.len() as u64));
    g.bench_function("automaton", |b| b.iter(|| scan_all(&automaton, black_box(&text))));
    g.bench_function("backtracking", |b| {
        b.iter(|| scan_all(&backtracking, black_box(&text)))
    });
    g.finish();
}

criterion_group!(benches, bench_kinds, bench_automaton_vs_backtracking);
criterion_main!(benches);
