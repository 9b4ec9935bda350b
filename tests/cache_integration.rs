//! Integration tests for the pattern cache and batch compilation

use retrace::engine::{
    compile_batch_parallel, CompilerOptions, Encoding, ExecutorKind, PatternCache, RegexSource,
};
use std::sync::Arc;

#[test]
fn test_cache_respects_options() {
    let cache = PatternCache::with_capacity(4, CompilerOptions::default().with_force_backtracking(true));
    let matcher = cache.get_or_compile("a|b", "").unwrap();
    assert_eq!(matcher.kind(), ExecutorKind::Backtracking);
    assert_eq!(cache.capacity(), 4);
}

#[test]
fn test_encoding_is_part_of_key() {
    let cache = PatternCache::default();
    let utf8 = cache
        .get_or_compile_source(RegexSource::parse("[^a]", "").unwrap())
        .unwrap();
    let latin1 = cache
        .get_or_compile_source(RegexSource::parse("[^a]", "").unwrap().with_encoding(Encoding::Latin1))
        .unwrap();
    assert!(!Arc::ptr_eq(&utf8, &latin1));
    assert_eq!(cache.stats().misses, 2);
}

#[test]
fn test_cache_clear_keeps_counters() {
    let cache = PatternCache::default();
    cache.get_or_compile("x+", "").unwrap();
    cache.get_or_compile("x+", "").unwrap();
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn test_batch_matches_individual_compiles() {
    let patterns = [("(a)(b)", ""), ("a(?!c)", ""), ("", ""), ("[", "")];
    let results = compile_batch_parallel(&patterns, CompilerOptions::default());
    assert_eq!(results.len(), patterns.len());
    for ((pattern, flags), result) in patterns.iter().zip(&results) {
        let single = retrace::compile(pattern, flags, CompilerOptions::default());
        match (result, single) {
            (Ok(batch), Ok(single)) => {
                assert_eq!(batch.kind(), single.kind(), "{pattern}");
                assert_eq!(batch.stats(), single.stats(), "{pattern}");
            }
            (Err(batch), Err(single)) => assert_eq!(batch, &single),
            _ => panic!("batch and single compile disagree on {pattern}"),
        }
    }
}
