//! Integration tests for the compilation pipeline
//!
//! These tests cover executor selection and the observable behavior of every
//! executor kind:
//! - Dead and literal shortcuts
//! - Automaton matching with trace finder and capture DFA
//! - Backtracking fallback for unsupported features and size ceilings
//! - Named groups, flavors, flags and debug dumps

use retrace::engine::{
    compile, compile_source, ArtifactFormat, CollectingSink, CompilationLimits, CompilerOptions,
    ExecutorKind, Flavor, RegexSource,
};

fn groups(pattern: &str, flags: &str, options: CompilerOptions, input: &str) -> Option<Vec<Option<(usize, usize)>>> {
    let matcher = compile(pattern, flags, options).expect("pattern should compile");
    let m = matcher.exec(input, 0)?;
    Some((0..matcher.number_of_capture_groups()).map(|g| m.group(g)).collect())
}

// ============================================================================
// Executor Selection Tests
// ============================================================================

#[test]
fn test_dead_pattern() {
    let matcher = compile("[^\\x00-\\u{10FFFF}]", "u", CompilerOptions::default()).unwrap();
    assert!(matcher.is_dead());
    assert_eq!(matcher.kind(), ExecutorKind::Dead);
    assert!(!matcher.is_match("", 0));
    assert!(!matcher.is_match("anything", 0));
}

#[test]
fn test_literal_versus_alternation() {
    let literal = compile("abc", "", CompilerOptions::default()).unwrap();
    assert_eq!(literal.kind(), ExecutorKind::Literal);
    assert_eq!(literal.exec("xxabcabc", 0).unwrap().group(0), Some((2, 5)));
    assert_eq!(literal.exec("xxabcabc", 3).unwrap().group(0), Some((5, 8)));

    let alternation = compile("a|b", "", CompilerOptions::default()).unwrap();
    assert_eq!(alternation.kind(), ExecutorKind::Automaton);
    assert_eq!(alternation.exec("xxb", 0).unwrap().group(0), Some((2, 3)));
}

#[test]
fn test_look_around_uses_backtracking() {
    let matcher = compile("a(?=b)", "", CompilerOptions::default()).unwrap();
    assert_eq!(matcher.kind(), ExecutorKind::Backtracking);
    assert!(matcher.stats().notes.iter().any(|n| n.contains("look")));
    assert_eq!(matcher.exec("acab", 0).unwrap().group(0), Some((2, 3)));
    assert!(!matcher.is_match("ac", 0));
}

#[test]
fn test_deep_bounded_repetition_uses_backtracking() {
    let matcher = compile("(?:a{1,60}){1,60}b", "", CompilerOptions::default()).unwrap();
    assert_eq!(matcher.kind(), ExecutorKind::Backtracking);
    assert!(matcher.stats().notes.iter().any(|n| n.contains("NFA")));
    assert_eq!(matcher.exec("xaaab", 0).unwrap().group(0), Some((1, 5)));
}

#[test]
fn test_capture_group_ceiling_uses_backtracking() {
    let pattern = format!("{}|b+", "(a)".repeat(128));
    let matcher = compile(&pattern, "", CompilerOptions::default()).unwrap();
    assert_eq!(matcher.kind(), ExecutorKind::Backtracking);
    assert_eq!(matcher.number_of_capture_groups(), 129);
    assert!(matcher
        .stats()
        .notes
        .iter()
        .any(|n| n == "too many capture groups for DFA tracking: 129 exceeds limit of 127"));
    let m = matcher.exec("xbb", 0).unwrap();
    assert_eq!(m.group(0), Some((1, 3)));
    assert_eq!(m.group(128), None);
}

#[test]
fn test_thread_ceiling_uses_backtracking() {
    let alternatives: Vec<String> = (1..=6).map(|n| "a".repeat(n)).collect();
    let pattern = format!("(?:{}){{1,60}}$(x)?", alternatives.join("|"));
    let matcher = compile(&pattern, "", CompilerOptions::default()).unwrap();
    assert_eq!(matcher.kind(), ExecutorKind::Backtracking);
    assert!(matcher.stats().notes.iter().any(|n| {
        n.starts_with("too many NFA states in one DFA state") && n.ends_with("exceeds limit of 255")
    }));
    let m = matcher.exec("baaaa", 0).unwrap();
    assert_eq!(m.group(0), Some((1, 5)));
    assert_eq!(m.group(1), None);
    assert!(!matcher.is_match("aab", 0));
}

#[test]
fn test_oversized_tree_uses_backtracking() {
    let limits = CompilationLimits::default().with_max_parse_tree_size(3);
    let options = CompilerOptions::default().with_limits(limits);
    let matcher = compile("ab|cd", "", options).unwrap();
    assert_eq!(matcher.kind(), ExecutorKind::Backtracking);
    assert!(matcher.stats().notes[0].contains("parse tree"));
    assert_eq!(matcher.exec("xcd", 0).unwrap().group(0), Some((1, 3)));
}

#[test]
fn test_forced_backtracking_skips_literal() {
    let options = CompilerOptions::default().with_force_backtracking(true);
    let matcher = compile("abc", "", options).unwrap();
    assert_eq!(matcher.kind(), ExecutorKind::Backtracking);
    assert!(matcher.is_match("zabc", 0));

    let dead = compile("a[]", "", options).unwrap();
    assert_eq!(dead.kind(), ExecutorKind::Dead);
}

// ============================================================================
// Capture Group Tests
// ============================================================================

#[test]
fn test_trace_finder_captures() {
    let matcher = compile("(a)(b)", "", CompilerOptions::default()).unwrap();
    assert_eq!(matcher.kind(), ExecutorKind::Automaton);
    assert!(matcher.stats().trace_finder_results >= 1);
    assert_eq!(
        groups("(a)(b)", "", CompilerOptions::default(), "zzab"),
        Some(vec![Some((2, 4)), Some((2, 3)), Some((3, 4))])
    );
}

#[test]
fn test_optional_group_absent() {
    assert_eq!(
        groups("(a)|(b)", "", CompilerOptions::default(), "b"),
        Some(vec![Some((0, 1)), None, Some((0, 1))])
    );
}

#[test]
fn test_capture_dfa_matches_backtracking() {
    let forced = CompilerOptions::default().with_force_backtracking(true);
    for (pattern, input) in [
        ("(a+)(b*)c", "xaabbc"),
        ("(a|ab)(c|bcd)", "abcd"),
        ("(x*)(y+)", "xxyyy"),
        ("((a)|b)+", "abab"),
    ] {
        assert_eq!(
            groups(pattern, "", CompilerOptions::default(), input),
            groups(pattern, "", forced, input),
            "{pattern} on {input}"
        );
    }
}

#[test]
fn test_named_groups_across_kinds() {
    let expected: Vec<(String, usize)> = vec![("x".to_string(), 1), ("y".to_string(), 2)];
    for pattern in ["(?<x>a)(?<y>b)", "(?<x>a)(?<y>b)(?=c)", "(?<x>a+)(?<y>b)"] {
        let matcher = compile(pattern, "", CompilerOptions::default()).unwrap();
        let names: Vec<(String, usize)> = matcher
            .named_capture_groups()
            .iter()
            .map(|(name, &index)| (name.clone(), index))
            .collect();
        assert_eq!(names, expected, "{pattern}");
        assert_eq!(matcher.number_of_capture_groups(), 3);
    }
}

#[test]
fn test_multibyte_offsets() {
    let matcher = compile("(é)(b+)", "", CompilerOptions::default()).unwrap();
    let m = matcher.exec("caébb", 0).unwrap();
    assert_eq!(m.group(1), Some((2, 4)));
    assert_eq!(m.group(2), Some((4, 6)));
}

// ============================================================================
// Flags and Flavors
// ============================================================================

#[test]
fn test_sticky_flag() {
    let matcher = compile("a+", "y", CompilerOptions::default()).unwrap();
    assert!(matcher.exec("baa", 0).is_none());
    assert_eq!(matcher.exec("baa", 1).unwrap().group(0), Some((1, 3)));
}

#[test]
fn test_ignore_case() {
    let matcher = compile("ab+c", "i", CompilerOptions::default()).unwrap();
    assert!(matcher.is_match("xABbC", 0));
    assert!(!matcher.is_match("xAC", 0));
}

#[test]
fn test_python_flavor() {
    let source = RegexSource::parse("(?P<word>a+)(?P=word)", "")
        .unwrap()
        .with_flavor(Flavor::Python);
    let matcher = compile_source(source, CompilerOptions::default(), None).unwrap();
    assert_eq!(matcher.kind(), ExecutorKind::Backtracking);
    assert_eq!(matcher.named_capture_groups().get("word"), Some(&1));
    assert_eq!(matcher.exec("xaaaa", 0).unwrap().group(1), Some((1, 3)));

    let ecma = RegexSource::parse("(?P<word>a)", "").unwrap();
    assert!(compile_source(ecma, CompilerOptions::default(), None).is_err());
}

#[test]
fn test_python_inline_flags() {
    let python = |pattern: &str| {
        let source = RegexSource::parse(pattern, "").unwrap().with_flavor(Flavor::Python);
        compile_source(source, CompilerOptions::default(), None).unwrap()
    };

    let global = python("abc(?i)");
    assert_eq!(global.exec("xABC", 0).unwrap().group(0), Some((1, 4)));

    let scoped = python("a(?i:b)c");
    assert!(scoped.is_match("aBc", 0));
    assert!(!scoped.is_match("ABc", 0));
    assert!(!scoped.is_match("aBC", 0));

    let verbose = python("(?x) (\\d+)  # digits\n - (\\d+)");
    let m = verbose.exec("tel 555-0199", 0).unwrap();
    assert_eq!(m.group(1), Some((4, 7)));
    assert_eq!(m.group(2), Some((8, 12)));

    let back_reference = python("(?i)(a)(?-i:\\1)");
    assert!(back_reference.is_match("AA", 0));
    assert!(!back_reference.is_match("Aa", 0));
}

#[test]
fn test_syntax_error_reports_position() {
    let err = compile("ab[c", "", CompilerOptions::default()).unwrap_err();
    assert_eq!(err.position(), 2);
    assert!(err.syntax_error().format_with_pattern().ends_with('^'));
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_stats_are_deterministic() {
    for pattern in ["(a|b)*c(d)", "a(?=b)c", "abc", "x{2,4}y"] {
        let first = compile(pattern, "", CompilerOptions::default()).unwrap();
        let second = compile(pattern, "", CompilerOptions::default()).unwrap();
        assert_eq!(first.stats(), second.stats(), "{pattern}");
    }
}

#[test]
fn test_node_splitting_preserves_results() {
    let split = CompilerOptions::default().with_node_splitting(true);
    for (pattern, input) in [("(ab|a)*c", "ababac"), ("a(b|cd)*e", "xacdbbe"), ("(a+b)+", "aabab")] {
        let plain = groups(pattern, "", CompilerOptions::default(), input);
        let with_split = groups(pattern, "", split, input);
        assert_eq!(plain, with_split, "{pattern}");
        let matcher = compile(pattern, "", split).unwrap();
        assert!(matcher.stats().forward_dfa_states_before_splitting.is_some());
    }
}

#[test]
fn test_dumps_do_not_change_results() {
    let mut sink = CollectingSink::new();
    let options = CompilerOptions::default().with_dump_automata(true);
    let source = RegexSource::parse("(a+)(b)", "").unwrap();
    let dumped = compile_source(source, options, Some(&mut sink)).unwrap();
    let plain = compile("(a+)(b)", "", CompilerOptions::default()).unwrap();

    assert_eq!(dumped.stats(), plain.stats());
    assert_eq!(dumped.exec("aab", 0), plain.exec("aab", 0));
    assert!(sink.find("dfa_captures", ArtifactFormat::Dot).is_some());
    assert!(sink
        .find("nfa_forward", ArtifactFormat::Json)
        .is_some_and(|a| a.content.starts_with('{')));
}
