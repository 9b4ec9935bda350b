//! Property-based tests using proptest
//!
//! The automaton executor, the backtracking executor and the `regex` crate
//! must agree on match bounds and capture groups for patterns whose
//! semantics coincide across engines.

use proptest::prelude::*;
use retrace::engine::{compile, CompiledMatcher, CompilerOptions, ExecutorKind};

type Groups = Option<Vec<Option<(usize, usize)>>>;

const PATTERNS: &[&str] = &[
    "a(b|c)*d",
    "(ab|a)(bc|c)?",
    "x*(y+)z?",
    "([a-c]+)-([0-9]{2,3})",
    "(a|ab)(c|bcd)(d*)",
    "a+?b",
];

fn run(matcher: &CompiledMatcher, input: &str, from: usize) -> Groups {
    let m = matcher.exec(input, from)?;
    Some((0..matcher.number_of_capture_groups()).map(|g| m.group(g)).collect())
}

fn oracle(pattern: &str, input: &str, from: usize) -> Groups {
    let re = regex::Regex::new(pattern).expect("oracle pattern");
    let caps = re.captures_at(input, from)?;
    Some(
        (0..caps.len())
            .map(|g| caps.get(g).map(|m| (m.start(), m.end())))
            .collect(),
    )
}

fn matchers(pattern: &str) -> (CompiledMatcher, CompiledMatcher) {
    let automaton = compile(pattern, "", CompilerOptions::default()).unwrap();
    let forced = CompilerOptions::default().with_force_backtracking(true);
    let backtracking = compile(pattern, "", forced).unwrap();
    (automaton, backtracking)
}

#[test]
fn test_patterns_select_automaton() {
    for pattern in PATTERNS {
        let (automaton, backtracking) = matchers(pattern);
        assert_eq!(automaton.kind(), ExecutorKind::Automaton, "{pattern}");
        assert_eq!(backtracking.kind(), ExecutorKind::Backtracking, "{pattern}");
    }
}

// =============================================================================
// Engine Agreement
// =============================================================================

proptest! {
    /// Automaton and backtracking agree on every pattern
    #[test]
    fn test_automaton_matches_backtracking(input in "[abcdxyz0-9-]{0,16}") {
        for pattern in PATTERNS {
            let (automaton, backtracking) = matchers(pattern);
            prop_assert_eq!(run(&automaton, &input, 0), run(&backtracking, &input, 0), "{}", pattern);
        }
    }

    /// Both executors agree with the regex crate
    #[test]
    fn test_matches_regex_crate(input in "[abcdxyz0-9-]{0,16}", from in 0usize..4) {
        let from = from.min(input.len());
        for pattern in PATTERNS {
            let (automaton, backtracking) = matchers(pattern);
            let expected = oracle(pattern, &input, from);
            prop_assert_eq!(run(&automaton, &input, from), expected.clone(), "{}", pattern);
            prop_assert_eq!(run(&backtracking, &input, from), expected, "{}", pattern);
        }
    }

    /// Node splitting never changes a result
    #[test]
    fn test_node_splitting_equivalence(input in "[abcd]{0,12}") {
        let split = CompilerOptions::default().with_node_splitting(true);
        for pattern in ["a(b|c)*d", "(ab|a)(bc|c)?", "(a|ab)(c|bcd)(d*)"] {
            let plain = compile(pattern, "", CompilerOptions::default()).unwrap();
            let with_split = compile(pattern, "", split).unwrap();
            prop_assert_eq!(run(&plain, &input, 0), run(&with_split, &input, 0), "{}", pattern);
        }
    }

    /// A literal pattern finds the same occurrence as `str::find`
    #[test]
    fn test_literal_matches_str_find(haystack in "[ab]{0,20}", needle in "[ab]{1,3}") {
        let matcher = compile(&needle, "", CompilerOptions::default()).unwrap();
        prop_assert_eq!(matcher.kind(), ExecutorKind::Literal);
        let expected = haystack.find(needle.as_str()).map(|start| (start, start + needle.len()));
        let found = matcher.exec(&haystack, 0).and_then(|m| m.group(0));
        prop_assert_eq!(found, expected);
    }

    /// Boolean-only matchers agree with full matchers on existence
    #[test]
    fn test_boolean_only_agrees(input in "[abcdxyz0-9-]{0,16}") {
        let boolean = CompilerOptions::default().with_boolean_match_only(true);
        for pattern in PATTERNS {
            let full = compile(pattern, "", CompilerOptions::default()).unwrap();
            let quick = compile(pattern, "", boolean).unwrap();
            prop_assert_eq!(full.is_match(&input, 0), quick.is_match(&input, 0), "{}", pattern);
        }
    }
}
