//! Compilation orchestrator
//!
//! A [`CompilationRequest`] owns everything one pattern needs (source,
//! options, scratch buffers, statistics) and runs the phases in a fixed
//! order:
//!
//! ```text
//! parse -> post-process -> properties -> dead? -> literal? -> NFA -> DFA (+ trace finder)
//!                 |                                             |
//!                 +------------------- bailout -----------------+--> backtracking
//! ```
//!
//! Syntax errors are returned unchanged. Every [`Bailout`] is caught here
//! and turns into a fallback; the reason is kept in
//! [`CompilationStats::notes`].
//!
//! # Example
//!
//! ```
//! use retrace::engine::{compile, CompilerOptions, ExecutorKind};
//!
//! let matcher = compile("(a)(b)", "", CompilerOptions::default()).unwrap();
//! assert_eq!(matcher.kind(), ExecutorKind::Automaton);
//! let m = matcher.exec("xab", 0).unwrap();
//! assert_eq!(m.group(2), Some((2, 3)));
//! ```

use super::ast::RegexAst;
use super::backtrack::build_backtracking;
use super::buffer::CompilationBuffer;
use super::debug::{self, ArtifactFormat, DebugArtifact, DebugSink};
use super::dfa::{build_dfa, Dfa, DfaMode};
use super::error::{Bailout, RegexError, UnsupportedFeature};
use super::executor::{AutomatonExecutor, CaptureStrategy, Executor, ExecutorKind, MatchResult};
use super::literal::{detect_literal, is_dead, LiteralExecutor};
use super::nfa::{build_nfa, Direction, PureNfa};
use super::node_split::split_nodes;
use super::options::{CompilationLimits, CompilerOptions};
use super::parser::parse;
use super::postprocess::post_process;
use super::properties::RegexProperties;
use super::source::{Flavor, RegexSource};
use super::trace_finder::{build_trace_finder, TraceFinder};
use serde::Serialize;
use std::collections::BTreeMap;

/// Structural statistics of one compilation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompilationStats {
    /// AST nodes after parsing
    pub ast_nodes: usize,
    /// AST nodes after post-processing
    pub processed_ast_nodes: usize,
    /// Nodes marked dead by pruning
    pub pruned_nodes: usize,
    /// Quantifiers expanded by unrolling
    pub unrolled_quantifiers: usize,
    /// Forward NFA states
    pub nfa_states: usize,
    /// Forward NFA transitions
    pub nfa_transitions: usize,
    /// Backward NFA states
    pub backward_nfa_states: usize,
    /// Forward search DFA states (after node splitting, if enabled)
    pub forward_dfa_states: usize,
    /// Forward search DFA states before node splitting
    pub forward_dfa_states_before_splitting: Option<usize>,
    /// Backward search DFA states
    pub backward_dfa_states: usize,
    /// Capture tracking DFA states
    pub capture_dfa_states: usize,
    /// Largest thread list in any DFA state
    pub max_dfa_threads: usize,
    /// Trace finder result table size
    pub trace_finder_results: usize,
    /// Trace finder DFA states
    pub trace_finder_states: usize,
    /// Backtracking states over all sub-executors
    pub backtracking_states: usize,
    /// Backtracking transitions over all sub-executors
    pub backtracking_transitions: usize,
    /// Bytes reserved by the scratch buffer at the end of compilation
    pub scratch_bytes: usize,
    /// Visited-set clears performed during subset construction
    pub scratch_resets: usize,
    /// Selected strategy
    pub strategy: Option<ExecutorKind>,
    /// Why fallbacks happened
    pub notes: Vec<String>,
}

/// Result of a compilation
#[derive(Debug, Clone, Serialize)]
pub struct CompiledMatcher {
    source: RegexSource,
    executor: Executor,
    capture_groups: usize,
    named_groups: BTreeMap<String, usize>,
    properties: Option<RegexProperties>,
    stats: CompilationStats,
}

impl CompiledMatcher {
    /// Pattern this matcher was compiled from
    pub fn source(&self) -> &RegexSource {
        &self.source
    }

    /// Whether the pattern can never match
    pub fn is_dead(&self) -> bool {
        matches!(self.executor, Executor::Dead)
    }

    /// Capture groups, including group 0
    pub fn number_of_capture_groups(&self) -> usize {
        self.capture_groups
    }

    /// Named groups and their indices
    pub fn named_capture_groups(&self) -> &BTreeMap<String, usize> {
        &self.named_groups
    }

    /// The terminal executor
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Strategy of the terminal executor
    pub fn kind(&self) -> ExecutorKind {
        self.executor.kind()
    }

    /// Pattern properties (`None` when post-processing bailed out)
    pub fn properties(&self) -> Option<&RegexProperties> {
        self.properties.as_ref()
    }

    /// Structural statistics
    pub fn stats(&self) -> &CompilationStats {
        &self.stats
    }

    /// Find the leftmost match at or after byte offset `from`
    pub fn exec(&self, input: &str, from: usize) -> Option<MatchResult> {
        self.executor.exec(input, from, self.source.flags.sticky)
    }

    /// Whether a match exists at or after byte offset `from`
    pub fn is_match(&self, input: &str, from: usize) -> bool {
        self.exec(input, from).is_some()
    }
}

/// One pattern's compilation
pub struct CompilationRequest<'a> {
    source: RegexSource,
    options: CompilerOptions,
    limits: CompilationLimits,
    buffer: CompilationBuffer,
    stats: CompilationStats,
    properties: Option<RegexProperties>,
    sink: Option<&'a mut dyn DebugSink>,
}

impl<'a> CompilationRequest<'a> {
    /// Create a request
    pub fn new(source: RegexSource, options: CompilerOptions) -> Self {
        Self {
            source,
            limits: options.limits.clamped(),
            options,
            buffer: CompilationBuffer::new(),
            stats: CompilationStats::default(),
            properties: None,
            sink: None,
        }
    }

    /// Send debug artifacts to `sink` when `dump_automata` is set
    pub fn with_sink(mut self, sink: &'a mut dyn DebugSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run every phase
    pub fn compile(mut self) -> Result<CompiledMatcher, RegexError> {
        let mut ast = parse(&self.source)?;
        self.stats.ast_nodes = ast.len();

        let executor = match post_process(&mut ast, &self.limits) {
            Ok(report) => {
                self.stats.processed_ast_nodes = ast.len();
                self.stats.pruned_nodes = report.pruned;
                self.stats.unrolled_quantifiers = report.unrolled;
                if self.dumping() {
                    self.dump("ast", debug::ast_to_dot(&ast), &ast);
                }
                self.select(&ast)
            }
            Err(bailout) => {
                // the tree is untouched; backtrack over it as parsed
                self.note(&bailout);
                self.backtracking(&ast)
            }
        };

        self.stats.strategy = Some(executor.kind());
        self.stats.scratch_bytes = self.buffer.memory_usage();
        self.stats.scratch_resets = self.buffer.resets();
        log_debug!(
            "compiled {} as {} ({} notes, {} scratch bytes)",
            self.source,
            executor.kind(),
            self.stats.notes.len(),
            self.stats.scratch_bytes
        );
        Ok(CompiledMatcher {
            capture_groups: ast.capture_groups(),
            named_groups: ast.named_groups().clone(),
            source: self.source,
            executor,
            properties: self.properties,
            stats: self.stats,
        })
    }

    /// Pick the executor for a post-processed tree
    fn select(&mut self, ast: &RegexAst) -> Executor {
        let properties = RegexProperties::analyze(ast);

        if is_dead(ast) {
            self.properties = Some(properties);
            return Executor::Dead;
        }
        if !self.options.force_backtracking {
            if let Some(literal) = detect_literal(ast) {
                if !(self.options.must_advance && literal.text.is_empty()) {
                    self.properties = Some(properties);
                    return Executor::Literal(LiteralExecutor::new(literal, ast.flags.sticky));
                }
            }
        }

        let executor = if self.options.force_backtracking {
            self.stats.notes.push("backtracking forced by options".to_string());
            self.backtracking(ast)
        } else if self.options.must_advance {
            self.note(&Bailout::Unsupported(UnsupportedFeature::MustAdvance));
            self.backtracking(ast)
        } else if !properties.is_automaton_eligible() {
            for feature in properties.blocking_features() {
                self.note(&Bailout::Unsupported(feature));
            }
            self.backtracking(ast)
        } else {
            match self.automaton(ast, &properties) {
                Ok(automaton) => Executor::Automaton(Box::new(automaton)),
                Err(bailout) => {
                    self.note(&bailout);
                    self.backtracking(ast)
                }
            }
        };
        self.properties = Some(properties);
        executor
    }

    fn automaton(&mut self, ast: &RegexAst, properties: &RegexProperties) -> Result<AutomatonExecutor, Bailout> {
        let limits = self.limits;
        let sticky = ast.flags.sticky;
        let boolean = self.options.boolean_match_only;
        let groups = ast.capture_groups();
        if !boolean && groups > limits.max_dfa_capture_groups {
            return Err(Bailout::TooManyCaptureGroups {
                groups,
                limit: limits.max_dfa_capture_groups,
            });
        }

        let forward_nfa = build_nfa(ast, Direction::Forward, &limits)?;
        self.stats.nfa_states = forward_nfa.len();
        self.stats.nfa_transitions = forward_nfa.transition_count();
        if self.dumping() {
            self.dump("nfa_forward", debug::nfa_to_dot(&forward_nfa), &forward_nfa);
        }

        let mut forward = build_dfa(&forward_nfa, DfaMode::forward_search(!sticky), &limits, &mut self.buffer)?;
        if self.options.node_splitting {
            self.stats.forward_dfa_states_before_splitting = Some(forward.len());
            forward = split_nodes(&forward, limits.max_dfa_size_after_node_splitting)?;
        }
        self.stats.forward_dfa_states = forward.len();
        self.track_threads(&forward);
        if self.dumping() {
            self.dump("dfa_forward", debug::dfa_to_dot(&forward), &forward);
        }

        if boolean {
            return Ok(AutomatonExecutor {
                forward,
                backward: None,
                captures: CaptureStrategy::None,
                capture_groups: groups,
                sticky,
                boolean_match_only: true,
            });
        }

        let backward = if sticky {
            None
        } else {
            let backward_nfa = build_nfa(ast, Direction::Backward, &limits)?;
            self.stats.backward_nfa_states = backward_nfa.len();
            let backward = build_dfa(&backward_nfa, DfaMode::backward_search(), &limits, &mut self.buffer)?;
            self.stats.backward_dfa_states = backward.len();
            self.track_threads(&backward);
            if self.dumping() {
                self.dump("nfa_backward", debug::nfa_to_dot(&backward_nfa), &backward_nfa);
                self.dump("dfa_backward", debug::dfa_to_dot(&backward), &backward);
            }
            Some(backward)
        };

        let captures = if groups <= 1 {
            CaptureStrategy::None
        } else if properties.is_trace_finder_eligible() && ast.flavor != Flavor::Python {
            match self.trace_finder(ast) {
                Some(tf) => CaptureStrategy::TraceFinder(tf),
                None => CaptureStrategy::Dfa(self.capture_dfa(ast, &forward_nfa)?),
            }
        } else {
            CaptureStrategy::Dfa(self.capture_dfa(ast, &forward_nfa)?)
        };

        Ok(AutomatonExecutor {
            forward,
            backward,
            captures,
            capture_groups: groups,
            sticky,
            boolean_match_only: false,
        })
    }

    /// Build the trace finder; any bailout is a soft fallback
    fn trace_finder(&mut self, ast: &RegexAst) -> Option<TraceFinder> {
        match build_trace_finder(ast, &self.limits, &mut self.buffer) {
            Ok(tf) => {
                self.stats.trace_finder_results = tf.results.len();
                self.stats.trace_finder_states = tf.dfa.len();
                if self.dumping() {
                    self.dump("trace_finder", debug::trace_finder_to_dot(&tf), &tf);
                }
                Some(tf)
            }
            Err(bailout) => {
                self.stats
                    .notes
                    .push(format!("trace finder skipped: {}", bailout));
                None
            }
        }
    }

    fn capture_dfa(&mut self, ast: &RegexAst, forward_nfa: &PureNfa) -> Result<Dfa, Bailout> {
        let mode = DfaMode::capture_groups(ast.flavor == Flavor::Python);
        let dfa = build_dfa(forward_nfa, mode, &self.limits, &mut self.buffer)?;
        self.stats.capture_dfa_states = dfa.len();
        self.track_threads(&dfa);
        if self.dumping() {
            self.dump("dfa_captures", debug::dfa_to_dot(&dfa), &dfa);
        }
        Ok(dfa)
    }

    fn backtracking(&mut self, ast: &RegexAst) -> Executor {
        let executor = build_backtracking(ast, &self.limits, self.options.must_advance);
        self.stats.backtracking_states = executor.state_count();
        self.stats.backtracking_transitions = executor.transition_count();
        if self.dumping() {
            let content = debug::to_json(&executor);
            if let Some(sink) = self.sink.as_deref_mut() {
                sink.emit(DebugArtifact {
                    name: "backtracking".to_string(),
                    format: ArtifactFormat::Json,
                    content,
                });
            }
        }
        Executor::Backtracking(executor)
    }

    fn track_threads(&mut self, dfa: &Dfa) {
        self.stats.max_dfa_threads = self.stats.max_dfa_threads.max(dfa.max_threads());
    }

    fn note(&mut self, bailout: &Bailout) {
        log_debug!("bailout for {}: {}", self.source, bailout);
        self.stats.notes.push(bailout.to_string());
    }

    fn dumping(&self) -> bool {
        self.options.dump_automata && self.sink.is_some()
    }

    fn dump<T: Serialize>(&mut self, name: &str, dot: String, value: &T) {
        if let Some(sink) = self.sink.as_deref_mut() {
            debug::emit_both(sink, name, dot, value);
        }
    }
}

/// Compile `pattern` with ECMAScript `flags`
pub fn compile(pattern: &str, flags: &str, options: CompilerOptions) -> Result<CompiledMatcher, RegexError> {
    let source = RegexSource::parse(pattern, flags)?;
    CompilationRequest::new(source, options).compile()
}

/// Compile a prepared source, optionally dumping automata into `sink`
pub fn compile_source(
    source: RegexSource,
    options: CompilerOptions,
    sink: Option<&mut dyn DebugSink>,
) -> Result<CompiledMatcher, RegexError> {
    let request = CompilationRequest::new(source, options);
    match sink {
        Some(sink) => request.with_sink(sink).compile(),
        None => request.compile(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::debug::CollectingSink;
    use crate::engine::options::CompilationLimits;

    fn kind(pattern: &str, flags: &str) -> ExecutorKind {
        compile(pattern, flags, CompilerOptions::default()).unwrap().kind()
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(kind("abc", ""), ExecutorKind::Literal);
        assert_eq!(kind("a|b", ""), ExecutorKind::Automaton);
        assert_eq!(kind("a(?=b)", ""), ExecutorKind::Backtracking);
        assert_eq!(kind("(a)\\1", ""), ExecutorKind::Backtracking);
        assert_eq!(kind("^a$", "m"), ExecutorKind::Backtracking);
        assert_eq!(kind("[^\\x00-\\u{10FFFF}]", "u"), ExecutorKind::Dead);
    }

    #[test]
    fn test_scratch_usage_is_reported() {
        let automaton = compile("(a|b)*c", "", CompilerOptions::default()).unwrap();
        assert_eq!(automaton.kind(), ExecutorKind::Automaton);
        assert!(automaton.stats().scratch_resets > 0);
        assert!(automaton.stats().scratch_bytes > 0);

        let literal = compile("abc", "", CompilerOptions::default()).unwrap();
        assert_eq!(literal.stats().scratch_resets, 0);
    }

    #[test]
    fn test_syntax_errors_pass_through() {
        let err = compile("a(b", "", CompilerOptions::default()).unwrap_err();
        assert_eq!(err.syntax_error().message, "Unterminated group");
        assert!(compile("a", "gg", CompilerOptions::default()).is_err());
    }

    #[test]
    fn test_trace_finder_selected() {
        let matcher = compile("(a)(b)", "", CompilerOptions::default()).unwrap();
        let Executor::Automaton(automaton) = matcher.executor() else {
            panic!("expected automaton");
        };
        assert!(matches!(automaton.captures, CaptureStrategy::TraceFinder(_)));
        assert_eq!(matcher.stats().trace_finder_results, 1);
        let m = matcher.exec("ab", 0).unwrap();
        assert_eq!(m.group(1), Some((0, 1)));
        assert_eq!(m.group(2), Some((1, 2)));
    }

    #[test]
    fn test_loops_use_capture_dfa() {
        let matcher = compile("(a+)(b)", "", CompilerOptions::default()).unwrap();
        let Executor::Automaton(automaton) = matcher.executor() else {
            panic!("expected automaton");
        };
        assert!(matches!(automaton.captures, CaptureStrategy::Dfa(_)));
        assert_eq!(matcher.exec("xaab", 0).unwrap().group(1), Some((1, 3)));
    }

    #[test]
    fn test_size_bailout_falls_back() {
        let limits = CompilationLimits::default().with_max_dfa_size(4);
        let options = CompilerOptions::default().with_limits(limits);
        let matcher = compile("(a|b)*a(a|b)(a|b)(a|b)", "", options).unwrap();
        assert_eq!(matcher.kind(), ExecutorKind::Backtracking);
        assert!(matcher.stats().notes.iter().any(|n| n.contains("DFA")));
        assert!(matcher.is_match("bbabbb", 0));
    }

    #[test]
    fn test_must_advance() {
        let options = CompilerOptions::default().with_must_advance(true);
        let matcher = compile("a*", "", options).unwrap();
        assert_eq!(matcher.kind(), ExecutorKind::Backtracking);
        assert_eq!(matcher.exec("baa", 0).unwrap().group(0), Some((1, 3)));

        let matcher = compile("abc", "", options).unwrap();
        assert_eq!(matcher.kind(), ExecutorKind::Literal);
    }

    #[test]
    fn test_boolean_match_only() {
        let options = CompilerOptions::default().with_boolean_match_only(true);
        let matcher = compile("(a)(b+)", "", options).unwrap();
        assert_eq!(matcher.kind(), ExecutorKind::Automaton);
        assert_eq!(matcher.stats().backward_dfa_states, 0);
        assert!(matcher.is_match("xabb", 0));
        assert!(!matcher.is_match("xa", 0));
    }

    #[test]
    fn test_dump_automata() {
        let mut sink = CollectingSink::new();
        let options = CompilerOptions::default().with_dump_automata(true);
        let source = RegexSource::parse("(a)(b)", "").unwrap();
        let matcher = compile_source(source, options, Some(&mut sink)).unwrap();
        assert_eq!(matcher.kind(), ExecutorKind::Automaton);
        for name in ["ast", "nfa_forward", "dfa_forward", "dfa_backward", "trace_finder"] {
            assert!(sink.find(name, ArtifactFormat::Dot).is_some(), "{name}");
            assert!(sink.find(name, ArtifactFormat::Json).is_some(), "{name}");
        }
    }

    #[test]
    fn test_python_flavor_tracks_last_group() {
        let source = RegexSource::parse("(?P<x>a)(?P<y>b)?", "")
            .unwrap()
            .with_flavor(Flavor::Python);
        let matcher = compile_source(source, CompilerOptions::default(), None).unwrap();
        assert_eq!(matcher.named_capture_groups().get("y"), Some(&2));
        let m = matcher.exec("ab", 0).unwrap();
        assert_eq!(m.last_group(), Some(2));
        assert_eq!(matcher.exec("ac", 0).unwrap().last_group(), Some(1));
    }
}
