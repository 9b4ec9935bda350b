//! Compiler configuration
//!
//! All numeric thresholds are fixed for the lifetime of a compilation
//! request. Values supplied through [`CompilationLimits`] are clamped to the
//! hard ceilings below, which are dictated by the index widths used in the
//! automata (15-bit state ids, byte-sized slot and thread indices).

use serde::Serialize;

/// Hard ceiling on NFA and DFA state counts (fits an `i16` index)
pub const MAX_AUTOMATON_SIZE: usize = i16::MAX as usize;

/// Hard ceiling on capture groups tracked by a DFA (two byte-sized slots per group)
pub const MAX_DFA_CAPTURE_GROUPS: usize = 127;

/// Hard ceiling on NFA threads per DFA state (byte-sized thread indices)
pub const MAX_THREADS_PER_DFA_STATE: usize = 255;

/// Hard ceiling on precalculated trace finder results
pub const MAX_TRACE_FINDER_RESULTS: usize = 254;

/// Sentinel result index meaning "no precalculated result"
pub const TRACE_FINDER_NO_RESULT: u8 = 0xFF;

/// Default parse tree size ceiling
pub const DEFAULT_MAX_PARSE_TREE_SIZE: usize = 4000;

/// Default NFA size ceiling
pub const DEFAULT_MAX_NFA_SIZE: usize = 3500;

/// Default DFA size ceiling
pub const DEFAULT_MAX_DFA_SIZE: usize = 2400;

/// Default DFA size ceiling after node splitting
pub const DEFAULT_MAX_DFA_SIZE_AFTER_NODE_SPLITTING: usize = 2000;

/// Default unroll threshold for quantifiers on a single character class
pub const DEFAULT_UNROLL_THRESHOLD_SINGLE_CC: u32 = 20;

/// Default unroll threshold for quantifiers on anything else
pub const DEFAULT_UNROLL_THRESHOLD_GROUP: u32 = 5;

/// Default number of ranges sharing a high byte before a bitset is used
pub const DEFAULT_BITSET_THRESHOLD: usize = 2;

/// Default capacity of a [`PatternCache`](super::cache::PatternCache)
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Size ceilings and tuning thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompilationLimits {
    /// Maximum number of AST nodes before automaton phases are skipped
    pub max_parse_tree_size: usize,
    /// Maximum NFA states
    pub max_nfa_size: usize,
    /// Maximum DFA states
    pub max_dfa_size: usize,
    /// Maximum DFA states after node splitting
    pub max_dfa_size_after_node_splitting: usize,
    /// Maximum capture groups (including group 0) tracked by a DFA
    pub max_dfa_capture_groups: usize,
    /// Maximum NFA threads per DFA state
    pub max_threads_per_dfa_state: usize,
    /// Maximum precalculated trace finder results
    pub max_trace_finder_results: usize,
    /// Unroll threshold for quantified character classes
    pub quantifier_unroll_threshold_single_cc: u32,
    /// Unroll threshold for other quantified terms
    pub quantifier_unroll_threshold_group: u32,
    /// Ranges sharing a high byte before compacting into a bitset
    pub bitset_threshold: usize,
}

impl Default for CompilationLimits {
    fn default() -> Self {
        Self {
            max_parse_tree_size: DEFAULT_MAX_PARSE_TREE_SIZE,
            max_nfa_size: DEFAULT_MAX_NFA_SIZE,
            max_dfa_size: DEFAULT_MAX_DFA_SIZE,
            max_dfa_size_after_node_splitting: DEFAULT_MAX_DFA_SIZE_AFTER_NODE_SPLITTING,
            max_dfa_capture_groups: MAX_DFA_CAPTURE_GROUPS,
            max_threads_per_dfa_state: MAX_THREADS_PER_DFA_STATE,
            max_trace_finder_results: MAX_TRACE_FINDER_RESULTS,
            quantifier_unroll_threshold_single_cc: DEFAULT_UNROLL_THRESHOLD_SINGLE_CC,
            quantifier_unroll_threshold_group: DEFAULT_UNROLL_THRESHOLD_GROUP,
            bitset_threshold: DEFAULT_BITSET_THRESHOLD,
        }
    }
}

impl CompilationLimits {
    /// Create limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parse tree size ceiling
    pub fn with_max_parse_tree_size(mut self, size: usize) -> Self {
        self.max_parse_tree_size = size;
        self
    }

    /// Set the NFA size ceiling
    pub fn with_max_nfa_size(mut self, size: usize) -> Self {
        self.max_nfa_size = size;
        self
    }

    /// Set the DFA size ceiling
    pub fn with_max_dfa_size(mut self, size: usize) -> Self {
        self.max_dfa_size = size;
        self
    }

    /// Set the DFA size ceiling applied after node splitting
    pub fn with_max_dfa_size_after_node_splitting(mut self, size: usize) -> Self {
        self.max_dfa_size_after_node_splitting = size;
        self
    }

    /// Set the trace finder result ceiling
    pub fn with_max_trace_finder_results(mut self, results: usize) -> Self {
        self.max_trace_finder_results = results;
        self
    }

    /// Set both quantifier unroll thresholds
    pub fn with_unroll_thresholds(mut self, single_cc: u32, group: u32) -> Self {
        self.quantifier_unroll_threshold_single_cc = single_cc;
        self.quantifier_unroll_threshold_group = group;
        self
    }

    /// Set the bitset compaction threshold
    pub fn with_bitset_threshold(mut self, threshold: usize) -> Self {
        self.bitset_threshold = threshold;
        self
    }

    /// Apply the hard ceilings
    pub fn clamped(self) -> Self {
        Self {
            max_nfa_size: self.max_nfa_size.min(MAX_AUTOMATON_SIZE),
            max_dfa_size: self.max_dfa_size.min(MAX_AUTOMATON_SIZE),
            max_dfa_size_after_node_splitting: self
                .max_dfa_size_after_node_splitting
                .min(MAX_AUTOMATON_SIZE),
            max_dfa_capture_groups: self.max_dfa_capture_groups.min(MAX_DFA_CAPTURE_GROUPS),
            max_threads_per_dfa_state: self
                .max_threads_per_dfa_state
                .min(MAX_THREADS_PER_DFA_STATE),
            max_trace_finder_results: self.max_trace_finder_results.min(MAX_TRACE_FINDER_RESULTS),
            ..self
        }
    }
}

/// Options recognized by [`compile`](super::compiler::compile)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CompilerOptions {
    /// Emit AST/NFA/DFA dumps to the debug sink
    pub dump_automata: bool,
    /// Skip capture tracking and backward search entirely
    pub boolean_match_only: bool,
    /// Reject empty matches at the start index
    pub must_advance: bool,
    /// Build the backtracking executor even when an automaton would do
    pub force_backtracking: bool,
    /// Run node splitting on the forward DFA
    pub node_splitting: bool,
    /// Size ceilings and thresholds
    pub limits: CompilationLimits,
}

impl CompilerOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable debug dumps
    pub fn with_dump_automata(mut self, dump: bool) -> Self {
        self.dump_automata = dump;
        self
    }

    /// Only answer "is there a match"
    pub fn with_boolean_match_only(mut self, boolean: bool) -> Self {
        self.boolean_match_only = boolean;
        self
    }

    /// Require matches to advance past the start index
    pub fn with_must_advance(mut self, must_advance: bool) -> Self {
        self.must_advance = must_advance;
        self
    }

    /// Always use the backtracking executor
    pub fn with_force_backtracking(mut self, force: bool) -> Self {
        self.force_backtracking = force;
        self
    }

    /// Enable node splitting
    pub fn with_node_splitting(mut self, enabled: bool) -> Self {
        self.node_splitting = enabled;
        self
    }

    /// Replace the limits
    pub fn with_limits(mut self, limits: CompilationLimits) -> Self {
        self.limits = limits;
        self
    }
}
