//! Regex compilation pipeline
//!
//! A pattern flows through the stages below; each stage may hand the pattern
//! to a cheaper or more general executor instead of continuing.
//!
//! ## Front end
//! - [`source`] - Pattern text, flags, flavor and encoding
//! - [`parser`] - Pattern text to arena [`RegexAst`]
//! - [`postprocess`] - Quantifier unrolling, dead-branch pruning
//! - [`properties`] - Feature flags that decide the executor
//!
//! ## Character handling
//! - [`charset`] - Code point interval sets and class escapes
//! - [`matchers`] - Per-transition character tests
//!
//! ## Automata
//! - [`nfa`] - Thompson NFA, forward or reversed
//! - [`dfa`] - Subset construction with capture programs
//! - [`node_split`] - Loop-entry duplication on the forward DFA
//! - [`trace_finder`] - Precomputed capture offsets for fixed-shape patterns
//!
//! ## Executors
//! - [`literal`] - Dead and plain-literal patterns
//! - [`backtrack`] - Fallback for everything the automata cannot do
//! - [`executor`] - Executor selection result and matching
//!
//! ## Orchestration
//! - [`compiler`] - [`compile`] and [`CompiledMatcher`]
//! - [`cache`] - Caller-owned LRU of compiled matchers
//! - [`parallel`] - Batch compilation
//! - [`debug`] - DOT and JSON dumps of every stage

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

// ============================================================================
// Module Declarations
// ============================================================================

pub mod ast;
pub mod backtrack;
pub mod buffer;
pub mod cache;
pub mod charset;
pub mod compiler;
pub mod debug;
pub mod dfa;
pub mod error;
pub mod executor;
pub mod literal;
pub mod matchers;
pub mod nfa;
pub mod node_split;
pub mod options;
pub mod parser;
pub mod postprocess;
pub mod properties;
pub mod source;
pub mod trace_finder;

// Batch compilation (always available, uses rayon when feature is enabled)
pub mod parallel;

// ============================================================================
// Core Types
// ============================================================================

pub use ast::{NodeId, NodeKind, RegexAst};
pub use compiler::{compile, compile_source, CompilationRequest, CompilationStats, CompiledMatcher};
pub use executor::{Executor, ExecutorKind, MatchResult};
pub use source::{Encoding, Flavor, RegexFlags, RegexSource};

// ============================================================================
// Configuration
// ============================================================================

pub use options::{CompilationLimits, CompilerOptions, DEFAULT_CACHE_CAPACITY};

// ============================================================================
// Error Handling
// ============================================================================

pub use error::{Bailout, RegexError, SyntaxError, UnsupportedFeature};

// ============================================================================
// Pipeline Stages
// ============================================================================

pub use dfa::{build_dfa, Dfa, DfaMode};
pub use nfa::{build_nfa, Direction, PureNfa};
pub use node_split::split_nodes;
pub use parser::parse;
pub use postprocess::{post_process, PostProcessReport};
pub use properties::RegexProperties;
pub use trace_finder::{build_trace_finder, TraceFinder};

// ============================================================================
// Debug Dumps
// ============================================================================

pub use debug::{ArtifactFormat, CollectingSink, DebugArtifact, DebugSink, NullSink};

// ============================================================================
// Caching and Batch Compilation
// ============================================================================

pub use cache::{CacheStats, PatternCache};
pub use parallel::{compile_batch_parallel, compile_sources_parallel};
