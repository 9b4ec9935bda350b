//! Retrace - Regex Compilation Pipeline
//!
//! Compiles ECMAScript-style (and Python-flavored) regular expressions into
//! the cheapest executor that can run them:
//! - Dead matchers for patterns that can never match
//! - Literal matchers backed by `memchr` substring search
//! - DFA-based automaton matchers, with a trace finder or capture DFA for
//!   group offsets
//! - A backtracking executor for lookaround, back-references and patterns
//!   whose automata exceed their size limits
//!
//! Every intermediate structure (AST, NFA, DFA, trace finder) can be dumped
//! as DOT or JSON through a [`DebugSink`](engine::DebugSink).
//!
//! ## Quick Start
//!
//! ```rust
//! use retrace::engine::{compile, CompilerOptions, ExecutorKind};
//!
//! let matcher = compile(r"(\d+)-(\d+)", "", CompilerOptions::default()).unwrap();
//! assert_eq!(matcher.kind(), ExecutorKind::Automaton);
//!
//! let m = matcher.exec("call 555-0199 now", 0).unwrap();
//! assert_eq!(m.start(), Some(5));
//! assert_eq!(m.group(1), Some((5, 8)));
//! assert_eq!(m.group(2), Some((9, 13)));
//! ```
//!
//! ## Caching
//!
//! ```rust
//! use retrace::engine::{CompilerOptions, PatternCache};
//!
//! let cache = PatternCache::new(CompilerOptions::default());
//! let first = cache.get_or_compile("a+b", "i").unwrap();
//! let again = cache.get_or_compile("a+b", "i").unwrap();
//! assert!(std::sync::Arc::ptr_eq(&first, &again));
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate
//! - `parallel` - Compile batches on the rayon thread pool

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
// Allow some pedantic lints that are too noisy
#![allow(clippy::module_inception)]
#![allow(clippy::redundant_closure)]

// Prelude module for convenient imports
pub mod prelude;

// The compilation pipeline
pub mod engine;

/// Re-export commonly used types for convenience
pub use engine::{
    compile, compile_source, CompilationLimits, CompiledMatcher, CompilerOptions, ExecutorKind,
    MatchResult, PatternCache, RegexError, RegexSource,
};
