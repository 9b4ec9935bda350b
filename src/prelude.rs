//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from retrace.
//! Importing this module with a wildcard import brings them into scope:
//!
//! ```
//! use retrace::prelude::*;
//!
//! let matcher = compile("colou?r", "i", CompilerOptions::default()).unwrap();
//! assert!(matcher.is_match("COLOR", 0));
//! ```
//!
//! # Re-exported Items
//!
//! ## Compilation
//! - [`compile`] / [`compile_source`] - Compile a pattern
//! - [`CompiledMatcher`] - The compiled pattern
//! - [`MatchResult`] - Capture offsets of a match
//! - [`ExecutorKind`] - Which executor was selected
//!
//! ## Configuration
//! - [`CompilerOptions`], [`CompilationLimits`]
//! - [`RegexSource`], [`RegexFlags`], [`Flavor`], [`Encoding`]
//!
//! ## Errors
//! - [`RegexError`], [`SyntaxError`]
//!
//! ## Utilities
//! - [`PatternCache`] - Bounded cache of compiled matchers
//! - [`DebugSink`], [`CollectingSink`] - Automaton dumps

pub use crate::engine::{
    compile, compile_source, CollectingSink, CompilationLimits, CompiledMatcher, CompilerOptions,
    DebugSink, Encoding, ExecutorKind, Flavor, MatchResult, PatternCache, RegexError, RegexFlags,
    RegexSource, SyntaxError,
};
