//! Batch compilation
//!
//! Compilation requests share no mutable state, so a batch of independent
//! patterns can be compiled on separate threads. With the `parallel`
//! feature the batch is spread over rayon's thread pool; without it the same
//! functions compile sequentially.
//!
//! ```toml
//! [dependencies]
//! retrace = { version = "0.1", features = ["parallel"] }
//! ```
//!
//! # Example
//!
//! ```
//! use retrace::engine::{compile_batch_parallel, CompilerOptions};
//!
//! let results = compile_batch_parallel(&[("a+", ""), ("(", "")], CompilerOptions::default());
//! assert!(results[0].is_ok());
//! assert!(results[1].is_err());
//! ```

use super::compiler::{compile, compile_source, CompiledMatcher};
use super::error::RegexError;
use super::options::CompilerOptions;
use super::source::RegexSource;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Compile `(pattern, flags)` pairs, results in input order
#[cfg(feature = "parallel")]
pub fn compile_batch_parallel(
    patterns: &[(&str, &str)],
    options: CompilerOptions,
) -> Vec<Result<CompiledMatcher, RegexError>> {
    patterns
        .par_iter()
        .map(|(pattern, flags)| compile(pattern, flags, options))
        .collect()
}

/// Compile `(pattern, flags)` pairs sequentially (no `parallel` feature)
#[cfg(not(feature = "parallel"))]
pub fn compile_batch_parallel(
    patterns: &[(&str, &str)],
    options: CompilerOptions,
) -> Vec<Result<CompiledMatcher, RegexError>> {
    patterns
        .iter()
        .map(|(pattern, flags)| compile(pattern, flags, options))
        .collect()
}

/// Compile owned sources, results in input order
#[cfg(feature = "parallel")]
pub fn compile_sources_parallel(
    sources: Vec<RegexSource>,
    options: CompilerOptions,
) -> Vec<Result<CompiledMatcher, RegexError>> {
    sources
        .into_par_iter()
        .map(|source| compile_source(source, options, None))
        .collect()
}

/// Compile owned sources sequentially (no `parallel` feature)
#[cfg(not(feature = "parallel"))]
pub fn compile_sources_parallel(
    sources: Vec<RegexSource>,
    options: CompilerOptions,
) -> Vec<Result<CompiledMatcher, RegexError>> {
    sources
        .into_iter()
        .map(|source| compile_source(source, options, None))
        .collect()
}
