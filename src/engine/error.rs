//! Error reporting for the compilation pipeline
//!
//! Two very different kinds of failure live here:
//!
//! - [`SyntaxError`] - the pattern text is malformed. This is the only error
//!   that ever crosses the public `compile` boundary.
//! - [`Bailout`] - an automaton phase gave up (size ceiling, unsupported
//!   construct). Bailouts are returned as `Result<_, Bailout>` and are always
//!   resolved by the orchestrator, which falls back to the next strategy.
//!
//! # Example Output
//!
//! ```text
//! Invalid regular expression: /a(b/: Unterminated group
//!   a(b
//!    ^
//! ```

use std::fmt;

/// Malformed pattern text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Human-readable description of the problem
    pub message: String,
    /// The offending pattern (or flag string for flag errors)
    pub pattern: String,
    /// Code point offset into `pattern` where the problem was detected
    pub position: usize,
}

impl SyntaxError {
    /// Create a new syntax error
    pub fn new(message: impl Into<String>, pattern: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            pattern: pattern.into(),
            position,
        }
    }

    /// Create an "invalid flags" error
    pub fn invalid_flags(flags: &str, position: usize) -> Self {
        Self::new(format!("Invalid flags supplied '{}'", flags), flags, position)
    }

    /// Render the pattern with a caret under the error position
    pub fn format_with_pattern(&self) -> String {
        let mut output = format!("{}\n  {}\n  ", self, self.pattern);
        for _ in 0..self.position.min(self.pattern.chars().count()) {
            output.push(' ');
        }
        output.push('^');
        output
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid regular expression: /{}/: {}",
            self.pattern, self.message
        )
    }
}

impl std::error::Error for SyntaxError {}

/// Public compilation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    /// The pattern or its flags are malformed
    Syntax(SyntaxError),
}

impl RegexError {
    /// The underlying syntax error
    pub fn syntax_error(&self) -> &SyntaxError {
        match self {
            RegexError::Syntax(err) => err,
        }
    }

    /// Code point position of the error
    pub fn position(&self) -> usize {
        self.syntax_error().position
    }
}

impl From<SyntaxError> for RegexError {
    fn from(err: SyntaxError) -> Self {
        RegexError::Syntax(err)
    }
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegexError::Syntax(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for RegexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegexError::Syntax(err) => Some(err),
        }
    }
}

/// A construct that the automaton phases cannot express
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum UnsupportedFeature {
    /// `(?=...)`, `(?!...)`, `(?<=...)`, `(?<!...)`
    LookAround,
    /// `\1`, `\k<name>`
    BackReference,
    /// `\b`, `\B`
    WordBoundary,
    /// `^` / `$` with the multiline flag
    MultilineAnchor,
    /// Matches must advance past the start index
    MustAdvance,
}

impl fmt::Display for UnsupportedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LookAround => write!(f, "lookaround assertion"),
            Self::BackReference => write!(f, "back reference"),
            Self::WordBoundary => write!(f, "word boundary assertion"),
            Self::MultilineAnchor => write!(f, "multiline anchor"),
            Self::MustAdvance => write!(f, "must-advance semantics"),
        }
    }
}

/// Internal signal that a construction phase cannot proceed
///
/// Never surfaced to callers of `compile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bailout {
    /// The parsed tree exceeds the parse tree ceiling
    ParseTreeTooLarge {
        /// Number of AST nodes
        size: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// NFA state count ceiling exceeded
    NfaTooLarge {
        /// States allocated when the ceiling was hit
        states: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// DFA state count ceiling exceeded
    DfaTooLarge {
        /// States allocated when the ceiling was hit
        states: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// Node splitting duplicated too many DFA states
    NodeSplittingTooLarge {
        /// States after splitting when the ceiling was hit
        states: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// Too many capture groups to track with byte-sized slot indices
    TooManyCaptureGroups {
        /// Capture groups in the pattern, including group 0
        groups: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// A DFA state would hold more NFA threads than a byte index can address
    TooManyThreads {
        /// Threads in the offending state
        threads: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// The trace finder produced too many distinct result shapes
    TooManyTraceFinderResults {
        /// Configured ceiling
        limit: usize,
    },

    /// A construct the automaton cannot represent
    Unsupported(UnsupportedFeature),
}

impl Bailout {
    /// Whether the bailout was caused by a size ceiling (as opposed to a feature)
    pub fn is_size_bailout(&self) -> bool {
        !matches!(self, Bailout::Unsupported(_))
    }
}

impl fmt::Display for Bailout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bailout::ParseTreeTooLarge { size, limit } => {
                write!(f, "parse tree too large: {} nodes exceeds limit of {}", size, limit)
            }
            Bailout::NfaTooLarge { states, limit } => {
                write!(f, "NFA too large: {} states exceeds limit of {}", states, limit)
            }
            Bailout::DfaTooLarge { states, limit } => {
                write!(f, "DFA too large: {} states exceeds limit of {}", states, limit)
            }
            Bailout::NodeSplittingTooLarge { states, limit } => write!(
                f,
                "DFA too large after node splitting: {} states exceeds limit of {}",
                states, limit
            ),
            Bailout::TooManyCaptureGroups { groups, limit } => write!(
                f,
                "too many capture groups for DFA tracking: {} exceeds limit of {}",
                groups, limit
            ),
            Bailout::TooManyThreads { threads, limit } => write!(
                f,
                "too many NFA states in one DFA state: {} exceeds limit of {}",
                threads, limit
            ),
            Bailout::TooManyTraceFinderResults { limit } => {
                write!(f, "trace finder exceeded {} precalculated results", limit)
            }
            Bailout::Unsupported(feature) => write!(f, "unsupported by automaton: {}", feature),
        }
    }
}

impl std::error::Error for Bailout {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = SyntaxError::new("Unterminated group", "a(b", 1);
        assert_eq!(
            err.to_string(),
            "Invalid regular expression: /a(b/: Unterminated group"
        );
    }

    #[test]
    fn test_format_with_pattern() {
        let err = SyntaxError::new("Nothing to repeat", "a**", 2);
        let formatted = err.format_with_pattern();
        assert!(formatted.contains("Nothing to repeat"));
        assert!(formatted.ends_with("  a**\n    ^"));
    }

    #[test]
    fn test_bailout_kinds() {
        assert!(Bailout::NfaTooLarge { states: 10, limit: 5 }.is_size_bailout());
        assert!(!Bailout::Unsupported(UnsupportedFeature::LookAround).is_size_bailout());
        assert_eq!(
            Bailout::Unsupported(UnsupportedFeature::BackReference).to_string(),
            "unsupported by automaton: back reference"
        );
    }
}
