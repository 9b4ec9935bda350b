//! Literal and dead pattern detection
//!
//! Patterns that are a plain string (optionally anchored) skip automaton
//! construction entirely and are matched with a `memchr::memmem` substring
//! search. Patterns whose root was pruned dead match nothing.

use super::ast::{AnchorKind, NodeKind, RegexAst};
use memchr::memmem::Finder;
use serde::ser::SerializeStruct;
use serde::Serialize;

/// A pattern equivalent to a fixed string
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiteralPattern {
    /// The string to find
    pub text: String,
    /// Leading `^`
    pub anchored_start: bool,
    /// Trailing `$`
    pub anchored_end: bool,
}

/// Whether pruning killed the whole pattern
pub fn is_dead(ast: &RegexAst) -> bool {
    ast.is_dead(ast.root())
}

/// Recognize literal patterns
///
/// Requires a single alternative made of single-code-point classes, with an
/// optional leading `^` and trailing `$` (non-multiline), no capture groups
/// besides group 0 and no lookarounds.
pub fn detect_literal(ast: &RegexAst) -> Option<LiteralPattern> {
    if ast.capture_groups() != 1 || ast.subtrees().len() != 1 {
        return None;
    }
    let NodeKind::Group { alternatives, .. } = ast.kind(ast.root()) else {
        return None;
    };
    let [sequence] = alternatives.as_slice() else {
        return None;
    };
    let NodeKind::Sequence(terms) = ast.kind(*sequence) else {
        return None;
    };

    let mut terms = terms.as_slice();
    let mut pattern = LiteralPattern {
        text: String::new(),
        anchored_start: false,
        anchored_end: false,
    };
    if let [first, rest @ ..] = terms {
        if matches!(ast.kind(*first), NodeKind::Anchor(AnchorKind::Start)) {
            pattern.anchored_start = true;
            terms = rest;
        }
    }
    if let [rest @ .., last] = terms {
        if matches!(ast.kind(*last), NodeKind::Anchor(AnchorKind::End)) {
            pattern.anchored_end = true;
            terms = rest;
        }
    }
    for &term in terms {
        let NodeKind::CharClass(set) = ast.kind(term) else {
            return None;
        };
        let c = set.single_code_point().and_then(char::from_u32)?;
        pattern.text.push(c);
    }
    Some(pattern)
}

/// Executes a [`LiteralPattern`]
#[derive(Debug, Clone)]
pub struct LiteralExecutor {
    pattern: LiteralPattern,
    finder: Finder<'static>,
    sticky: bool,
}

impl LiteralExecutor {
    /// Create an executor
    pub fn new(pattern: LiteralPattern, sticky: bool) -> Self {
        let finder = Finder::new(pattern.text.as_bytes()).into_owned();
        Self {
            pattern,
            finder,
            sticky,
        }
    }

    /// The literal being searched for
    pub fn pattern(&self) -> &LiteralPattern {
        &self.pattern
    }

    /// Find the leftmost occurrence at or after byte offset `from`
    pub fn find(&self, input: &str, from: usize) -> Option<(usize, usize)> {
        if from > input.len() {
            return None;
        }
        let text = self.pattern.text.as_str();
        let len = text.len();

        if self.pattern.anchored_start {
            if from != 0 {
                return None;
            }
            let ok = if self.pattern.anchored_end {
                input == text
            } else {
                input.starts_with(text)
            };
            return ok.then_some((0, len));
        }

        if self.pattern.anchored_end {
            let start = input.len().checked_sub(len)?;
            let ok = start >= from
                && (!self.sticky || start == from)
                && input.is_char_boundary(start)
                && input.ends_with(text);
            return ok.then_some((start, input.len()));
        }

        if self.sticky {
            return input[from..].starts_with(text).then_some((from, from + len));
        }

        let start = from + self.finder.find(&input.as_bytes()[from..])?;
        Some((start, start + len))
    }
}

impl Serialize for LiteralExecutor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let pattern = self.pattern();
        let mut state = serializer.serialize_struct("LiteralExecutor", 3)?;
        state.serialize_field("text", &pattern.text)?;
        state.serialize_field("anchored_start", &pattern.anchored_start)?;
        state.serialize_field("anchored_end", &pattern.anchored_end)?;
        state.end()
    }
}
