//! Thompson NFA construction
//!
//! Builds a [`PureNfa`] from a post-processed AST. Construction works
//! back-to-front: every node is compiled with its continuation state already
//! known, so sequences are emitted in reverse (forward NFA) or in order
//! (backward NFA) without any patch lists. Loops allocate their `Split`
//! first and fill in the targets once the body exists.
//!
//! Every state records the AST node it came from, which the debug dumps use.

use super::ast::{AnchorKind, NodeId, NodeKind, RegexAst};
use super::charset::CodePointSet;
use super::error::{Bailout, UnsupportedFeature};
use super::options::{CompilationLimits, TRACE_FINDER_NO_RESULT};
use serde::Serialize;

/// Index of an NFA state
pub type NfaStateId = u32;

/// Direction in which an automaton consumes input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// Left to right
    Forward,
    /// Right to left
    Backward,
}

/// Input-boundary assertions representable in an automaton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NfaAssertion {
    /// Position 0
    InputStart,
    /// Position `input.len()`
    InputEnd,
}

/// NFA state payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NfaStateKind {
    /// Consume one code point in `set`
    Char {
        /// Accepted code points
        set: CodePointSet,
        /// Successor
        next: NfaStateId,
    },
    /// Epsilon fan-out; earlier targets have priority
    Split {
        /// Successors in priority order
        targets: Vec<NfaStateId>,
    },
    /// Record the current position in a capture slot
    Save {
        /// Slot index (`2 * group` for starts, `2 * group + 1` for ends)
        slot: u16,
        /// Successor
        next: NfaStateId,
    },
    /// Zero-width boundary test
    Assert {
        /// Which boundary
        assertion: NfaAssertion,
        /// Successor
        next: NfaStateId,
    },
    /// Accepting state
    Match {
        /// Trace finder result index, or [`TRACE_FINDER_NO_RESULT`]
        result: u8,
    },
}

/// NFA state with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NfaState {
    /// Payload
    pub kind: NfaStateKind,
    /// AST node that produced the state
    pub ast_node: Option<NodeId>,
}

/// Thompson NFA
#[derive(Debug, Clone, Serialize)]
pub struct PureNfa {
    /// All states
    pub states: Vec<NfaState>,
    /// Entry for matches that must start at the scan start
    pub anchored_start: NfaStateId,
    /// Entry that may skip any prefix before matching
    pub unanchored_start: NfaStateId,
    /// Scan direction
    pub direction: Direction,
    /// Capture groups, including group 0
    pub capture_groups: usize,
}

impl PureNfa {
    /// Number of states
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the NFA has no states
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State by id
    #[inline]
    pub fn state(&self, id: NfaStateId) -> &NfaState {
        &self.states[id as usize]
    }

    /// Number of capture slots (two per group)
    pub fn slot_count(&self) -> usize {
        self.capture_groups * 2
    }

    /// Number of edges, counting each split target
    pub fn transition_count(&self) -> usize {
        self.states
            .iter()
            .map(|s| match &s.kind {
                NfaStateKind::Split { targets } => targets.len(),
                NfaStateKind::Match { .. } => 0,
                _ => 1,
            })
            .sum()
    }

    /// Assertion that holds where the scan begins
    pub fn begin_assertion(&self) -> NfaAssertion {
        match self.direction {
            Direction::Forward => NfaAssertion::InputStart,
            Direction::Backward => NfaAssertion::InputEnd,
        }
    }
}

/// Placeholder successor, always overwritten before the NFA is returned
const UNPATCHED: NfaStateId = NfaStateId::MAX;

/// Builds a [`PureNfa`] from an AST
pub struct NfaGenerator<'a> {
    ast: &'a RegexAst,
    direction: Direction,
    track_captures: bool,
    limit: usize,
    states: Vec<NfaState>,
}

impl<'a> NfaGenerator<'a> {
    /// Create a generator
    ///
    /// Backward NFAs never track captures; they only locate match starts.
    pub fn new(ast: &'a RegexAst, direction: Direction, limits: &CompilationLimits) -> Self {
        Self {
            ast,
            direction,
            track_captures: direction == Direction::Forward,
            limit: limits.max_nfa_size,
            states: Vec::new(),
        }
    }

    /// Build the NFA
    pub fn generate(mut self) -> Result<PureNfa, Bailout> {
        let accept = self.add(
            NfaStateKind::Match {
                result: TRACE_FINDER_NO_RESULT,
            },
            None,
        )?;
        let anchored_start = self.compile(self.ast.root(), accept)?;

        // unanchored = Split[anchored, any -> unanchored]
        let unanchored_start = self.add(
            NfaStateKind::Split {
                targets: vec![anchored_start, UNPATCHED],
            },
            None,
        )?;
        let any = CodePointSet::full(self.ast.encoding.max_code_point());
        let skip = self.add(
            NfaStateKind::Char {
                set: any,
                next: unanchored_start,
            },
            None,
        )?;
        if let NfaStateKind::Split { targets } = &mut self.states[unanchored_start as usize].kind {
            targets[1] = skip;
        }

        log_debug!(
            "NFA ({:?}) built with {} states",
            self.direction,
            self.states.len()
        );

        Ok(PureNfa {
            states: self.states,
            anchored_start,
            unanchored_start,
            direction: self.direction,
            capture_groups: self.ast.capture_groups(),
        })
    }

    fn add(&mut self, kind: NfaStateKind, ast_node: Option<NodeId>) -> Result<NfaStateId, Bailout> {
        if self.states.len() >= self.limit {
            return Err(Bailout::NfaTooLarge {
                states: self.states.len() + 1,
                limit: self.limit,
            });
        }
        let id = self.states.len() as NfaStateId;
        self.states.push(NfaState { kind, ast_node });
        Ok(id)
    }

    /// Compile `id` so that it continues with `next`; returns the entry state
    fn compile(&mut self, id: NodeId, next: NfaStateId) -> Result<NfaStateId, Bailout> {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::CharClass(set) => self.add(
                NfaStateKind::Char {
                    set: set.clone(),
                    next,
                },
                Some(id),
            ),
            NodeKind::Sequence(terms) => {
                let mut entry = next;
                match self.direction {
                    Direction::Forward => {
                        for &term in terms.iter().rev() {
                            entry = self.compile(term, entry)?;
                        }
                    }
                    Direction::Backward => {
                        for &term in terms.iter() {
                            entry = self.compile(term, entry)?;
                        }
                    }
                }
                Ok(entry)
            }
            NodeKind::Group {
                alternatives,
                capture,
            } => {
                let capture = capture.filter(|_| self.track_captures);
                let body_next = match capture {
                    Some(g) => self.add(
                        NfaStateKind::Save {
                            slot: g * 2 + 1,
                            next,
                        },
                        Some(id),
                    )?,
                    None => next,
                };
                let mut entries = Vec::with_capacity(alternatives.len());
                for &alt in alternatives {
                    entries.push(self.compile(alt, body_next)?);
                }
                let body = match entries.as_slice() {
                    [single] => *single,
                    _ => self.add(NfaStateKind::Split { targets: entries }, Some(id))?,
                };
                match capture {
                    Some(g) => self.add(
                        NfaStateKind::Save {
                            slot: g * 2,
                            next: body,
                        },
                        Some(id),
                    ),
                    None => Ok(body),
                }
            }
            NodeKind::Quantified { term, quantifier } => {
                let (term, quantifier) = (*term, *quantifier);
                let mut entry = match quantifier.max {
                    None => {
                        let split = self.add(NfaStateKind::Split { targets: Vec::new() }, Some(id))?;
                        let body = self.compile(term, split)?;
                        let targets = if quantifier.greedy {
                            vec![body, next]
                        } else {
                            vec![next, body]
                        };
                        self.states[split as usize].kind = NfaStateKind::Split { targets };
                        split
                    }
                    Some(max) => {
                        // x{0,2} = (x(x)?)?
                        let mut optional = next;
                        for _ in quantifier.min..max {
                            let body = self.compile(term, optional)?;
                            let targets = if quantifier.greedy {
                                vec![body, next]
                            } else {
                                vec![next, body]
                            };
                            optional = self.add(NfaStateKind::Split { targets }, Some(id))?;
                        }
                        optional
                    }
                };
                for _ in 0..quantifier.min {
                    entry = self.compile(term, entry)?;
                }
                Ok(entry)
            }
            NodeKind::Anchor(kind) => {
                let assertion = match kind {
                    AnchorKind::Start => NfaAssertion::InputStart,
                    AnchorKind::End => NfaAssertion::InputEnd,
                    AnchorKind::LineStart | AnchorKind::LineEnd => {
                        return Err(Bailout::Unsupported(UnsupportedFeature::MultilineAnchor));
                    }
                    AnchorKind::WordBoundary | AnchorKind::NonWordBoundary => {
                        return Err(Bailout::Unsupported(UnsupportedFeature::WordBoundary));
                    }
                };
                self.add(NfaStateKind::Assert { assertion, next }, Some(id))
            }
            NodeKind::LookAround { .. } => {
                Err(Bailout::Unsupported(UnsupportedFeature::LookAround))
            }
            NodeKind::BackReference { .. } => {
                Err(Bailout::Unsupported(UnsupportedFeature::BackReference))
            }
        }
    }
}

/// Build an NFA for `ast`
pub fn build_nfa(
    ast: &RegexAst,
    direction: Direction,
    limits: &CompilationLimits,
) -> Result<PureNfa, Bailout> {
    NfaGenerator::new(ast, direction, limits).generate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parser::parse;
    use crate::engine::postprocess::post_process;
    use crate::engine::source::RegexSource;

    fn nfa(pattern: &str, direction: Direction, limits: &CompilationLimits) -> Result<PureNfa, Bailout> {
        let source = RegexSource::parse(pattern, "").unwrap();
        let mut ast = parse(&source).unwrap();
        post_process(&mut ast, limits).unwrap();
        build_nfa(&ast, direction, limits)
    }

    #[test]
    fn test_forward_nfa_shape() {
        let nfa = nfa("ab", Direction::Forward, &CompilationLimits::default()).unwrap();
        // match, a, b, two saves for group 0, unanchored split + skip
        assert_eq!(nfa.len(), 7);
        assert!(matches!(nfa.state(nfa.anchored_start).kind, NfaStateKind::Save { slot: 0, .. }));
        assert!(matches!(&nfa.state(nfa.unanchored_start).kind, NfaStateKind::Split { targets } if targets[0] == nfa.anchored_start));
        assert_eq!(nfa.slot_count(), 2);
    }

    #[test]
    fn test_backward_nfa_has_no_saves() {
        let nfa = nfa("(a)b", Direction::Backward, &CompilationLimits::default()).unwrap();
        assert!(!nfa
            .states
            .iter()
            .any(|s| matches!(s.kind, NfaStateKind::Save { .. })));
        // the entry consumes 'b' first
        assert!(matches!(&nfa.state(nfa.anchored_start).kind, NfaStateKind::Char { set, .. } if set.contains('b' as u32)));
        assert_eq!(nfa.begin_assertion(), NfaAssertion::InputEnd);
    }

    #[test]
    fn test_loop_priority() {
        let nfa = nfa("a*?", Direction::Forward, &CompilationLimits::default()).unwrap();
        let lazy_split = nfa
            .states
            .iter()
            .find_map(|s| match &s.kind {
                NfaStateKind::Split { targets } if s.ast_node.is_some() => Some(targets.clone()),
                _ => None,
            })
            .unwrap();
        // lazy: exit first
        assert!(matches!(nfa.state(lazy_split[0]).kind, NfaStateKind::Save { slot: 1, .. }));
    }

    #[test]
    fn test_unsupported_constructs() {
        let limits = CompilationLimits::default();
        assert_eq!(
            nfa("a(?=b)", Direction::Forward, &limits).unwrap_err(),
            Bailout::Unsupported(UnsupportedFeature::LookAround)
        );
        assert_eq!(
            nfa("(a)\\1", Direction::Forward, &limits).unwrap_err(),
            Bailout::Unsupported(UnsupportedFeature::BackReference)
        );
        assert_eq!(
            nfa("\\ba", Direction::Forward, &limits).unwrap_err(),
            Bailout::Unsupported(UnsupportedFeature::WordBoundary)
        );
    }

    #[test]
    fn test_size_ceiling() {
        let limits = CompilationLimits::default().with_max_nfa_size(50);
        let err = nfa("(?:ab|cd){30}", Direction::Forward, &limits).unwrap_err();
        assert!(matches!(err, Bailout::NfaTooLarge { limit: 50, .. }));
    }
}
