//! Pattern properties
//!
//! Computed once after post-processing, these flags drive every strategy
//! decision in the orchestrator: whether an automaton can be built at all,
//! whether capture tracking is needed, and whether the trace finder applies.
//!
//! # Example
//!
//! ```
//! use retrace::engine::{parse, post_process, CompilationLimits, RegexProperties, RegexSource};
//!
//! let source = RegexSource::parse("(a)(b)", "").unwrap();
//! let mut ast = parse(&source).unwrap();
//! post_process(&mut ast, &CompilationLimits::default()).unwrap();
//! let props = RegexProperties::analyze(&ast);
//! assert!(props.has_capture_groups);
//! assert!(!props.has_loops);
//! assert_eq!(props.min_match_length, 2);
//! ```

use super::ast::{AnchorKind, LookAroundKind, NodeId, NodeKind, RegexAst};
use super::error::UnsupportedFeature;
use super::source::Encoding;
use super::charset::CodePointSet;
use serde::Serialize;

/// Flags describing a post-processed pattern
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegexProperties {
    /// A group with more than one live alternative exists
    pub has_alternations: bool,
    /// `(?=` or `(?!`
    pub has_look_ahead_assertions: bool,
    /// `(?<=` or `(?<!`
    pub has_look_behind_assertions: bool,
    /// `\N` or `\k<name>`
    pub has_back_references: bool,
    /// Capture groups beyond group 0
    pub has_capture_groups: bool,
    /// Quantifiers remain after unrolling
    pub has_loops: bool,
    /// Every character class matches code points of one encoded width
    pub is_fixed_code_point_width: bool,
    /// The offset of the first capture group from the match start varies
    pub has_variable_prefix_length: bool,
    /// Word boundaries or multiline anchors
    pub has_unsupported_assertions: bool,
    /// `\b` or `\B`
    pub has_word_boundaries: bool,
    /// `^` or `$` under the multiline flag
    pub has_multiline_anchors: bool,
    /// Shortest possible match, in code points
    pub min_match_length: u32,
    /// Longest possible match, in code points (`None` if unbounded)
    pub max_match_length: Option<u32>,
}

impl RegexProperties {
    /// Analyze `ast`
    pub fn analyze(ast: &RegexAst) -> Self {
        PropertiesAnalyzer::new(ast).analyze()
    }

    /// Features that prevent building an automaton
    pub fn blocking_features(&self) -> Vec<UnsupportedFeature> {
        let mut features = Vec::new();
        if self.has_look_ahead_assertions || self.has_look_behind_assertions {
            features.push(UnsupportedFeature::LookAround);
        }
        if self.has_back_references {
            features.push(UnsupportedFeature::BackReference);
        }
        if self.has_word_boundaries {
            features.push(UnsupportedFeature::WordBoundary);
        }
        if self.has_multiline_anchors {
            features.push(UnsupportedFeature::MultilineAnchor);
        }
        features
    }

    /// Whether an NFA/DFA can represent the pattern
    pub fn is_automaton_eligible(&self) -> bool {
        self.blocking_features().is_empty()
    }

    /// Whether the trace finder may replace generic capture tracking
    pub fn is_trace_finder_eligible(&self) -> bool {
        self.has_capture_groups
            && !self.has_loops
            && self.is_fixed_code_point_width
            && !self.has_variable_prefix_length
            && self.is_automaton_eligible()
    }
}

/// Match length bounds in code points
type Length = (u32, Option<u32>);

fn add_lengths(a: Length, b: Length) -> Length {
    (
        a.0.saturating_add(b.0),
        a.1.zip(b.1).map(|(x, y)| x.saturating_add(y)),
    )
}

/// Result of looking for the first capture group
enum Prefix {
    /// No capture group; the accumulated prefix length
    NotFound(Length),
    /// A capture group was reached at this offset (`None` if it varies)
    Found(Option<u32>),
}

/// Single-pass property computation
pub struct PropertiesAnalyzer<'a> {
    ast: &'a RegexAst,
    lengths: Vec<Length>,
}

impl<'a> PropertiesAnalyzer<'a> {
    /// Create an analyzer for `ast`
    pub fn new(ast: &'a RegexAst) -> Self {
        Self {
            ast,
            lengths: vec![(0, Some(0)); ast.len()],
        }
    }

    /// Compute all properties
    pub fn analyze(mut self) -> RegexProperties {
        let ast = self.ast;
        let encoding = ast.encoding;
        let mut props = RegexProperties {
            has_capture_groups: ast.capture_groups() > 1,
            is_fixed_code_point_width: true,
            ..Default::default()
        };
        let mut width: Option<usize> = None;

        for id in ast.preorder(ast.root(), true) {
            match ast.kind(id) {
                NodeKind::Group { alternatives, .. } => {
                    if alternatives.len() > 1 {
                        props.has_alternations = true;
                    }
                }
                NodeKind::CharClass(set) => {
                    if !encoded_width_is(encoding, set, &mut width) {
                        props.is_fixed_code_point_width = false;
                    }
                }
                NodeKind::BackReference { .. } => props.has_back_references = true,
                NodeKind::Anchor(kind) => match kind {
                    AnchorKind::Start | AnchorKind::End => {}
                    AnchorKind::WordBoundary | AnchorKind::NonWordBoundary => {
                        props.has_word_boundaries = true;
                        props.has_unsupported_assertions = true;
                    }
                    AnchorKind::LineStart | AnchorKind::LineEnd => {
                        props.has_multiline_anchors = true;
                        props.has_unsupported_assertions = true;
                    }
                },
                NodeKind::LookAround { kind, .. } => match kind {
                    LookAroundKind::LookAhead => props.has_look_ahead_assertions = true,
                    LookAroundKind::LookBehind => props.has_look_behind_assertions = true,
                },
                NodeKind::Quantified { .. } => props.has_loops = true,
                NodeKind::Sequence(_) => {}
            }
        }

        let root = ast.root();
        for id in ast.postorder(root, false) {
            self.lengths[id as usize] = self.length_of(id);
        }
        let (min, max) = self.lengths[root as usize];
        props.min_match_length = min;
        props.max_match_length = max;

        props.has_variable_prefix_length = match self.prefix(root, (0, Some(0))) {
            Prefix::Found(offset) => offset.is_none(),
            Prefix::NotFound(_) => false,
        };
        props
    }

    fn length_of(&self, id: NodeId) -> Length {
        let len = |n: &NodeId| self.lengths[*n as usize];
        match self.ast.kind(id) {
            NodeKind::CharClass(_) => (1, Some(1)),
            NodeKind::Sequence(terms) => terms
                .iter()
                .fold((0, Some(0)), |acc, t| add_lengths(acc, len(t))),
            NodeKind::Group { alternatives, .. } => {
                if alternatives.is_empty() {
                    return (0, Some(0));
                }
                let min = alternatives.iter().map(|a| len(a).0).min().unwrap_or(0);
                let max = alternatives
                    .iter()
                    .map(|a| len(a).1)
                    .try_fold(0u32, |acc, m| m.map(|m| acc.max(m)));
                (min, max)
            }
            NodeKind::Quantified { term, quantifier } => {
                let (term_min, term_max) = len(term);
                let min = term_min.saturating_mul(quantifier.min);
                let max = match (quantifier.max, term_max) {
                    (_, Some(0)) => Some(0),
                    (Some(q), Some(t)) => Some(q.saturating_mul(t)),
                    _ => None,
                };
                (min, max)
            }
            NodeKind::BackReference { .. } => (0, None),
            NodeKind::Anchor(_) | NodeKind::LookAround { .. } => (0, Some(0)),
        }
    }

    fn prefix(&self, id: NodeId, before: Length) -> Prefix {
        let fixed_offset = || (before.1 == Some(before.0)).then_some(before.0);
        match self.ast.kind(id) {
            NodeKind::Group {
                capture: Some(g), ..
            } if *g != 0 => Prefix::Found(fixed_offset()),
            NodeKind::Group { alternatives, .. } => {
                let mut offsets: Vec<Option<u32>> = Vec::new();
                for &alt in alternatives {
                    if let Prefix::Found(offset) = self.prefix(alt, before) {
                        offsets.push(offset);
                    }
                }
                if offsets.is_empty() {
                    return Prefix::NotFound(add_lengths(before, self.lengths[id as usize]));
                }
                let first = offsets[0];
                let consistent = offsets.len() == alternatives.len()
                    && offsets.iter().all(|o| o.is_some() && *o == first);
                Prefix::Found(if consistent { first } else { None })
            }
            NodeKind::Sequence(terms) => {
                let mut acc = before;
                for &term in terms {
                    match self.prefix(term, acc) {
                        Prefix::Found(offset) => return Prefix::Found(offset),
                        Prefix::NotFound(after) => acc = after,
                    }
                }
                Prefix::NotFound(acc)
            }
            NodeKind::Quantified { term, .. } if self.ast.contains_capture(*term) => {
                Prefix::Found(None)
            }
            _ => Prefix::NotFound(add_lengths(before, self.lengths[id as usize])),
        }
    }
}

/// Check that all members of `set` share one encoded width, equal to `width`
fn encoded_width_is(encoding: Encoding, set: &CodePointSet, width: &mut Option<usize>) -> bool {
    let (Some(lo), Some(hi)) = (set.min(), set.max()) else {
        return true;
    };
    // encoded length is monotonic in the code point
    let (lo_width, hi_width) = (encoding.encoded_len(lo), encoding.encoded_len(hi));
    if lo_width != hi_width {
        return false;
    }
    match width {
        Some(w) => *w == lo_width,
        None => {
            *width = Some(lo_width);
            true
        }
    }
}
