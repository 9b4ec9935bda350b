//! Trace finder: precomputed capture results for loop-free patterns
//!
//! When a pattern has no loops, fixed code-point width and a constant offset
//! to its first group, every way of matching it is a finite NFA path, and
//! every capture offset on that path is a constant distance (in code points)
//! from the match start. The trace finder enumerates those paths into a
//! path-tree NFA whose `Match` states carry an index into a table of
//! [`PreCalculatedResult`]s, then builds an anchored DFA over the tree.
//!
//! At match time the DFA only has to tell *which* path matched; capture
//! positions are read off the table instead of being tracked live.

use super::ast::RegexAst;
use super::buffer::CompilationBuffer;
use super::dfa::{build_dfa, Dfa, DfaMode};
use super::error::Bailout;
use super::nfa::{build_nfa, Direction, NfaState, NfaStateId, NfaStateKind, PureNfa};
use super::options::CompilationLimits;
use serde::Serialize;

/// Capture offsets of one path, in code points from the match start
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PreCalculatedResult {
    /// `slots[2g]`, `slots[2g + 1]`: start and end of group `g`
    pub slots: Vec<Option<u32>>,
}

impl PreCalculatedResult {
    /// Byte positions for a match starting at byte `start` of `input`
    pub fn apply(&self, input: &str, start: usize) -> Vec<Option<usize>> {
        let furthest = self.slots.iter().flatten().copied().max().unwrap_or(0) as usize;
        // byte offset of every code point boundary up to the furthest slot
        let mut boundaries = Vec::with_capacity(furthest + 1);
        boundaries.push(start);
        for (offset, c) in input[start..].char_indices().take(furthest) {
            boundaries.push(start + offset + c.len_utf8());
        }
        self.slots
            .iter()
            .map(|slot| slot.and_then(|cp| boundaries.get(cp as usize).copied()))
            .collect()
    }
}

/// Path tree NFA, result table and anchored DFA
#[derive(Debug, Clone, Serialize)]
pub struct TraceFinder {
    /// Result table indexed by [`DfaAccept::result`](super::dfa::DfaAccept::result)
    pub results: Vec<PreCalculatedResult>,
    /// The path tree
    pub nfa: PureNfa,
    /// Anchored forward DFA over the path tree
    pub dfa: Dfa,
}

/// Where a newly created tree state gets linked in
#[derive(Debug, Clone, Copy)]
enum Patch {
    Root,
    Next(NfaStateId),
    SplitTarget(NfaStateId, usize),
}

/// Builds a [`TraceFinder`]
pub struct TraceFinderGenerator<'a> {
    ast: &'a RegexAst,
    limits: CompilationLimits,
    tree: Vec<NfaState>,
    root: Option<NfaStateId>,
    results: Vec<PreCalculatedResult>,
    result_index: hashbrown::HashMap<Vec<Option<u32>>, u8>,
}

impl<'a> TraceFinderGenerator<'a> {
    /// Create a generator for an eligible AST
    pub fn new(ast: &'a RegexAst, limits: &CompilationLimits) -> Self {
        Self {
            ast,
            limits: *limits,
            tree: Vec::new(),
            root: None,
            results: Vec::new(),
            result_index: hashbrown::HashMap::new(),
        }
    }

    /// Enumerate paths and build the DFA
    pub fn generate(mut self, buffer: &mut CompilationBuffer) -> Result<TraceFinder, Bailout> {
        let source = build_nfa(self.ast, Direction::Forward, &self.limits)?;
        self.expand(&source)?;
        let root = self.root.ok_or(Bailout::TooManyTraceFinderResults {
            limit: self.limits.max_trace_finder_results,
        })?;
        let nfa = PureNfa {
            states: self.tree,
            anchored_start: root,
            unanchored_start: root,
            direction: Direction::Forward,
            capture_groups: source.capture_groups,
        };
        let dfa = build_dfa(&nfa, DfaMode::trace_finder(), &self.limits, buffer)?;
        log_debug!(
            "trace finder: {} paths -> {} results, {} tree states, {} DFA states",
            nfa.states.iter().filter(|s| matches!(s.kind, NfaStateKind::Match { .. })).count(),
            self.results.len(),
            nfa.len(),
            dfa.len()
        );
        Ok(TraceFinder {
            results: self.results,
            nfa,
            dfa,
        })
    }

    /// Walk every path of `source` into the tree
    fn expand(&mut self, source: &PureNfa) -> Result<(), Bailout> {
        let mut stack: Vec<(NfaStateId, Patch, u32, Vec<Option<u32>>)> =
            vec![(source.anchored_start, Patch::Root, 0, vec![None; source.slot_count()])];

        while let Some((id, patch, offset, mut slots)) = stack.pop() {
            match &source.state(id).kind {
                NfaStateKind::Save { slot, next } => {
                    slots[*slot as usize] = Some(offset);
                    stack.push((*next, patch, offset, slots));
                }
                NfaStateKind::Char { set, next } => {
                    let node = self.add(
                        NfaStateKind::Char {
                            set: set.clone(),
                            next: NfaStateId::MAX,
                        },
                        patch,
                    )?;
                    stack.push((*next, Patch::Next(node), offset + 1, slots));
                }
                NfaStateKind::Assert { assertion, next } => {
                    let node = self.add(
                        NfaStateKind::Assert {
                            assertion: *assertion,
                            next: NfaStateId::MAX,
                        },
                        patch,
                    )?;
                    stack.push((*next, Patch::Next(node), offset, slots));
                }
                NfaStateKind::Split { targets } => {
                    let node = self.add(
                        NfaStateKind::Split {
                            targets: vec![NfaStateId::MAX; targets.len()],
                        },
                        patch,
                    )?;
                    for (i, &target) in targets.iter().enumerate().rev() {
                        stack.push((target, Patch::SplitTarget(node, i), offset, slots.clone()));
                    }
                }
                NfaStateKind::Match { .. } => {
                    let result = self.intern(slots)?;
                    self.add(NfaStateKind::Match { result }, patch)?;
                }
            }
        }
        Ok(())
    }

    fn intern(&mut self, slots: Vec<Option<u32>>) -> Result<u8, Bailout> {
        if let Some(&index) = self.result_index.get(&slots) {
            return Ok(index);
        }
        if self.results.len() >= self.limits.max_trace_finder_results {
            return Err(Bailout::TooManyTraceFinderResults {
                limit: self.limits.max_trace_finder_results,
            });
        }
        let index = self.results.len() as u8;
        self.result_index.insert(slots.clone(), index);
        self.results.push(PreCalculatedResult { slots });
        Ok(index)
    }

    fn add(&mut self, kind: NfaStateKind, patch: Patch) -> Result<NfaStateId, Bailout> {
        if self.tree.len() >= self.limits.max_nfa_size {
            return Err(Bailout::NfaTooLarge {
                states: self.tree.len() + 1,
                limit: self.limits.max_nfa_size,
            });
        }
        let id = self.tree.len() as NfaStateId;
        self.tree.push(NfaState { kind, ast_node: None });
        match patch {
            Patch::Root => self.root = Some(id),
            Patch::Next(parent) => match &mut self.tree[parent as usize].kind {
                NfaStateKind::Char { next, .. } | NfaStateKind::Assert { next, .. } => *next = id,
                _ => {}
            },
            Patch::SplitTarget(parent, i) => {
                if let NfaStateKind::Split { targets } = &mut self.tree[parent as usize].kind {
                    targets[i] = id;
                }
            }
        }
        Ok(id)
    }
}

/// Build the trace finder for `ast`
pub fn build_trace_finder(
    ast: &RegexAst,
    limits: &CompilationLimits,
    buffer: &mut CompilationBuffer,
) -> Result<TraceFinder, Bailout> {
    TraceFinderGenerator::new(ast, limits).generate(buffer)
}
