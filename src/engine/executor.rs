//! Match-time execution of compiled patterns
//!
//! Every compilation ends in exactly one [`Executor`]: dead, literal,
//! automaton or backtracking. All of them search `&str` input from a byte
//! offset and report byte offsets.
//!
//! The automaton executor works in up to three passes:
//!
//! 1. the forward DFA finds the end of the leftmost match
//! 2. the backward DFA, run from that end, finds its start
//! 3. the trace finder or the capture DFA, run from the start, fills in
//!    the capture groups
//!
//! Sticky patterns skip pass 2 (the start is known) and boolean matchers
//! stop after pass 1.

use super::backtrack::BacktrackingExecutor;
use super::dfa::{CaptureOp, CaptureProgram, Dfa, DfaAccept, FRESH_ROW};
use super::literal::LiteralExecutor;
use super::trace_finder::TraceFinder;
use serde::Serialize;
use std::fmt;

/// Which strategy a compilation selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExecutorKind {
    /// Matches nothing
    Dead,
    /// Substring search
    Literal,
    /// DFA, possibly with a trace finder
    Automaton,
    /// Backtracking fallback
    Backtracking,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutorKind::Dead => "dead",
            ExecutorKind::Literal => "literal",
            ExecutorKind::Automaton => "automaton",
            ExecutorKind::Backtracking => "backtracking",
        };
        f.write_str(name)
    }
}

/// A successful match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    slots: Vec<Option<usize>>,
    last_group: Option<usize>,
}

impl MatchResult {
    /// Create a result from capture slots
    pub fn new(slots: Vec<Option<usize>>, last_group: Option<usize>) -> Self {
        Self { slots, last_group }
    }

    /// Result of a boolean-only matcher: no positions
    pub fn boolean() -> Self {
        Self {
            slots: Vec::new(),
            last_group: None,
        }
    }

    /// Start of the match (`None` for boolean-only matchers)
    pub fn start(&self) -> Option<usize> {
        self.slots.first().copied().flatten()
    }

    /// End of the match (`None` for boolean-only matchers)
    pub fn end(&self) -> Option<usize> {
        self.slots.get(1).copied().flatten()
    }

    /// Bounds of group `index`, if it participated
    pub fn group(&self, index: usize) -> Option<(usize, usize)> {
        let start = self.slots.get(index * 2).copied().flatten()?;
        let end = self.slots.get(index * 2 + 1).copied().flatten()?;
        Some((start, end))
    }

    /// Number of groups reported, including group 0
    pub fn group_count(&self) -> usize {
        self.slots.len() / 2
    }

    /// Raw capture slots
    pub fn slots(&self) -> &[Option<usize>] {
        &self.slots
    }

    /// Index of the last closed group (Python flavor only)
    pub fn last_group(&self) -> Option<usize> {
        self.last_group
    }
}

/// How an automaton executor recovers capture groups
#[derive(Debug, Clone, Serialize)]
pub enum CaptureStrategy {
    /// Only group 0 is reported
    None,
    /// Precomputed results selected by an anchored DFA
    TraceFinder(TraceFinder),
    /// Live register tracking
    Dfa(Dfa),
}

/// DFA-based executor
#[derive(Debug, Clone, Serialize)]
pub struct AutomatonExecutor {
    /// Locates match ends
    pub forward: Dfa,
    /// Locates match starts; absent for sticky and boolean matchers
    pub backward: Option<Dfa>,
    /// Capture group recovery
    pub captures: CaptureStrategy,
    /// Capture groups, including group 0
    pub capture_groups: usize,
    /// Match only at the start position
    pub sticky: bool,
    /// Report only whether a match exists
    pub boolean_match_only: bool,
}

impl AutomatonExecutor {
    /// Find the leftmost match at or after `from`
    pub fn exec(&self, input: &str, from: usize) -> Option<MatchResult> {
        if self.boolean_match_only {
            return scan_forward(&self.forward, input, from, true).map(|_| MatchResult::boolean());
        }
        let end = scan_forward(&self.forward, input, from, false)?;
        let start = match &self.backward {
            Some(backward) => scan_backward(backward, input, end, from)?,
            None => from,
        };

        let (slots, last_group) = match &self.captures {
            CaptureStrategy::None => (vec![Some(start), Some(end)], None),
            CaptureStrategy::TraceFinder(tf) => {
                let accept = scan_anchored(&tf.dfa, input, start, end)?;
                let result = tf.results.get(accept.result as usize)?;
                (result.apply(input, start), None)
            }
            CaptureStrategy::Dfa(dfa) => scan_captures(dfa, input, start, end)?,
        };
        Some(MatchResult::new(slots, last_group))
    }

    /// Total DFA states over all passes
    pub fn state_count(&self) -> usize {
        self.forward.len()
            + self.backward.as_ref().map_or(0, Dfa::len)
            + match &self.captures {
                CaptureStrategy::None => 0,
                CaptureStrategy::TraceFinder(tf) => tf.dfa.len(),
                CaptureStrategy::Dfa(dfa) => dfa.len(),
            }
    }
}

/// Terminal executor of a compilation
#[derive(Debug, Clone, Serialize)]
pub enum Executor {
    /// Matches nothing, not even the empty string
    Dead,
    /// Fixed string search
    Literal(LiteralExecutor),
    /// DFA passes
    Automaton(Box<AutomatonExecutor>),
    /// Backtracking programs
    Backtracking(BacktrackingExecutor),
}

impl Executor {
    /// Strategy of this executor
    pub fn kind(&self) -> ExecutorKind {
        match self {
            Executor::Dead => ExecutorKind::Dead,
            Executor::Literal(_) => ExecutorKind::Literal,
            Executor::Automaton(_) => ExecutorKind::Automaton,
            Executor::Backtracking(_) => ExecutorKind::Backtracking,
        }
    }

    /// Find the leftmost match at or after byte offset `from`
    ///
    /// A `from` inside a multi-byte character is moved to the next character
    /// boundary (sticky matchers fail instead).
    pub fn exec(&self, input: &str, from: usize, sticky: bool) -> Option<MatchResult> {
        if from > input.len() {
            return None;
        }
        let mut from = from;
        while !input.is_char_boundary(from) {
            if sticky {
                return None;
            }
            from += 1;
        }
        match self {
            Executor::Dead => None,
            Executor::Literal(literal) => literal
                .find(input, from)
                .map(|(start, end)| MatchResult::new(vec![Some(start), Some(end)], None)),
            Executor::Automaton(automaton) => automaton.exec(input, from),
            Executor::Backtracking(backtracking) => backtracking
                .exec(input, from)
                .map(|(slots, last_group)| MatchResult::new(slots, last_group)),
        }
    }
}

// ============================================================================
// DFA scans
// ============================================================================

/// Scan forward from `from`; returns the last accepting position
///
/// With `first`, returns at the first accepting position instead.
pub fn scan_forward(dfa: &Dfa, input: &str, from: usize, first: bool) -> Option<usize> {
    let initial = dfa.initial_state(from == 0)?;
    let mut state = &dfa.states[initial.state as usize];
    let mut last = None;
    let mut pos = from;
    loop {
        if pos == input.len() {
            if state.accept_at_end.is_some() {
                last = Some(pos);
            }
            return last;
        }
        if state.accept.is_some() {
            last = Some(pos);
            if first {
                return last;
            }
        }
        let Some(c) = input[pos..].chars().next() else {
            return last;
        };
        match state.step(c as u32) {
            Some(transition) => {
                state = &dfa.states[transition.target as usize];
                pos += c.len_utf8();
            }
            None => return last,
        }
    }
}

/// Scan backward from `end` down to `from`; returns the smallest accepting
/// position
pub fn scan_backward(dfa: &Dfa, input: &str, end: usize, from: usize) -> Option<usize> {
    let initial = dfa.initial_state(end == input.len())?;
    let mut state = &dfa.states[initial.state as usize];
    let mut best = None;
    let mut pos = end;
    loop {
        let accepts = if pos == 0 {
            state.accept_at_end.is_some()
        } else {
            state.accept.is_some()
        };
        if accepts {
            best = Some(pos);
        }
        if pos <= from {
            return best;
        }
        let Some(c) = input[..pos].chars().next_back() else {
            return best;
        };
        match state.step(c as u32) {
            Some(transition) => {
                state = &dfa.states[transition.target as usize];
                pos -= c.len_utf8();
            }
            None => return best,
        }
    }
}

/// Run an anchored DFA over `input[start..end]` and return how it accepts at `end`
pub fn scan_anchored<'d>(dfa: &'d Dfa, input: &str, start: usize, end: usize) -> Option<&'d DfaAccept> {
    let initial = dfa.initial_state(start == 0)?;
    let mut state = &dfa.states[initial.state as usize];
    for c in input[start..end].chars() {
        state = &dfa.states[state.step(c as u32)?.target as usize];
    }
    if end == input.len() {
        state.accept_at_end.as_ref()
    } else {
        state.accept.as_ref()
    }
}

/// Run the capture DFA over `input[start..end]`, tracking register rows
pub fn scan_captures(dfa: &Dfa, input: &str, start: usize, end: usize) -> Option<(Vec<Option<usize>>, Option<usize>)> {
    let initial = dfa.initial_state(start == 0)?;
    let width = dfa.row_width;
    let mut state = &dfa.states[initial.state as usize];

    let row = if dfa.simple_cg {
        let mut row = vec![None; width];
        apply_simple(initial.program.as_ref(), &mut row, start);
        let mut pos = start;
        for c in input[start..end].chars() {
            let transition = state.step(c as u32)?;
            pos += c.len_utf8();
            apply_simple(transition.program.as_ref(), &mut row, pos);
            state = &dfa.states[transition.target as usize];
        }
        let accept = accept_at(state, end == input.len())?;
        apply_ops(&accept.ops, &mut row, end);
        row
    } else {
        let mut rows = apply_program(initial.program.as_ref(), &[], width, start);
        let mut pos = start;
        for c in input[start..end].chars() {
            let transition = state.step(c as u32)?;
            pos += c.len_utf8();
            rows = apply_program(transition.program.as_ref(), &rows, width, pos);
            state = &dfa.states[transition.target as usize];
        }
        let accept = accept_at(state, end == input.len())?;
        let mut row = rows.get(accept.thread as usize)?.clone();
        apply_ops(&accept.ops, &mut row, end);
        row
    };

    let last_group = dfa.last_group_slot.and_then(|slot| row[slot]);
    let mut slots = row;
    if let Some(slot) = dfa.last_group_slot {
        slots.truncate(slot);
    }
    Some((slots, last_group))
}

fn accept_at(state: &super::dfa::DfaState, at_end: bool) -> Option<&DfaAccept> {
    if at_end {
        state.accept_at_end.as_ref()
    } else {
        state.accept.as_ref()
    }
}

fn apply_ops(ops: &[CaptureOp], row: &mut [Option<usize>], pos: usize) {
    for op in ops {
        match *op {
            CaptureOp::Save(slot) => row[slot as usize] = Some(pos),
            // the last-group register is the final cell of the row
            CaptureOp::LastGroup(group) => {
                if let Some(cell) = row.last_mut() {
                    *cell = Some(group as usize);
                }
            }
        }
    }
}

fn apply_simple(program: Option<&CaptureProgram>, row: &mut Vec<Option<usize>>, pos: usize) {
    let Some(copy) = program.and_then(|p| p.copies.first()) else {
        return;
    };
    if copy.source == FRESH_ROW {
        row.iter_mut().for_each(|cell| *cell = None);
    }
    apply_ops(&copy.ops, row, pos);
}

fn apply_program(
    program: Option<&CaptureProgram>,
    rows: &[Vec<Option<usize>>],
    width: usize,
    pos: usize,
) -> Vec<Vec<Option<usize>>> {
    let Some(program) = program else {
        return rows.to_vec();
    };
    program
        .copies
        .iter()
        .map(|copy| {
            let mut row = if copy.source == FRESH_ROW {
                vec![None; width]
            } else {
                rows.get(copy.source as usize)
                    .cloned()
                    .unwrap_or_else(|| vec![None; width])
            };
            apply_ops(&copy.ops, &mut row, pos);
            row
        })
        .collect()
}
