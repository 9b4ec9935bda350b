//! DFA construction by subset construction
//!
//! A DFA state is an *ordered* list of NFA threads. The order is the NFA
//! priority order, which gives leftmost-first semantics for forward modes:
//! once a `Match` thread appears in a closure, every lower-priority thread is
//! cut. Backward mode (used to find match starts) wants the longest match and
//! therefore keeps every thread and keys states by the sorted thread set.
//!
//! # Modes
//!
//! | Mode | Direction | Entry | Captures |
//! |------|-----------|-------|----------|
//! | forward search | forward | unanchored (or anchored when sticky) | no |
//! | backward search | backward | anchored at match end | no |
//! | capture groups | forward | anchored at match start | partial transitions |
//! | trace finder | forward | anchored at match start | result index on accept |
//!
//! # Capture Tracking
//!
//! With `generic_cg`, each transition carries a [`CaptureProgram`]: a list of
//! `(source thread, target thread, slot updates)` copies that turn the
//! register rows of the source state's threads into the rows of the target
//! state's threads. Thread and slot indices are bytes, which bounds a state to
//! 255 threads and a pattern to 127 capture groups.
//!
//! # Assertions
//!
//! `^`/`$` become [`NfaAssertion`](super::nfa::NfaAssertion)s. The assertion on the side where the scan
//! begins is resolved while computing initial closures (two initial states:
//! at the input boundary or not). The assertion on the far side stays in the
//! thread list as a pending thread and is resolved by the end-of-input
//! closure stored in [`DfaState::accept_at_end`].

use super::buffer::CompilationBuffer;
use super::charset::CodePointSet;
use super::error::Bailout;
use super::matchers::CharMatcher;
use super::nfa::{Direction, NfaStateId, NfaStateKind, PureNfa};
use super::options::CompilationLimits;
use serde::Serialize;
use std::collections::VecDeque;

/// Index of a DFA state
pub type DfaStateId = u16;

/// Source thread index for rows created from scratch
pub const FRESH_ROW: u8 = 0xFF;

/// What the generator builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DfaMode {
    /// Scan direction
    pub direction: Direction,
    /// Use the unanchored entry (the match may start anywhere)
    pub searching: bool,
    /// Emit capture partial transitions
    pub generic_cg: bool,
    /// Allow the single-register execution shortcut
    pub allow_simple_cg: bool,
    /// Track the index of the last closed group
    pub track_last_group: bool,
}

impl DfaMode {
    /// Forward DFA locating match ends
    pub fn forward_search(searching: bool) -> Self {
        Self {
            direction: Direction::Forward,
            searching,
            generic_cg: false,
            allow_simple_cg: false,
            track_last_group: false,
        }
    }

    /// Backward DFA locating match starts from a known end
    pub fn backward_search() -> Self {
        Self {
            direction: Direction::Backward,
            searching: false,
            generic_cg: false,
            allow_simple_cg: false,
            track_last_group: false,
        }
    }

    /// Forward DFA tracking capture groups from a known start
    pub fn capture_groups(track_last_group: bool) -> Self {
        Self {
            direction: Direction::Forward,
            searching: false,
            generic_cg: true,
            allow_simple_cg: true,
            track_last_group,
        }
    }

    /// Forward DFA over a trace finder NFA
    pub fn trace_finder() -> Self {
        Self {
            direction: Direction::Forward,
            searching: false,
            generic_cg: false,
            allow_simple_cg: false,
            track_last_group: false,
        }
    }

    /// Whether the DFA keeps every thread instead of cutting after a match
    pub fn is_longest(&self) -> bool {
        self.direction == Direction::Backward
    }
}

/// One register update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CaptureOp {
    /// Store the current position in a slot
    Save(u8),
    /// Store a group index in the last-group register
    LastGroup(u8),
}

/// Copy one register row into another, then apply updates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ThreadCopy {
    /// Thread of the source state, or [`FRESH_ROW`]
    pub source: u8,
    /// Thread of the target state
    pub target: u8,
    /// Updates applied after copying
    pub ops: Vec<CaptureOp>,
}

/// Partial transition: how register rows move along a DFA edge
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CaptureProgram {
    /// Copies in target-thread order
    pub copies: Vec<ThreadCopy>,
}

/// How a state accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DfaAccept {
    /// Thread whose register row holds the result
    pub thread: u8,
    /// Updates applied to that row when accepting
    pub ops: Vec<CaptureOp>,
    /// Trace finder result index
    pub result: u8,
}

/// Outgoing edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DfaTransition {
    /// Code points taking the edge
    pub set: CodePointSet,
    /// Executable form of `set`
    pub matcher: CharMatcher,
    /// Target state
    pub target: DfaStateId,
    /// Register movement, with `generic_cg`
    pub program: Option<CaptureProgram>,
}

/// DFA state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DfaState {
    /// NFA threads in priority order
    pub threads: Vec<NfaStateId>,
    /// Initial state created at the input boundary
    pub at_begin: bool,
    /// Outgoing edges
    pub transitions: Vec<DfaTransition>,
    /// Accepting before the end of input
    pub accept: Option<DfaAccept>,
    /// Accepting at the end of input (pending assertions resolved)
    pub accept_at_end: Option<DfaAccept>,
}

impl DfaState {
    /// The transition taken on `cp`
    #[inline]
    pub fn step(&self, cp: u32) -> Option<&DfaTransition> {
        self.transitions.iter().find(|t| t.matcher.matches(cp))
    }
}

/// Entry into the DFA
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitialState {
    /// Entry state
    pub state: DfaStateId,
    /// Creates the initial register rows
    pub program: Option<CaptureProgram>,
}

/// Deterministic automaton
#[derive(Debug, Clone, Serialize)]
pub struct Dfa {
    /// Generation mode
    pub mode: DfaMode,
    /// States; ids index this vector
    pub states: Vec<DfaState>,
    /// `[at input boundary, elsewhere]` entries; `None` when nothing can match
    pub initial: [Option<InitialState>; 2],
    /// Every state has at most one thread
    pub simple_cg: bool,
    /// Register row width (two slots per group plus the last-group register)
    pub row_width: usize,
    /// Index of the last-group register when tracked
    pub last_group_slot: Option<usize>,
}

impl Dfa {
    /// Number of states
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the DFA has no states
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Entry for a scan that begins at the input boundary or not
    #[inline]
    pub fn initial_state(&self, at_boundary: bool) -> Option<&InitialState> {
        self.initial[if at_boundary { 0 } else { 1 }].as_ref()
    }

    /// Number of edges
    pub fn transition_count(&self) -> usize {
        self.states.iter().map(|s| s.transitions.len()).sum()
    }

    /// Largest thread list
    pub fn max_threads(&self) -> usize {
        self.states.iter().map(|s| s.threads.len()).max().unwrap_or(0)
    }
}

/// Generator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GeneratorPhase {
    /// Not started
    Initial,
    /// Expanding the state queue
    Building,
    /// Finished successfully
    Done,
    /// Gave up on a ceiling
    BailedOut,
}

/// One thread produced by an epsilon closure
#[derive(Debug, Clone)]
struct ClosureThread {
    state: NfaStateId,
    source: u8,
    ops: Vec<CaptureOp>,
}

/// Builds a [`Dfa`] from a [`PureNfa`]
pub struct DfaGenerator<'a> {
    nfa: &'a PureNfa,
    mode: DfaMode,
    buffer: &'a mut CompilationBuffer,
    max_states: usize,
    max_threads: usize,
    max_capture_groups: usize,
    bitset_threshold: usize,
    states: Vec<DfaState>,
    state_map: hashbrown::HashMap<(bool, Vec<NfaStateId>), DfaStateId, ahash::RandomState>,
    queue: VecDeque<DfaStateId>,
    phase: GeneratorPhase,
}

impl<'a> DfaGenerator<'a> {
    /// Create a generator
    pub fn new(
        nfa: &'a PureNfa,
        mode: DfaMode,
        limits: &CompilationLimits,
        buffer: &'a mut CompilationBuffer,
    ) -> Self {
        Self {
            nfa,
            mode,
            buffer,
            max_states: limits.max_dfa_size,
            max_threads: limits.max_threads_per_dfa_state,
            max_capture_groups: limits.max_dfa_capture_groups,
            bitset_threshold: limits.bitset_threshold,
            states: Vec::new(),
            state_map: hashbrown::HashMap::with_hasher(ahash::RandomState::new()),
            queue: VecDeque::new(),
            phase: GeneratorPhase::Initial,
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> GeneratorPhase {
        self.phase
    }

    /// Run subset construction
    pub fn generate(&mut self) -> Result<Dfa, Bailout> {
        self.phase = GeneratorPhase::Building;
        match self.build() {
            Ok(dfa) => {
                self.phase = GeneratorPhase::Done;
                log_debug!(
                    "DFA ({:?}, searching={}) built with {} states",
                    self.mode.direction,
                    self.mode.searching,
                    dfa.states.len()
                );
                Ok(dfa)
            }
            Err(bailout) => {
                self.phase = GeneratorPhase::BailedOut;
                log_debug!("DFA generation bailed out: {}", bailout);
                Err(bailout)
            }
        }
    }

    fn build(&mut self) -> Result<Dfa, Bailout> {
        if self.mode.generic_cg && self.nfa.capture_groups > self.max_capture_groups {
            return Err(Bailout::TooManyCaptureGroups {
                groups: self.nfa.capture_groups,
                limit: self.max_capture_groups,
            });
        }

        let entry = if self.mode.searching {
            self.nfa.unanchored_start
        } else {
            self.nfa.anchored_start
        };
        let mut initial: [Option<InitialState>; 2] = [None, None];
        for (slot, at_begin) in [(0, true), (1, false)] {
            let closure = self.closure(&[(FRESH_ROW, entry)], at_begin, false);
            if closure.is_empty() {
                continue;
            }
            let state = self.intern(at_begin, &closure)?;
            initial[slot] = Some(InitialState {
                state,
                program: self.program(&closure),
            });
        }

        while let Some(id) = self.queue.pop_front() {
            self.expand(id)?;
        }

        let simple_cg = self.mode.generic_cg
            && self.mode.allow_simple_cg
            && self.states.iter().all(|s| s.threads.len() <= 1);
        let slots = self.nfa.slot_count();
        let last_group_slot = self.mode.track_last_group.then_some(slots);
        Ok(Dfa {
            mode: self.mode,
            states: std::mem::take(&mut self.states),
            initial,
            simple_cg,
            row_width: slots + usize::from(self.mode.track_last_group),
            last_group_slot,
        })
    }

    /// Look up or create the state for a closure
    fn intern(&mut self, at_begin: bool, closure: &[ClosureThread]) -> Result<DfaStateId, Bailout> {
        if closure.len() > self.max_threads {
            return Err(Bailout::TooManyThreads {
                threads: closure.len(),
                limit: self.max_threads,
            });
        }
        let mut threads: Vec<NfaStateId> = closure.iter().map(|t| t.state).collect();
        if self.mode.is_longest() {
            threads.sort_unstable();
            threads.dedup();
        }
        let key = (at_begin, threads);
        if let Some(&id) = self.state_map.get(&key) {
            return Ok(id);
        }
        if self.states.len() >= self.max_states {
            return Err(Bailout::DfaTooLarge {
                states: self.states.len() + 1,
                limit: self.max_states,
            });
        }
        let id = self.states.len() as DfaStateId;
        self.states.push(DfaState {
            threads: key.1.clone(),
            at_begin,
            transitions: Vec::new(),
            accept: None,
            accept_at_end: None,
        });
        self.state_map.insert(key, id);
        self.queue.push_back(id);
        Ok(id)
    }

    fn program(&self, closure: &[ClosureThread]) -> Option<CaptureProgram> {
        if !self.mode.generic_cg {
            return None;
        }
        Some(CaptureProgram {
            copies: closure
                .iter()
                .enumerate()
                .map(|(target, t)| ThreadCopy {
                    source: t.source,
                    target: target as u8,
                    ops: t.ops.clone(),
                })
                .collect(),
        })
    }

    /// Compute transitions and acceptance of state `id`
    fn expand(&mut self, id: DfaStateId) -> Result<(), Bailout> {
        let nfa = self.nfa;
        let threads = self.states[id as usize].threads.clone();
        let at_begin = self.states[id as usize].at_begin;

        // consuming threads: (thread index, set, successor)
        let consuming: Vec<(u8, &CodePointSet, NfaStateId)> = threads
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| match &nfa.state(s).kind {
                NfaStateKind::Char { set, next } => Some((i as u8, set, *next)),
                _ => None,
            })
            .collect();

        let points = {
            let breakpoints = self.buffer.breakpoints();
            for (_, set, _) in &consuming {
                for &(lo, hi) in set.ranges() {
                    breakpoints.push(lo);
                    breakpoints.push(hi + 1);
                }
            }
            breakpoints.sort_unstable();
            breakpoints.dedup();
            breakpoints.clone()
        };

        // group elementary intervals by the threads they advance
        let mut groups: Vec<(Vec<u8>, Vec<(u32, u32)>)> = Vec::new();
        let mut group_index: hashbrown::HashMap<Vec<u8>, usize> = hashbrown::HashMap::new();
        for window in points.windows(2) {
            let (lo, hi) = (window[0], window[1] - 1);
            let matching: Vec<u8> = consuming
                .iter()
                .filter(|(_, set, _)| set.contains(lo))
                .map(|(i, _, _)| *i)
                .collect();
            if matching.is_empty() {
                continue;
            }
            match group_index.get(&matching) {
                Some(&g) => groups[g].1.push((lo, hi)),
                None => {
                    group_index.insert(matching.clone(), groups.len());
                    groups.push((matching, vec![(lo, hi)]));
                }
            }
        }

        let mut transitions: Vec<DfaTransition> = Vec::new();
        for (matching, ranges) in groups {
            let seeds: Vec<(u8, NfaStateId)> = matching
                .iter()
                .filter_map(|&i| {
                    consuming
                        .iter()
                        .find(|(t, _, _)| *t == i)
                        .map(|(_, _, next)| (i, *next))
                })
                .collect();
            let closure = self.closure(&seeds, false, false);
            if closure.is_empty() {
                continue;
            }
            let target = self.intern(false, &closure)?;
            let program = self.program(&closure);
            let set = CodePointSet::from_ranges(ranges);
            match transitions
                .iter_mut()
                .find(|t| t.target == target && t.program == program)
            {
                Some(existing) => existing.set = existing.set.union(&set),
                None => transitions.push(DfaTransition {
                    matcher: CharMatcher::Empty,
                    set,
                    target,
                    program,
                }),
            }
        }
        for transition in &mut transitions {
            transition.matcher = CharMatcher::build(&transition.set, self.bitset_threshold);
        }

        let accept = threads.iter().enumerate().find_map(|(i, &s)| match nfa.state(s).kind {
            NfaStateKind::Match { result } => Some(DfaAccept {
                thread: i as u8,
                ops: Vec::new(),
                result,
            }),
            _ => None,
        });
        let accept_at_end = self.accept_at_end(&threads, at_begin);

        let state = &mut self.states[id as usize];
        state.transitions = transitions;
        state.accept = accept;
        state.accept_at_end = accept_at_end;
        Ok(())
    }

    /// Resolve pending far-side assertions at the end of input
    fn accept_at_end(&mut self, threads: &[NfaStateId], at_begin: bool) -> Option<DfaAccept> {
        let nfa = self.nfa;
        for (i, &s) in threads.iter().enumerate() {
            match &nfa.state(s).kind {
                NfaStateKind::Match { result } => {
                    return Some(DfaAccept {
                        thread: i as u8,
                        ops: Vec::new(),
                        result: *result,
                    });
                }
                NfaStateKind::Assert { next, .. } => {
                    let closure = self.closure(&[(i as u8, *next)], at_begin, true);
                    let reached = closure.into_iter().find_map(|t| {
                        match nfa.state(t.state).kind {
                            NfaStateKind::Match { result } => Some((t.ops, result)),
                            _ => None,
                        }
                    });
                    if let Some((ops, result)) = reached {
                        return Some(DfaAccept {
                            thread: i as u8,
                            ops,
                            result,
                        });
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Epsilon closure of `seeds` in priority order
    ///
    /// `at_begin`: the scan-begin boundary assertion holds here.
    /// `at_finish`: the scan-finish boundary assertion holds here and no
    /// further input will be consumed.
    fn closure(
        &mut self,
        seeds: &[(u8, NfaStateId)],
        at_begin: bool,
        at_finish: bool,
    ) -> Vec<ClosureThread> {
        let nfa = self.nfa;
        let begin_assertion = nfa.begin_assertion();
        let cut_after_match = !self.mode.is_longest();
        let track_ops = self.mode.generic_cg;
        let track_last_group = self.mode.track_last_group;

        self.buffer.begin_visit(nfa.len());
        let mut out: Vec<ClosureThread> = Vec::new();
        for &(source, start) in seeds {
            let mut stack: Vec<(NfaStateId, Vec<CaptureOp>)> = vec![(start, Vec::new())];
            while let Some((s, ops)) = stack.pop() {
                if !self.buffer.visit(s) {
                    continue;
                }
                match &nfa.state(s).kind {
                    NfaStateKind::Char { .. } => {
                        if !at_finish {
                            out.push(ClosureThread { state: s, source, ops });
                        }
                    }
                    NfaStateKind::Match { .. } => {
                        out.push(ClosureThread { state: s, source, ops });
                        if cut_after_match {
                            return out;
                        }
                    }
                    NfaStateKind::Split { targets } => {
                        for &t in targets.iter().rev() {
                            stack.push((t, ops.clone()));
                        }
                    }
                    NfaStateKind::Save { slot, next } => {
                        let mut ops = ops;
                        if track_ops {
                            ops.push(CaptureOp::Save(*slot as u8));
                            if track_last_group && slot % 2 == 1 && *slot > 1 {
                                ops.push(CaptureOp::LastGroup((*slot / 2) as u8));
                            }
                        }
                        stack.push((*next, ops));
                    }
                    NfaStateKind::Assert { assertion, next } => {
                        if *assertion == begin_assertion {
                            if at_begin {
                                stack.push((*next, ops));
                            }
                        } else if at_finish {
                            stack.push((*next, ops));
                        } else {
                            out.push(ClosureThread { state: s, source, ops });
                        }
                    }
                }
            }
        }
        out
    }
}

/// Build a DFA for `nfa` in `mode`
pub fn build_dfa(
    nfa: &PureNfa,
    mode: DfaMode,
    limits: &CompilationLimits,
    buffer: &mut CompilationBuffer,
) -> Result<Dfa, Bailout> {
    DfaGenerator::new(nfa, mode, limits, buffer).generate()
}
