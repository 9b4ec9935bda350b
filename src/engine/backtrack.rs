//! Backtracking executor
//!
//! The fallback strategy: handles everything the automata cannot
//! (lookaround, back references, word boundaries, multiline anchors, empty
//! match rejection) and everything that blew an automaton ceiling.
//!
//! # Construction
//!
//! Each lookaround body is its own subtree. The builder walks the subtree
//! tree with an explicit frame stack, building children before their parent,
//! and stores the results in an arena indexed by subtree id:
//!
//! - a body that is a plain string becomes a [`LiteralLookAround`]
//! - anything else becomes a [`BacktrackProgram`], compiled forward for the
//!   main expression and lookaheads and backward for lookbehinds
//!
//! Node compilation inside a subtree is iterative as well, so neither deep
//! group nesting nor deep lookaround nesting can exhaust the native stack
//! at build time.
//!
//! # Semantics
//!
//! Alternatives are tried left to right, greedy loops prefer another
//! iteration and lazy loops prefer leaving. An iteration that consumes
//! nothing after the minimum count is reached fails. Lookarounds are atomic:
//! once a lookaround succeeds, backtracking never re-enters it. Captures set
//! inside a positive lookaround stay visible after it.

use super::ast::{AnchorKind, LookAroundKind, NodeId, NodeKind, RegexAst, SubtreeId, ROOT_SUBTREE};
use super::charset::{is_line_terminator, CodePointSet, WORD_CHARS};
use super::matchers::CharMatcher;
use super::nfa::Direction;
use super::options::CompilationLimits;
use super::source::Flavor;
use serde::Serialize;

/// Placeholder jump target, always patched before a program is finished
const UNPATCHED: usize = usize::MAX;

// ============================================================================
// Programs
// ============================================================================

/// Backtracking instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Inst {
    /// Consume one code point
    Char(CharMatcher),
    /// Try `primary`, then `secondary`
    Split {
        /// Preferred continuation
        primary: usize,
        /// Continuation on backtrack
        secondary: usize,
    },
    /// Unconditional jump
    Jmp(usize),
    /// Store the position in a capture slot
    Save(u16),
    /// Zero-width position test
    Assert(AnchorKind),
    /// Match the text captured by a group
    BackReference {
        /// Referenced group
        group: u16,
        /// Compare with simple case folding
        ignore_case: bool,
    },
    /// Run a lookaround sub-executor
    LookAround(SubtreeId),
    /// Reset loop counter `counter`
    RepeatStart {
        /// Counter index
        counter: usize,
    },
    /// Decide whether to run another iteration
    RepeatCheck {
        /// Counter index
        counter: usize,
        /// Minimum iterations
        min: u32,
        /// Maximum iterations, `None` if unbounded
        max: Option<u32>,
        /// Prefer another iteration
        greedy: bool,
        /// Entry of the loop body
        body: usize,
        /// Continuation after the loop
        exit: usize,
    },
    /// Record where the current iteration starts
    RepeatBody {
        /// Counter index
        counter: usize,
    },
    /// Close an iteration and jump back to the check
    RepeatEnd {
        /// Counter index
        counter: usize,
        /// The loop's `RepeatCheck`
        head: usize,
        /// Minimum iterations
        min: u32,
    },
    /// Success
    Match,
    /// Failure
    Fail,
}

impl Inst {
    fn successors(&self) -> usize {
        match self {
            Inst::Split { .. } | Inst::RepeatCheck { .. } => 2,
            Inst::Match | Inst::Fail => 0,
            _ => 1,
        }
    }
}

/// Compiled subtree
#[derive(Debug, Clone, Serialize)]
pub struct BacktrackProgram {
    /// Instructions; execution starts at 0
    pub insts: Vec<Inst>,
    /// Consumption direction
    pub direction: Direction,
    /// Lookaround kind and negation, `None` for the main expression
    pub look_around: Option<(LookAroundKind, bool)>,
}

/// Lookaround whose body is a fixed string
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiteralLookAround {
    /// The string
    pub text: String,
    /// Ahead or behind
    pub kind: LookAroundKind,
    /// `(?!` / `(?<!`
    pub negated: bool,
}

impl LiteralLookAround {
    /// Evaluate at byte position `pos`
    #[inline]
    pub fn matches(&self, input: &str, pos: usize) -> bool {
        let found = match self.kind {
            LookAroundKind::LookAhead => input[pos..].starts_with(&self.text),
            LookAroundKind::LookBehind => input[..pos].ends_with(&self.text),
        };
        found != self.negated
    }
}

/// Built form of one subtree
#[derive(Debug, Clone, Serialize)]
pub enum SubExecutor {
    /// String lookaround
    Literal(LiteralLookAround),
    /// General program
    Program(BacktrackProgram),
}

impl SubExecutor {
    /// Number of states (instructions)
    pub fn state_count(&self) -> usize {
        match self {
            SubExecutor::Literal(l) => l.text.chars().count() + 1,
            SubExecutor::Program(p) => p.insts.len(),
        }
    }

    /// Number of transitions
    pub fn transition_count(&self) -> usize {
        match self {
            SubExecutor::Literal(l) => l.text.chars().count(),
            SubExecutor::Program(p) => p.insts.iter().map(Inst::successors).sum(),
        }
    }
}

/// The backtracking executor: one sub-executor per subtree
#[derive(Debug, Clone, Serialize)]
pub struct BacktrackingExecutor {
    /// Arena indexed by subtree id; index 0 is the main expression
    pub subtrees: Vec<SubExecutor>,
    /// Capture groups, including group 0
    pub capture_groups: usize,
    /// Loop counters across all programs
    pub counters: usize,
    /// Only try the start position
    pub sticky: bool,
    /// Reject an empty match at the start position
    pub must_advance: bool,
    /// Track the last closed group
    pub track_last_group: bool,
    /// Unicode case folding for back references and `\b`
    pub unicode: bool,
    /// Case-insensitive word characters (`\b` with `iu`)
    pub ignore_case: bool,
}

impl BacktrackingExecutor {
    /// Total states over all sub-executors
    pub fn state_count(&self) -> usize {
        self.subtrees.iter().map(SubExecutor::state_count).sum()
    }

    /// Total transitions over all sub-executors
    pub fn transition_count(&self) -> usize {
        self.subtrees.iter().map(SubExecutor::transition_count).sum()
    }

    /// Find the leftmost match at or after byte offset `from`
    ///
    /// Returns the capture slots (two per group) and the last closed group.
    pub fn exec(&self, input: &str, from: usize) -> Option<(Vec<Option<usize>>, Option<usize>)> {
        if from > input.len() {
            return None;
        }
        let SubExecutor::Program(root) = &self.subtrees[ROOT_SUBTREE as usize] else {
            return None;
        };
        let mut runner = Runner::new(self, input);
        let reject_empty = self.must_advance.then_some(from);
        let mut start = from;
        loop {
            if input.is_char_boundary(start) {
                runner.reset();
                if runner.run(root, start, reject_empty).is_some() {
                    return Some((runner.slots, runner.last_group));
                }
                if self.sticky {
                    return None;
                }
            }
            if start >= input.len() {
                return None;
            }
            start += 1;
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Worklist frame over the subtree tree
struct SubtreeFrame {
    subtree: SubtreeId,
    children: Vec<SubtreeId>,
    cursor: usize,
    built: Vec<SubtreeId>,
}

impl SubtreeFrame {
    fn new(ast: &RegexAst, subtree: SubtreeId) -> Self {
        Self {
            subtree,
            children: ast.child_subtrees(subtree),
            cursor: 0,
            built: Vec::new(),
        }
    }
}

/// Worklist entry while compiling one subtree
enum Task {
    Node(NodeId),
    Emit(Inst),
    Alternatives {
        alternatives: Vec<NodeId>,
        next: usize,
        split: Option<usize>,
        jumps: Vec<usize>,
    },
    PatchJumps(Vec<usize>),
    LoopEnd {
        counter: usize,
        head: usize,
        min: u32,
    },
}

/// Builds a [`BacktrackingExecutor`] from an AST
pub struct BacktrackingBuilder<'a> {
    ast: &'a RegexAst,
    bitset_threshold: usize,
    must_advance: bool,
    counters: usize,
}

impl<'a> BacktrackingBuilder<'a> {
    /// Create a builder
    pub fn new(ast: &'a RegexAst, limits: &CompilationLimits, must_advance: bool) -> Self {
        Self {
            ast,
            bitset_threshold: limits.bitset_threshold,
            must_advance,
            counters: 0,
        }
    }

    /// Build every subtree, children first
    pub fn build(mut self) -> BacktrackingExecutor {
        let ast = self.ast;
        let mut arena: Vec<Option<SubExecutor>> = vec![None; ast.subtrees().len()];
        let mut stack = vec![SubtreeFrame::new(ast, ROOT_SUBTREE)];

        while let Some(top) = stack.last_mut() {
            if top.cursor < top.children.len() {
                let child = top.children[top.cursor];
                top.cursor += 1;
                stack.push(SubtreeFrame::new(ast, child));
                continue;
            }
            let Some(frame) = stack.pop() else { break };
            debug_assert!(frame.built.iter().all(|c| arena[*c as usize].is_some()));
            arena[frame.subtree as usize] = Some(self.build_subtree(frame.subtree));
            if let Some(parent) = stack.last_mut() {
                parent.built.push(frame.subtree);
            }
        }

        let subtrees: Vec<SubExecutor> = arena
            .into_iter()
            .map(|built| {
                built.unwrap_or(SubExecutor::Program(BacktrackProgram {
                    insts: vec![Inst::Fail],
                    direction: Direction::Forward,
                    look_around: None,
                }))
            })
            .collect();
        let executor = BacktrackingExecutor {
            subtrees,
            capture_groups: ast.capture_groups(),
            counters: self.counters,
            sticky: ast.flags.sticky,
            must_advance: self.must_advance,
            track_last_group: ast.flavor == Flavor::Python,
            unicode: ast.flags.unicode,
            ignore_case: ast.flags.ignore_case,
        };
        log_debug!(
            "backtracking executor: {} subtrees, {} states",
            executor.subtrees.len(),
            executor.state_count()
        );
        executor
    }

    fn build_subtree(&mut self, id: SubtreeId) -> SubExecutor {
        let subtree = *self.ast.subtree(id);
        if let Some((kind, negated)) = subtree.look_around {
            if let Some(text) = self.literal_text(subtree.root) {
                return SubExecutor::Literal(LiteralLookAround {
                    text,
                    kind,
                    negated,
                });
            }
        }
        let direction = match subtree.look_around {
            Some((LookAroundKind::LookBehind, _)) => Direction::Backward,
            _ => Direction::Forward,
        };
        SubExecutor::Program(self.compile(subtree.root, direction, subtree.look_around))
    }

    /// The string a capture-free single-alternative body matches
    fn literal_text(&self, root: NodeId) -> Option<String> {
        let ast = self.ast;
        let NodeKind::Group {
            alternatives,
            capture: None,
        } = ast.kind(root)
        else {
            return None;
        };
        let [sequence] = alternatives.as_slice() else {
            return None;
        };
        let NodeKind::Sequence(terms) = ast.kind(*sequence) else {
            return None;
        };
        terms
            .iter()
            .map(|&t| match ast.kind(t) {
                NodeKind::CharClass(set) if !ast.is_dead(t) => {
                    set.single_code_point().and_then(char::from_u32)
                }
                _ => None,
            })
            .collect()
    }

    fn compile(
        &mut self,
        root: NodeId,
        direction: Direction,
        look_around: Option<(LookAroundKind, bool)>,
    ) -> BacktrackProgram {
        let ast = self.ast;
        let mut insts: Vec<Inst> = Vec::new();
        let mut tasks = vec![Task::Emit(Inst::Match), Task::Node(root)];

        while let Some(task) = tasks.pop() {
            match task {
                Task::Emit(inst) => insts.push(inst),
                Task::PatchJumps(jumps) => {
                    let end = insts.len();
                    for jump in jumps {
                        insts[jump] = Inst::Jmp(end);
                    }
                }
                Task::LoopEnd { counter, head, min } => {
                    insts.push(Inst::RepeatEnd { counter, head, min });
                    let end = insts.len();
                    if let Inst::RepeatCheck { exit, .. } = &mut insts[head] {
                        *exit = end;
                    }
                }
                Task::Alternatives {
                    alternatives,
                    next,
                    split,
                    mut jumps,
                } => {
                    if let Some(split) = split {
                        jumps.push(insts.len());
                        insts.push(Inst::Jmp(UNPATCHED));
                        let here = insts.len();
                        if let Inst::Split { secondary, .. } = &mut insts[split] {
                            *secondary = here;
                        }
                    }
                    let alternative = alternatives[next];
                    if next + 1 == alternatives.len() {
                        tasks.push(Task::PatchJumps(jumps));
                        tasks.push(Task::Node(alternative));
                    } else {
                        let split = insts.len();
                        insts.push(Inst::Split {
                            primary: split + 1,
                            secondary: UNPATCHED,
                        });
                        tasks.push(Task::Alternatives {
                            alternatives,
                            next: next + 1,
                            split: Some(split),
                            jumps,
                        });
                        tasks.push(Task::Node(alternative));
                    }
                }
                Task::Node(id) => {
                    if ast.is_dead(id) {
                        insts.push(Inst::Fail);
                        continue;
                    }
                    match ast.kind(id) {
                        NodeKind::CharClass(set) => {
                            insts.push(Inst::Char(CharMatcher::build(set, self.bitset_threshold)));
                        }
                        NodeKind::Sequence(terms) => match direction {
                            Direction::Forward => tasks.extend(terms.iter().rev().map(|&t| Task::Node(t))),
                            Direction::Backward => tasks.extend(terms.iter().map(|&t| Task::Node(t))),
                        },
                        NodeKind::Group {
                            alternatives,
                            capture,
                        } => {
                            let live: Vec<NodeId> =
                                alternatives.iter().copied().filter(|&a| !ast.is_dead(a)).collect();
                            let (open, close) = match (capture, direction) {
                                (Some(g), Direction::Forward) => (Some(g * 2), Some(g * 2 + 1)),
                                (Some(g), Direction::Backward) => (Some(g * 2 + 1), Some(g * 2)),
                                (None, _) => (None, None),
                            };
                            if let Some(slot) = open {
                                insts.push(Inst::Save(slot));
                            }
                            if let Some(slot) = close {
                                tasks.push(Task::Emit(Inst::Save(slot)));
                            }
                            match live.len() {
                                0 => tasks.push(Task::Emit(Inst::Fail)),
                                1 => tasks.push(Task::Node(live[0])),
                                _ => tasks.push(Task::Alternatives {
                                    alternatives: live,
                                    next: 0,
                                    split: None,
                                    jumps: Vec::new(),
                                }),
                            }
                        }
                        NodeKind::Quantified { term, quantifier } => {
                            if quantifier.max == Some(0) {
                                continue;
                            }
                            let counter = self.counters;
                            self.counters += 1;
                            insts.push(Inst::RepeatStart { counter });
                            let head = insts.len();
                            insts.push(Inst::RepeatCheck {
                                counter,
                                min: quantifier.min,
                                max: quantifier.max,
                                greedy: quantifier.greedy,
                                body: head + 1,
                                exit: UNPATCHED,
                            });
                            insts.push(Inst::RepeatBody { counter });
                            tasks.push(Task::LoopEnd {
                                counter,
                                head,
                                min: quantifier.min,
                            });
                            tasks.push(Task::Node(*term));
                        }
                        NodeKind::BackReference { group, ignore_case } => {
                            insts.push(Inst::BackReference {
                                group: *group,
                                ignore_case: *ignore_case,
                            })
                        }
                        NodeKind::Anchor(kind) => insts.push(Inst::Assert(*kind)),
                        NodeKind::LookAround { subtree, .. } => insts.push(Inst::LookAround(*subtree)),
                    }
                }
            }
        }

        BacktrackProgram {
            insts,
            direction,
            look_around,
        }
    }
}

/// Build the backtracking executor for `ast`
pub fn build_backtracking(ast: &RegexAst, limits: &CompilationLimits, must_advance: bool) -> BacktrackingExecutor {
    BacktrackingBuilder::new(ast, limits, must_advance).build()
}

// ============================================================================
// Matching
// ============================================================================

/// Undo log entry
enum Undo {
    Resume { pc: usize, pos: usize },
    Slot { slot: usize, old: Option<usize> },
    Count { counter: usize, old: u32 },
    IterationStart { counter: usize, old: usize },
    LastGroup { old: Option<usize> },
}

/// Mutable match state for one `exec` call
struct Runner<'a> {
    executor: &'a BacktrackingExecutor,
    input: &'a str,
    slots: Vec<Option<usize>>,
    counts: Vec<u32>,
    iteration_starts: Vec<usize>,
    last_group: Option<usize>,
}

impl<'a> Runner<'a> {
    fn new(executor: &'a BacktrackingExecutor, input: &'a str) -> Self {
        Self {
            executor,
            input,
            slots: vec![None; executor.capture_groups * 2],
            counts: vec![0; executor.counters],
            iteration_starts: vec![0; executor.counters],
            last_group: None,
        }
    }

    fn reset(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.last_group = None;
    }

    /// Run `program` at `pos`; returns the end position on success
    ///
    /// On failure every side effect is undone. On success capture slots keep
    /// their values.
    fn run(&mut self, program: &BacktrackProgram, pos: usize, reject_empty: Option<usize>) -> Option<usize> {
        let start = pos;
        let forward = program.direction == Direction::Forward;
        let track_last_group = self.executor.track_last_group && forward;
        let mut undo: Vec<Undo> = Vec::new();
        let (mut pc, mut pos) = (0usize, pos);

        loop {
            let ok = match &program.insts[pc] {
                Inst::Char(matcher) => {
                    let c = if forward {
                        self.input[pos..].chars().next()
                    } else {
                        self.input[..pos].chars().next_back()
                    };
                    match c {
                        Some(c) if matcher.matches(c as u32) => {
                            if forward {
                                pos += c.len_utf8();
                            } else {
                                pos -= c.len_utf8();
                            }
                            pc += 1;
                            true
                        }
                        _ => false,
                    }
                }
                Inst::Split { primary, secondary } => {
                    undo.push(Undo::Resume { pc: *secondary, pos });
                    pc = *primary;
                    true
                }
                Inst::Jmp(target) => {
                    pc = *target;
                    true
                }
                Inst::Save(slot) => {
                    let slot = *slot as usize;
                    undo.push(Undo::Slot {
                        slot,
                        old: self.slots[slot],
                    });
                    self.slots[slot] = Some(pos);
                    if track_last_group && slot % 2 == 1 && slot > 1 {
                        undo.push(Undo::LastGroup { old: self.last_group });
                        self.last_group = Some(slot / 2);
                    }
                    pc += 1;
                    true
                }
                Inst::Assert(kind) => {
                    let holds = self.assertion(*kind, pos);
                    pc += 1;
                    holds
                }
                Inst::BackReference { group, ignore_case } => {
                    match self.back_reference(*group as usize, *ignore_case, pos, forward) {
                        Some(next) => {
                            pos = next;
                            pc += 1;
                            true
                        }
                        None => false,
                    }
                }
                Inst::LookAround(subtree) => {
                    let holds = self.look_around(*subtree, pos, &mut undo);
                    pc += 1;
                    holds
                }
                Inst::RepeatStart { counter } => {
                    undo.push(Undo::Count {
                        counter: *counter,
                        old: self.counts[*counter],
                    });
                    self.counts[*counter] = 0;
                    pc += 1;
                    true
                }
                Inst::RepeatCheck {
                    counter,
                    min,
                    max,
                    greedy,
                    body,
                    exit,
                } => {
                    let count = self.counts[*counter];
                    if count < *min {
                        pc = *body;
                    } else if Some(count) == *max {
                        pc = *exit;
                    } else if *greedy {
                        undo.push(Undo::Resume { pc: *exit, pos });
                        pc = *body;
                    } else {
                        undo.push(Undo::Resume { pc: *body, pos });
                        pc = *exit;
                    }
                    true
                }
                Inst::RepeatBody { counter } => {
                    undo.push(Undo::IterationStart {
                        counter: *counter,
                        old: self.iteration_starts[*counter],
                    });
                    self.iteration_starts[*counter] = pos;
                    pc += 1;
                    true
                }
                Inst::RepeatEnd { counter, head, min } => {
                    let count = self.counts[*counter];
                    if pos == self.iteration_starts[*counter] && count >= *min {
                        false
                    } else {
                        undo.push(Undo::Count {
                            counter: *counter,
                            old: count,
                        });
                        self.counts[*counter] = count + 1;
                        pc = *head;
                        true
                    }
                }
                Inst::Match => {
                    if reject_empty == Some(pos) && pos == start {
                        false
                    } else {
                        return Some(pos);
                    }
                }
                Inst::Fail => false,
            };
            if ok {
                continue;
            }

            // backtrack
            loop {
                match undo.pop() {
                    None => return None,
                    Some(Undo::Resume { pc: p, pos: q }) => {
                        pc = p;
                        pos = q;
                        break;
                    }
                    Some(Undo::Slot { slot, old }) => self.slots[slot] = old,
                    Some(Undo::Count { counter, old }) => self.counts[counter] = old,
                    Some(Undo::IterationStart { counter, old }) => self.iteration_starts[counter] = old,
                    Some(Undo::LastGroup { old }) => self.last_group = old,
                }
            }
        }
    }

    fn look_around(&mut self, subtree: SubtreeId, pos: usize, undo: &mut Vec<Undo>) -> bool {
        let executor = self.executor;
        match &executor.subtrees[subtree as usize] {
            SubExecutor::Literal(literal) => literal.matches(self.input, pos),
            SubExecutor::Program(program) => {
                let negated = program.look_around.is_some_and(|(_, negated)| negated);
                let before = self.slots.clone();
                let last_group = self.last_group;
                let matched = self.run(program, pos, None).is_some();
                if negated {
                    self.slots = before;
                    self.last_group = last_group;
                    return !matched;
                }
                if matched {
                    for (slot, (old, new)) in before.iter().zip(&self.slots).enumerate() {
                        if old != new {
                            undo.push(Undo::Slot { slot, old: *old });
                        }
                    }
                    if last_group != self.last_group {
                        undo.push(Undo::LastGroup { old: last_group });
                    }
                }
                matched
            }
        }
    }

    fn assertion(&self, kind: AnchorKind, pos: usize) -> bool {
        let input = self.input;
        let before = input[..pos].chars().next_back();
        let after = input[pos..].chars().next();
        match kind {
            AnchorKind::Start => pos == 0,
            AnchorKind::End => pos == input.len(),
            AnchorKind::LineStart => before.is_none_or(|c| is_line_terminator(c as u32)),
            AnchorKind::LineEnd => after.is_none_or(|c| is_line_terminator(c as u32)),
            AnchorKind::WordBoundary => self.is_word(before) != self.is_word(after),
            AnchorKind::NonWordBoundary => self.is_word(before) == self.is_word(after),
        }
    }

    fn is_word(&self, c: Option<char>) -> bool {
        match c {
            None => false,
            Some(c) if WORD_CHARS.is_word(c) => true,
            // \w under /iu also contains the case variants of ASCII word characters
            Some(c) => {
                self.executor.unicode && self.executor.ignore_case && matches!(c, '\u{017F}' | '\u{212A}')
            }
        }
    }

    /// Match group `group`'s text at `pos`; returns the new position
    fn back_reference(&self, group: usize, ignore_case: bool, pos: usize, forward: bool) -> Option<usize> {
        let (Some(a), Some(b)) = (self.slots[group * 2], self.slots[group * 2 + 1]) else {
            // unset groups match the empty string
            return Some(pos);
        };
        if a > b {
            return Some(pos);
        }
        let captured = &self.input[a..b];
        let unicode = self.executor.unicode;
        if forward {
            let mut rest = self.input[pos..].chars();
            let mut consumed = 0;
            for expected in captured.chars() {
                let actual = rest.next()?;
                if !chars_equal(expected, actual, ignore_case, unicode) {
                    return None;
                }
                consumed += actual.len_utf8();
            }
            Some(pos + consumed)
        } else {
            let mut rest = self.input[..pos].chars().rev();
            let mut consumed = 0;
            for expected in captured.chars().rev() {
                let actual = rest.next()?;
                if !chars_equal(expected, actual, ignore_case, unicode) {
                    return None;
                }
                consumed += actual.len_utf8();
            }
            Some(pos - consumed)
        }
    }
}

fn chars_equal(a: char, b: char, ignore_case: bool, unicode: bool) -> bool {
    a == b || (ignore_case && CodePointSet::single(a as u32).case_fold(unicode).contains(b as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parser::parse;
    use crate::engine::postprocess::post_process;
    use crate::engine::source::RegexSource;

    fn executor(pattern: &str, flags: &str) -> BacktrackingExecutor {
        executor_with(RegexSource::parse(pattern, flags).unwrap(), false)
    }

    fn executor_with(source: RegexSource, must_advance: bool) -> BacktrackingExecutor {
        let limits = CompilationLimits::default();
        let mut ast = parse(&source).unwrap();
        post_process(&mut ast, &limits).unwrap();
        build_backtracking(&ast, &limits, must_advance)
    }

    fn find(executor: &BacktrackingExecutor, input: &str) -> Option<Vec<Option<usize>>> {
        executor.exec(input, 0).map(|(slots, _)| slots)
    }

    #[test]
    fn test_alternation_priority() {
        assert_eq!(find(&executor("a|ab", ""), "ab"), Some(vec![Some(0), Some(1)]));
        assert_eq!(find(&executor("ab|a", ""), "ab"), Some(vec![Some(0), Some(2)]));
    }

    #[test]
    fn test_captures_and_loops() {
        let e = executor("a(b|c)*d", "");
        assert_eq!(
            find(&e, "xabcbd"),
            Some(vec![Some(1), Some(6), Some(4), Some(5)])
        );
        let e = executor("(a+?)(a*)", "");
        assert_eq!(
            find(&e, "aaa"),
            Some(vec![Some(0), Some(3), Some(0), Some(1), Some(1), Some(3)])
        );
    }

    #[test]
    fn test_bounded_loop_not_unrolled() {
        let e = executor("(?:ab|cd){7,9}x", "");
        assert_eq!(find(&e, "abababababababx").map(|s| s[0]), Some(Some(0)));
        assert_eq!(find(&e, "ababababababx"), None);
    }

    #[test]
    fn test_empty_iteration_stops_loop() {
        let e = executor("(a*)*b", "");
        assert_eq!(find(&e, "aab").map(|s| (s[0], s[1])), Some((Some(0), Some(3))));
        assert_eq!(find(&e, "c"), None);
    }

    #[test]
    fn test_look_ahead() {
        let e = executor("a(?=b)", "");
        assert!(matches!(e.subtrees[1], SubExecutor::Literal(_)));
        assert_eq!(find(&e, "acab"), Some(vec![Some(2), Some(3)]));

        let e = executor("a(?![bc]+d)", "");
        assert!(matches!(e.subtrees[1], SubExecutor::Program(_)));
        assert_eq!(find(&e, "abd ab"), Some(vec![Some(4), Some(5)]));
    }

    #[test]
    fn test_look_behind_compiles_backward() {
        let e = executor("(?<=(a)b)c", "");
        let SubExecutor::Program(program) = &e.subtrees[1] else {
            panic!("expected a program");
        };
        assert_eq!(program.direction, Direction::Backward);
        assert_eq!(
            find(&e, "xabc"),
            Some(vec![Some(3), Some(4), Some(1), Some(2)])
        );
        assert_eq!(find(&executor("(?<!a)c", ""), "acbc"), Some(vec![Some(3), Some(4)]));
    }

    #[test]
    fn test_back_references() {
        let e = executor("(a+)-\\1", "");
        assert_eq!(find(&e, "aa-aa").map(|s| s[1]), Some(Some(5)));
        assert_eq!(find(&e, "aa-a").map(|s| (s[0], s[1])), Some((Some(1), Some(4))));
        let e = executor("(a)\\1", "i");
        assert!(find(&e, "aA").is_some());
    }

    #[test]
    fn test_assertions() {
        assert_eq!(find(&executor("\\bfoo\\b", ""), "a foo"), Some(vec![Some(2), Some(5)]));
        assert_eq!(find(&executor("\\bfoo\\b", ""), "afoo"), None);
        assert_eq!(find(&executor("^b$", "m"), "a\nb\nc"), Some(vec![Some(2), Some(3)]));
        assert_eq!(find(&executor("^b$", ""), "a\nb\nc"), None);
    }

    #[test]
    fn test_sticky_and_must_advance() {
        let e = executor("b", "y");
        assert_eq!(e.exec("ab", 0), None);
        assert!(e.exec("ab", 1).is_some());

        let e = executor_with(RegexSource::parse("a*?", "").unwrap(), true);
        assert_eq!(e.exec("aa", 0).map(|(s, _)| s), Some(vec![Some(0), Some(1)]));
        assert_eq!(e.exec("", 0), None);
    }

    #[test]
    fn test_python_last_group() {
        let source = RegexSource::parse("(a)(b)?", "")
            .unwrap()
            .with_flavor(Flavor::Python);
        let e = executor_with(source, false);
        assert_eq!(e.exec("ab", 0).map(|(_, last)| last), Some(Some(2)));
        assert_eq!(e.exec("ac", 0).map(|(_, last)| last), Some(Some(1)));
    }

    #[test]
    fn test_deep_look_around_nesting_builds() {
        let pattern = format!("{}a{}", "(?=".repeat(300), ")".repeat(300));
        let e = executor(&pattern, "");
        assert_eq!(e.subtrees.len(), 301);
        assert!(e.state_count() > 300);
        assert!(find(&e, "a").is_some());
    }

    #[test]
    fn test_multibyte_input() {
        let e = executor("(é+)x", "");
        assert_eq!(find(&e, "aééx"), Some(vec![Some(1), Some(6), Some(1), Some(5)]));
    }
}
