//! DFA node splitting
//!
//! Makes the DFA's control-flow graph reducible: every strongly connected
//! component ends up with a single entry state. An SCC entered at more than
//! one state is copied once per extra entry, and the outside edges into that
//! entry are redirected to the copy. The process then recurses into each
//! SCC with its header removed, which exposes nested loops.
//!
//! Copies carry the same thread lists, accept information and capture
//! programs as their originals, so the split DFA accepts exactly the same
//! inputs with the same results.

use super::dfa::{Dfa, DfaStateId};
use super::error::Bailout;

const UNVISITED: u32 = u32::MAX;

/// Splits a [`Dfa`] until its graph is reducible
pub struct NodeSplitter {
    dfa: Dfa,
    limit: usize,
    copies: usize,
}

impl NodeSplitter {
    /// Create a splitter working on a copy of `dfa`
    pub fn new(dfa: &Dfa, limit: usize) -> Self {
        Self {
            dfa: dfa.clone(),
            limit,
            copies: 0,
        }
    }

    /// Run the split; returns the transformed DFA
    pub fn run(mut self) -> Result<Dfa, Bailout> {
        let all: Vec<DfaStateId> = (0..self.dfa.states.len() as DfaStateId).collect();
        let mut regions: Vec<Vec<DfaStateId>> = vec![all];

        while let Some(region) = regions.pop() {
            for scc in self.components(&region) {
                if scc.len() < 2 {
                    continue;
                }
                let entries = self.entries(&scc);
                let Some((&header, extra)) = entries.split_first() else {
                    // unreachable cycle, no entry at all
                    continue;
                };
                for &entry in extra {
                    let copy = self.copy_component(&scc, entry)?;
                    let copied_entry = copy[scc.iter().position(|&n| n == entry).unwrap_or(0)];
                    regions.push(copy.into_iter().filter(|&n| n != copied_entry).collect());
                }
                regions.push(scc.into_iter().filter(|&n| n != header).collect());
            }
        }

        log_debug!(
            "node splitting added {} states ({} total)",
            self.copies,
            self.dfa.states.len()
        );
        Ok(self.dfa)
    }

    /// Strongly connected components of the subgraph induced by `region`
    /// (iterative Tarjan)
    fn components(&self, region: &[DfaStateId]) -> Vec<Vec<DfaStateId>> {
        let n = self.dfa.states.len();
        let mut in_region = vec![false; n];
        for &s in region {
            in_region[s as usize] = true;
        }
        let mut index = vec![UNVISITED; n];
        let mut low = vec![0u32; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<DfaStateId> = Vec::new();
        let mut result = Vec::new();
        let mut counter = 0u32;

        for &root in region {
            if index[root as usize] != UNVISITED {
                continue;
            }
            // (node, next transition to look at)
            let mut calls: Vec<(DfaStateId, usize)> = vec![(root, 0)];
            index[root as usize] = counter;
            low[root as usize] = counter;
            counter += 1;
            stack.push(root);
            on_stack[root as usize] = true;

            while let Some(&(node, cursor)) = calls.last() {
                let transitions = &self.dfa.states[node as usize].transitions;
                if cursor < transitions.len() {
                    let target = transitions[cursor].target;
                    if let Some(top) = calls.last_mut() {
                        top.1 += 1;
                    }
                    let t = target as usize;
                    if !in_region[t] {
                        continue;
                    }
                    if index[t] == UNVISITED {
                        index[t] = counter;
                        low[t] = counter;
                        counter += 1;
                        stack.push(target);
                        on_stack[t] = true;
                        calls.push((target, 0));
                    } else if on_stack[t] {
                        low[node as usize] = low[node as usize].min(index[t]);
                    }
                    continue;
                }

                calls.pop();
                if let Some(&(parent, _)) = calls.last() {
                    low[parent as usize] = low[parent as usize].min(low[node as usize]);
                }
                if low[node as usize] == index[node as usize] {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack[member as usize] = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    component.sort_unstable();
                    result.push(component);
                }
            }
        }
        result
    }

    /// States of `scc` reachable from outside it, sorted
    fn entries(&self, scc: &[DfaStateId]) -> Vec<DfaStateId> {
        let mut in_scc = vec![false; self.dfa.states.len()];
        for &s in scc {
            in_scc[s as usize] = true;
        }
        let mut is_entry = vec![false; self.dfa.states.len()];
        for initial in self.dfa.initial.iter().flatten() {
            is_entry[initial.state as usize] = true;
        }
        for (id, state) in self.dfa.states.iter().enumerate() {
            if in_scc[id] {
                continue;
            }
            for transition in &state.transitions {
                is_entry[transition.target as usize] = true;
            }
        }
        scc.iter().copied().filter(|&s| is_entry[s as usize]).collect()
    }

    /// Duplicate `scc` and move the outside edges into `entry` onto the copy
    ///
    /// Returns the copy's state ids, parallel to `scc`.
    fn copy_component(&mut self, scc: &[DfaStateId], entry: DfaStateId) -> Result<Vec<DfaStateId>, Bailout> {
        let first = self.dfa.states.len();
        if first + scc.len() > self.limit {
            return Err(Bailout::NodeSplittingTooLarge {
                states: first + scc.len(),
                limit: self.limit,
            });
        }
        let mapping: hashbrown::HashMap<DfaStateId, DfaStateId> = scc
            .iter()
            .enumerate()
            .map(|(i, &s)| (s, (first + i) as DfaStateId))
            .collect();

        for &s in scc {
            let mut state = self.dfa.states[s as usize].clone();
            for transition in &mut state.transitions {
                if let Some(&copy) = mapping.get(&transition.target) {
                    transition.target = copy;
                }
            }
            self.dfa.states.push(state);
        }
        self.copies += scc.len();

        let copied_entry = mapping[&entry];
        for (id, state) in self.dfa.states.iter_mut().enumerate().take(first) {
            if mapping.contains_key(&(id as DfaStateId)) {
                continue;
            }
            for transition in &mut state.transitions {
                if transition.target == entry {
                    transition.target = copied_entry;
                }
            }
        }
        for initial in self.dfa.initial.iter_mut().flatten() {
            if initial.state == entry {
                initial.state = copied_entry;
            }
        }
        Ok((first..first + scc.len()).map(|s| s as DfaStateId).collect())
    }
}

/// Split `dfa` until reducible, failing past `limit` states
pub fn split_nodes(dfa: &Dfa, limit: usize) -> Result<Dfa, Bailout> {
    NodeSplitter::new(dfa, limit).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::CompilationBuffer;
    use crate::engine::dfa::{build_dfa, DfaMode};
    use crate::engine::nfa::{build_nfa, Direction};
    use crate::engine::options::CompilationLimits;
    use crate::engine::parser::parse;
    use crate::engine::postprocess::post_process;
    use crate::engine::source::RegexSource;

    fn search_dfa(pattern: &str) -> Dfa {
        let limits = CompilationLimits::default();
        let source = RegexSource::parse(pattern, "").unwrap();
        let mut ast = parse(&source).unwrap();
        post_process(&mut ast, &limits).unwrap();
        let nfa = build_nfa(&ast, Direction::Forward, &limits).unwrap();
        let mut buffer = CompilationBuffer::new();
        build_dfa(&nfa, DfaMode::forward_search(true), &limits, &mut buffer).unwrap()
    }

    fn last_accept(dfa: &Dfa, input: &str) -> Option<usize> {
        let mut state = dfa.initial_state(true)?.state;
        let mut last = None;
        for (pos, c) in input.char_indices() {
            let s = &dfa.states[state as usize];
            if s.accept.is_some() {
                last = Some(pos);
            }
            match s.step(c as u32) {
                Some(t) => state = t.target,
                None => return last,
            }
        }
        dfa.states[state as usize].accept_at_end.as_ref().map(|_| input.len()).or(last)
    }

    #[test]
    fn test_split_preserves_results() {
        for pattern in ["ab", "a(b|c)*d", "(ab|a)(bc|c)?", "x*y+z?"] {
            let dfa = search_dfa(pattern);
            let split = split_nodes(&dfa, 4000).unwrap();
            for input in ["", "ab", "xxab", "abcbcd", "acd", "abc", "xyyz", "zzxy", "aab"] {
                assert_eq!(
                    last_accept(&dfa, input),
                    last_accept(&split, input),
                    "{pattern} on {input:?}"
                );
            }
        }
    }

    #[test]
    fn test_multi_entry_loop_is_copied() {
        let dfa = search_dfa("ab");
        let split = split_nodes(&dfa, 4000).unwrap();
        assert!(split.len() > dfa.len());
    }

    #[test]
    fn test_reducible_graph_is_unchanged() {
        let split = split_nodes(&search_dfa("a(b|c)*d"), 4000).unwrap();
        let again = split_nodes(&split, 4000).unwrap();
        assert_eq!(again.len(), split.len());
    }

    #[test]
    fn test_ceiling() {
        let dfa = search_dfa("ab");
        let err = split_nodes(&dfa, dfa.len()).unwrap_err();
        assert!(matches!(err, Bailout::NodeSplittingTooLarge { .. }));
    }
}
