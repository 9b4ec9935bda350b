//! Automaton dumps
//!
//! With [`CompilerOptions::dump_automata`](super::options::CompilerOptions)
//! set, compilation hands every intermediate structure to a caller-supplied
//! [`DebugSink`] as DOT graphs and JSON records. Dumping never changes the
//! compilation result.

use super::ast::{NodeKind, RegexAst};
use super::dfa::Dfa;
use super::nfa::{NfaStateKind, PureNfa};
use super::trace_finder::TraceFinder;
use serde::Serialize;
use std::fmt::Write;

/// Artifact encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactFormat {
    /// Graphviz
    Dot,
    /// Pretty-printed JSON
    Json,
}

/// One dumped structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugArtifact {
    /// What was dumped, e.g. `"ast"` or `"dfa_forward"`
    pub name: String,
    /// Encoding of `content`
    pub format: ArtifactFormat,
    /// The dump
    pub content: String,
}

/// Receiver for debug artifacts
pub trait DebugSink {
    /// Accept one artifact
    fn emit(&mut self, artifact: DebugArtifact);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DebugSink for NullSink {
    fn emit(&mut self, _artifact: DebugArtifact) {}
}

/// Sink that keeps every artifact in memory
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    artifacts: Vec<DebugArtifact>,
}

impl CollectingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far
    pub fn artifacts(&self) -> &[DebugArtifact] {
        &self.artifacts
    }

    /// Find an artifact by name and format
    pub fn find(&self, name: &str, format: ArtifactFormat) -> Option<&DebugArtifact> {
        self.artifacts
            .iter()
            .find(|a| a.name == name && a.format == format)
    }
}

impl DebugSink for CollectingSink {
    fn emit(&mut self, artifact: DebugArtifact) {
        self.artifacts.push(artifact);
    }
}

/// Emit the DOT and JSON forms of a structure
pub(crate) fn emit_both<T: Serialize>(sink: &mut dyn DebugSink, name: &str, dot: String, value: &T) {
    sink.emit(DebugArtifact {
        name: name.to_string(),
        format: ArtifactFormat::Dot,
        content: dot,
    });
    sink.emit(DebugArtifact {
        name: name.to_string(),
        format: ArtifactFormat::Json,
        content: to_json(value),
    });
}

/// Serialize to pretty JSON; serialization failures become a JSON error record
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

/// DOT graph of the AST, lookaround bodies included
pub fn ast_to_dot(ast: &RegexAst) -> String {
    let mut output = String::from("digraph Ast {\n");
    for id in ast.preorder(ast.root(), true) {
        let label = match ast.kind(id) {
            NodeKind::Group {
                capture: Some(g), ..
            } => format!("group {}", g),
            NodeKind::Group { .. } => "group".to_string(),
            NodeKind::Sequence(_) => "seq".to_string(),
            NodeKind::CharClass(set) => set.to_string(),
            NodeKind::BackReference { group, .. } => format!("\\{}", group),
            NodeKind::Anchor(kind) => format!("{:?}", kind),
            NodeKind::LookAround { kind, negated, .. } => {
                format!("{:?}{}", kind, if *negated { " !" } else { "" })
            }
            NodeKind::Quantified { quantifier, .. } => match quantifier.max {
                Some(max) => format!("{{{},{}}}", quantifier.min, max),
                None => format!("{{{},}}", quantifier.min),
            },
        };
        let style = if ast.is_dead(id) { ", style=dashed" } else { "" };
        let _ = writeln!(output, "  n{} [label=\"{}: {}\"{}]", id, id, escape(&label), style);
        for child in ast.children(id, true) {
            let _ = writeln!(output, "  n{} -> n{}", id, child);
        }
    }
    output.push_str("}\n");
    output
}

/// DOT graph of an NFA
pub fn nfa_to_dot(nfa: &PureNfa) -> String {
    let mut output = String::from("digraph Nfa {\n  rankdir=LR;\n");
    let _ = writeln!(output, "  start [shape=point]\n  start -> s{}", nfa.anchored_start);
    for (id, state) in nfa.states.iter().enumerate() {
        match &state.kind {
            NfaStateKind::Char { set, next } => {
                let _ = writeln!(output, "  s{} [shape=circle]", id);
                let _ = writeln!(output, "  s{} -> s{} [label=\"{}\"]", id, next, escape(&set.to_string()));
            }
            NfaStateKind::Split { targets } => {
                let _ = writeln!(output, "  s{} [shape=diamond, label=\"\"]", id);
                for (priority, target) in targets.iter().enumerate() {
                    let _ = writeln!(output, "  s{} -> s{} [label=\"{}\"]", id, target, priority);
                }
            }
            NfaStateKind::Save { slot, next } => {
                let _ = writeln!(output, "  s{} [shape=box, label=\"save {}\"]", id, slot);
                let _ = writeln!(output, "  s{} -> s{}", id, next);
            }
            NfaStateKind::Assert { assertion, next } => {
                let _ = writeln!(output, "  s{} [shape=box, label=\"{:?}\"]", id, assertion);
                let _ = writeln!(output, "  s{} -> s{}", id, next);
            }
            NfaStateKind::Match { result } => {
                let _ = writeln!(output, "  s{} [shape=doublecircle, label=\"{}\"]", id, result);
            }
        }
    }
    output.push_str("}\n");
    output
}

/// DOT graph of a DFA
pub fn dfa_to_dot(dfa: &Dfa) -> String {
    let mut output = String::from("digraph Dfa {\n  rankdir=LR;\n");
    for (i, initial) in dfa.initial.iter().enumerate() {
        if let Some(initial) = initial {
            let _ = writeln!(output, "  init{} [shape=point]\n  init{} -> d{}", i, i, initial.state);
        }
    }
    for (id, state) in dfa.states.iter().enumerate() {
        let shape = if state.accept.is_some() || state.accept_at_end.is_some() {
            "doublecircle"
        } else {
            "circle"
        };
        let _ = writeln!(
            output,
            "  d{} [shape={}, label=\"{}\\n{:?}\"]",
            id, shape, id, state.threads
        );
        for transition in &state.transitions {
            let _ = writeln!(
                output,
                "  d{} -> d{} [label=\"{}\"]",
                id,
                transition.target,
                escape(&transition.set.to_string())
            );
        }
    }
    output.push_str("}\n");
    output
}

/// DOT graph of a trace finder: its path tree with the result table
pub fn trace_finder_to_dot(tf: &TraceFinder) -> String {
    let mut output = nfa_to_dot(&tf.nfa);
    output.truncate(output.len().saturating_sub(2));
    let _ = writeln!(output, "\n  results [shape=record, label=\"{}\"]", {
        tf.results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}: {:?}", i, r.slots))
            .collect::<Vec<_>>()
            .join("|")
    });
    output.push_str("}\n");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::CompilationBuffer;
    use crate::engine::dfa::{build_dfa, DfaMode};
    use crate::engine::nfa::{build_nfa, Direction};
    use crate::engine::options::CompilationLimits;
    use crate::engine::parser::parse;
    use crate::engine::source::RegexSource;

    #[test]
    fn test_dot_output() {
        let limits = CompilationLimits::default();
        let ast = parse(&RegexSource::parse("a(b|c)", "").unwrap()).unwrap();
        let dot = ast_to_dot(&ast);
        assert!(dot.starts_with("digraph Ast"));
        assert!(dot.contains("group 1"));

        let nfa = build_nfa(&ast, Direction::Forward, &limits).unwrap();
        assert!(nfa_to_dot(&nfa).contains("doublecircle"));

        let mut buffer = CompilationBuffer::new();
        let dfa = build_dfa(&nfa, DfaMode::forward_search(true), &limits, &mut buffer).unwrap();
        let dot = dfa_to_dot(&dfa);
        assert!(dot.contains("init0"));
        assert!(dot.contains("->"));
    }

    #[test]
    fn test_collecting_sink() {
        let mut sink = CollectingSink::new();
        emit_both(&mut sink, "thing", "digraph {}".to_string(), &vec![1, 2]);
        assert_eq!(sink.artifacts().len(), 2);
        let json = sink.find("thing", ArtifactFormat::Json).unwrap();
        assert!(json.content.contains('1'));
        assert!(sink.find("other", ArtifactFormat::Dot).is_none());
    }

    #[test]
    fn test_label_escaping() {
        assert_eq!(escape("a\"b\\"), "a\\\"b\\\\");
    }
}
