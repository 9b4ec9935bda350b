//! Regex abstract syntax tree
//!
//! The tree lives in a flat arena: every node is addressed by a [`NodeId`]
//! and children are stored as id lists. Lookaround bodies are kept as separate
//! subtrees (see [`Subtree`]) so that the backtracking builder can treat the
//! lookaround nesting as its own tree.
//!
//! Shape invariants maintained by the parser:
//! - a `Group` holds one `Sequence` per alternative
//! - a `Sequence` holds terms (`CharClass`, `Group`, `LookAround`,
//!   `BackReference`, `Anchor`, `Quantified`)
//! - the root of every subtree is a `Group`; the main root has capture index 0

use super::charset::CodePointSet;
use super::source::{Encoding, Flavor, RegexFlags};
use serde::Serialize;
use std::collections::BTreeMap;

/// Index of a node in the arena
pub type NodeId = u32;

/// Index of a subtree (0 is the main expression)
pub type SubtreeId = u32;

/// The main expression's subtree
pub const ROOT_SUBTREE: SubtreeId = 0;

/// Zero-width position assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnchorKind {
    /// `^` without multiline, `\A`
    Start,
    /// `$` without multiline, `\Z`
    End,
    /// `^` with multiline
    LineStart,
    /// `$` with multiline
    LineEnd,
    /// `\b`
    WordBoundary,
    /// `\B`
    NonWordBoundary,
}

/// Direction of a lookaround
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LookAroundKind {
    /// `(?=...)` / `(?!...)`
    LookAhead,
    /// `(?<=...)` / `(?<!...)`
    LookBehind,
}

/// Repetition bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Quantifier {
    /// Minimum repetitions
    pub min: u32,
    /// Maximum repetitions (`None` for unbounded)
    pub max: Option<u32>,
    /// Prefer more repetitions
    pub greedy: bool,
}

impl Quantifier {
    /// Create a quantifier
    pub fn new(min: u32, max: Option<u32>, greedy: bool) -> Self {
        Self { min, max, greedy }
    }

    /// `*`
    pub fn star(greedy: bool) -> Self {
        Self::new(0, None, greedy)
    }

    /// `+`
    pub fn plus(greedy: bool) -> Self {
        Self::new(1, None, greedy)
    }

    /// `?`
    pub fn optional(greedy: bool) -> Self {
        Self::new(0, Some(1), greedy)
    }

    /// Whether there is no upper bound
    pub fn is_unbounded(&self) -> bool {
        self.max.is_none()
    }
}

/// Node payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    /// Alternation with optional capture index
    Group {
        /// One `Sequence` per alternative
        alternatives: Vec<NodeId>,
        /// Capture index (0 for the whole match)
        capture: Option<u16>,
    },
    /// Concatenation of terms
    Sequence(Vec<NodeId>),
    /// Single code point out of a set
    CharClass(CodePointSet),
    /// `\N` / `\k<name>`
    BackReference {
        /// Referenced capture group
        group: u16,
        /// Compare with simple case folding
        ignore_case: bool,
    },
    /// Zero-width position assertion
    Anchor(AnchorKind),
    /// Lookaround assertion referring to a nested subtree
    LookAround {
        /// Subtree holding the body
        subtree: SubtreeId,
        /// Direction
        kind: LookAroundKind,
        /// `(?!` / `(?<!`
        negated: bool,
    },
    /// Repeated term
    Quantified {
        /// The repeated term
        term: NodeId,
        /// Bounds and greediness
        quantifier: Quantifier,
    },
}

/// Arena entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Payload
    pub kind: NodeKind,
    /// Set by dead-branch pruning: this node can never match
    pub dead: bool,
    /// Code point offset in the pattern where the node starts
    pub position: u32,
}

/// A lookaround body (or the main expression)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Subtree {
    /// Root `Group` node
    pub root: NodeId,
    /// Enclosing subtree
    pub parent: Option<SubtreeId>,
    /// Lookaround direction and negation (`None` for the main expression)
    pub look_around: Option<(LookAroundKind, bool)>,
}

/// Parsed pattern
#[derive(Debug, Clone, Serialize)]
pub struct RegexAst {
    nodes: Vec<Node>,
    subtrees: Vec<Subtree>,
    capture_groups: usize,
    named_groups: BTreeMap<String, usize>,
    /// Flags the pattern was parsed with
    pub flags: RegexFlags,
    /// Flavor the pattern was parsed with
    pub flavor: Flavor,
    /// Subject encoding
    pub encoding: Encoding,
}

impl RegexAst {
    /// Create an empty tree
    pub fn new(flags: RegexFlags, flavor: Flavor, encoding: Encoding) -> Self {
        Self {
            nodes: Vec::with_capacity(64),
            subtrees: Vec::with_capacity(1),
            capture_groups: 1,
            named_groups: BTreeMap::new(),
            flags,
            flavor,
            encoding,
        }
    }

    /// Allocate a node
    pub fn add(&mut self, kind: NodeKind, position: usize) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node {
            kind,
            dead: false,
            position: position as u32,
        });
        id
    }

    /// Register a subtree
    pub fn add_subtree(
        &mut self,
        root: NodeId,
        parent: Option<SubtreeId>,
        look_around: Option<(LookAroundKind, bool)>,
    ) -> SubtreeId {
        let id = self.subtrees.len() as SubtreeId;
        self.subtrees.push(Subtree {
            root,
            parent,
            look_around,
        });
        id
    }

    /// Node by id
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    /// Mutable node by id
    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    /// Payload by id
    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id as usize].kind
    }

    /// Whether pruning marked the node dead
    #[inline]
    pub fn is_dead(&self, id: NodeId) -> bool {
        self.nodes[id as usize].dead
    }

    /// Total number of allocated nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node has been allocated
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root `Group` of the main expression
    pub fn root(&self) -> NodeId {
        self.subtrees[ROOT_SUBTREE as usize].root
    }

    /// All subtrees; index 0 is the main expression
    pub fn subtrees(&self) -> &[Subtree] {
        &self.subtrees
    }

    /// Subtree by id
    pub fn subtree(&self, id: SubtreeId) -> &Subtree {
        &self.subtrees[id as usize]
    }

    /// Direct child subtrees of `id`, in creation order
    pub fn child_subtrees(&self, id: SubtreeId) -> Vec<SubtreeId> {
        self.subtrees
            .iter()
            .enumerate()
            .filter(|(_, s)| s.parent == Some(id))
            .map(|(i, _)| i as SubtreeId)
            .collect()
    }

    /// Number of capture groups, including group 0
    pub fn capture_groups(&self) -> usize {
        self.capture_groups
    }

    pub(crate) fn set_capture_groups(&mut self, count: usize) {
        self.capture_groups = count;
    }

    /// Named groups and their indices
    pub fn named_groups(&self) -> &BTreeMap<String, usize> {
        &self.named_groups
    }

    pub(crate) fn add_named_group(&mut self, name: String, index: usize) -> bool {
        if self.named_groups.contains_key(&name) {
            return false;
        }
        self.named_groups.insert(name, index);
        true
    }

    /// Direct children of a node
    ///
    /// With `into_look_arounds`, a `LookAround` node yields its subtree root.
    pub fn children(&self, id: NodeId, into_look_arounds: bool) -> Vec<NodeId> {
        match self.kind(id) {
            NodeKind::Group { alternatives, .. } => alternatives.clone(),
            NodeKind::Sequence(terms) => terms.clone(),
            NodeKind::Quantified { term, .. } => vec![*term],
            NodeKind::LookAround { subtree, .. } if into_look_arounds => {
                vec![self.subtree(*subtree).root]
            }
            _ => Vec::new(),
        }
    }

    /// Nodes below `start` (inclusive) in pre-order
    pub fn preorder(&self, start: NodeId, into_look_arounds: bool) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            let children = self.children(id, into_look_arounds);
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// Nodes below `start` (inclusive) in post-order
    pub fn postorder(&self, start: NodeId, into_look_arounds: bool) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![(start, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for child in self.children(id, into_look_arounds).into_iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }

    /// Number of nodes below `id` (inclusive), lookaround bodies included
    pub fn subtree_size(&self, id: NodeId) -> usize {
        self.preorder(id, true).len()
    }

    /// Whether any node below `id` satisfies `predicate`
    pub fn any_below(&self, id: NodeId, predicate: impl Fn(&NodeKind) -> bool) -> bool {
        self.preorder(id, true)
            .into_iter()
            .any(|n| predicate(self.kind(n)))
    }

    /// Whether the node or its descendants open a capture group
    pub fn contains_capture(&self, id: NodeId) -> bool {
        self.any_below(id, |k| {
            matches!(k, NodeKind::Group { capture: Some(_), .. })
        })
    }

    /// Copy the nodes below `id` and return the copy's root
    ///
    /// Lookaround nodes in the copy refer to the same subtree as the
    /// original.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let order = self.postorder(id, false);
        let mut mapping: hashbrown::HashMap<NodeId, NodeId> =
            hashbrown::HashMap::with_capacity(order.len());
        for old in order {
            let node = self.node(old).clone();
            let remap = |ids: &[NodeId]| -> Vec<NodeId> { ids.iter().map(|c| mapping[c]).collect() };
            let kind = match &node.kind {
                NodeKind::Group {
                    alternatives,
                    capture,
                } => NodeKind::Group {
                    alternatives: remap(alternatives),
                    capture: *capture,
                },
                NodeKind::Sequence(terms) => NodeKind::Sequence(remap(terms)),
                NodeKind::Quantified { term, quantifier } => NodeKind::Quantified {
                    term: mapping[term],
                    quantifier: *quantifier,
                },
                other => other.clone(),
            };
            let new_id = self.add(kind, node.position as usize);
            self.node_mut(new_id).dead = node.dead;
            mapping.insert(old, new_id);
        }
        mapping[&id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_node(ast: &mut RegexAst, c: char) -> NodeId {
        ast.add(NodeKind::CharClass(CodePointSet::single(c as u32)), 0)
    }

    fn sample() -> RegexAst {
        // (?:ab|c)*
        let mut ast = RegexAst::new(RegexFlags::default(), Flavor::EcmaScript, Encoding::Utf8);
        let a = char_node(&mut ast, 'a');
        let b = char_node(&mut ast, 'b');
        let c = char_node(&mut ast, 'c');
        let s1 = ast.add(NodeKind::Sequence(vec![a, b]), 0);
        let s2 = ast.add(NodeKind::Sequence(vec![c]), 0);
        let g = ast.add(
            NodeKind::Group {
                alternatives: vec![s1, s2],
                capture: None,
            },
            0,
        );
        let q = ast.add(
            NodeKind::Quantified {
                term: g,
                quantifier: Quantifier::star(true),
            },
            0,
        );
        let seq = ast.add(NodeKind::Sequence(vec![q]), 0);
        let root = ast.add(
            NodeKind::Group {
                alternatives: vec![seq],
                capture: Some(0),
            },
            0,
        );
        ast.add_subtree(root, None, None);
        ast
    }

    #[test]
    fn test_traversal_orders() {
        let ast = sample();
        let pre = ast.preorder(ast.root(), false);
        assert_eq!(pre[0], ast.root());
        assert_eq!(pre.len(), ast.len());
        let post = ast.postorder(ast.root(), false);
        assert_eq!(*post.last().unwrap(), ast.root());
        assert_eq!(post[0], 0);
    }

    #[test]
    fn test_deep_copy() {
        let mut ast = sample();
        let before = ast.len();
        let copy = ast.deep_copy(6);
        assert_eq!(ast.len(), before + 7);
        assert_eq!(ast.subtree_size(copy), 7);
        assert!(matches!(ast.kind(copy), NodeKind::Quantified { term, .. } if *term != 5));
    }

    #[test]
    fn test_named_groups() {
        let mut ast = sample();
        assert!(ast.add_named_group("x".into(), 1));
        assert!(!ast.add_named_group("x".into(), 2));
        assert_eq!(ast.named_groups()["x"], 1);
        assert!(!ast.contains_capture(4));
        assert!(ast.contains_capture(ast.root()));
    }
}
