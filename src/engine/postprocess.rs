//! AST post-processing
//!
//! Two rewrites run after parsing:
//!
//! 1. **Dead branch pruning** - empty classes, alternatives that cannot
//!    match, `x{0}` and negative lookarounds over dead bodies are removed or
//!    marked dead bottom-up. A dead root means the pattern never matches.
//! 2. **Quantifier unrolling** - small bounded repetitions are expanded into
//!    copies so that the NFA does not need counters, e.g. `a{2,3}` becomes
//!    `aa(?:a|)`.

use super::ast::{NodeId, NodeKind, Quantifier, RegexAst};
use super::error::Bailout;
use super::options::CompilationLimits;

/// What the post-processor changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostProcessReport {
    /// Nodes removed from their parents or marked dead
    pub pruned: usize,
    /// Quantifiers expanded into copies
    pub unrolled: usize,
}

/// Rewrites a freshly parsed AST in place
pub struct AstPostProcessor<'a> {
    ast: &'a mut RegexAst,
    limits: &'a CompilationLimits,
    report: PostProcessReport,
}

impl<'a> AstPostProcessor<'a> {
    /// Create a post-processor
    pub fn new(ast: &'a mut RegexAst, limits: &'a CompilationLimits) -> Self {
        Self {
            ast,
            limits,
            report: PostProcessReport::default(),
        }
    }

    /// Run all rewrites
    ///
    /// Fails without touching the tree when it already exceeds the parse tree
    /// ceiling.
    pub fn run(mut self) -> Result<PostProcessReport, Bailout> {
        if self.ast.len() > self.limits.max_parse_tree_size {
            return Err(Bailout::ParseTreeTooLarge {
                size: self.ast.len(),
                limit: self.limits.max_parse_tree_size,
            });
        }
        self.prune_dead_branches();
        self.unroll_quantifiers();
        Ok(self.report)
    }

    // ========================================================================
    // Dead branch pruning
    // ========================================================================

    fn prune_dead_branches(&mut self) {
        let order = self.ast.postorder(self.ast.root(), true);
        for id in order {
            let dead = match self.ast.kind(id).clone() {
                NodeKind::CharClass(set) => set.is_empty(),
                NodeKind::Sequence(terms) => {
                    let kept: Vec<NodeId> = terms
                        .iter()
                        .copied()
                        .filter(|&t| !self.is_removable(t))
                        .collect();
                    let dead = kept.iter().any(|&t| self.ast.is_dead(t));
                    if kept.len() != terms.len() {
                        self.report.pruned += terms.len() - kept.len();
                        self.ast.node_mut(id).kind = NodeKind::Sequence(kept);
                    }
                    dead
                }
                NodeKind::Group {
                    alternatives,
                    capture,
                } => {
                    let live: Vec<NodeId> = alternatives
                        .iter()
                        .copied()
                        .filter(|&a| !self.ast.is_dead(a))
                        .collect();
                    if live.is_empty() {
                        true
                    } else {
                        if live.len() != alternatives.len() {
                            self.report.pruned += alternatives.len() - live.len();
                            self.ast.node_mut(id).kind = NodeKind::Group {
                                alternatives: live,
                                capture,
                            };
                        }
                        false
                    }
                }
                NodeKind::Quantified { term, quantifier } => {
                    self.ast.is_dead(term) && quantifier.min > 0 && quantifier.max != Some(0)
                }
                NodeKind::LookAround {
                    subtree, negated, ..
                } => !negated && self.ast.is_dead(self.ast.subtree(subtree).root),
                NodeKind::BackReference { .. } | NodeKind::Anchor(_) => false,
            };
            if dead {
                self.report.pruned += 1;
                self.ast.node_mut(id).dead = true;
            }
        }
    }

    /// Terms that match only the empty string and can be dropped
    fn is_removable(&self, term: NodeId) -> bool {
        match self.ast.kind(term) {
            NodeKind::Quantified { term, quantifier } => {
                quantifier.max == Some(0) || (self.ast.is_dead(*term) && quantifier.min == 0)
            }
            NodeKind::LookAround {
                subtree,
                negated: true,
                ..
            } => self.ast.is_dead(self.ast.subtree(*subtree).root),
            _ => false,
        }
    }

    // ========================================================================
    // Quantifier unrolling
    // ========================================================================

    fn unroll_quantifiers(&mut self) {
        let order = self.ast.postorder(self.ast.root(), false);
        for id in order {
            let NodeKind::Quantified { term, quantifier } = *self.ast.kind(id) else {
                continue;
            };
            if self.ast.is_dead(id) || self.ast.is_dead(term) {
                continue;
            }
            if self
                .ast
                .any_below(term, |k| matches!(k, NodeKind::LookAround { .. }))
            {
                continue;
            }
            let threshold = match self.ast.kind(term) {
                NodeKind::CharClass(_) => self.limits.quantifier_unroll_threshold_single_cc,
                _ => self.limits.quantifier_unroll_threshold_group,
            };
            let copies = match quantifier.max {
                Some(max) if max <= threshold && !(quantifier.min == 0 && max == 1) => max,
                None if (2..=threshold).contains(&quantifier.min) => quantifier.min + 1,
                _ => continue,
            };
            let cost = self.ast.subtree_size(term) * copies as usize + 2 * copies as usize;
            if self.ast.len() + cost > self.limits.max_parse_tree_size {
                continue;
            }
            self.unroll(id, term, quantifier);
            self.report.unrolled += 1;
        }
    }

    /// Replace the `Quantified` node `id` by a non-capturing group holding copies
    fn unroll(&mut self, id: NodeId, term: NodeId, quantifier: Quantifier) {
        let position = self.ast.node(id).position as usize;
        let mut items: Vec<NodeId> = Vec::new();
        let mut template_used = false;
        let mut take_copy = |ast: &mut RegexAst| -> NodeId {
            if template_used {
                ast.deep_copy(term)
            } else {
                template_used = true;
                term
            }
        };

        for _ in 0..quantifier.min {
            items.push(take_copy(&mut *self.ast));
        }

        match quantifier.max {
            None => {
                let body = take_copy(&mut *self.ast);
                let star = self.ast.add(
                    NodeKind::Quantified {
                        term: body,
                        quantifier: Quantifier::star(quantifier.greedy),
                    },
                    position,
                );
                items.push(star);
            }
            Some(max) => {
                // nested optionals: x{0,2} = (?:x(?:x|)|)
                let mut chain: Option<NodeId> = None;
                for _ in quantifier.min..max {
                    let copy = take_copy(&mut *self.ast);
                    let mut taken = vec![copy];
                    taken.extend(chain);
                    let taken = self.ast.add(NodeKind::Sequence(taken), position);
                    let skipped = self.ast.add(NodeKind::Sequence(Vec::new()), position);
                    let alternatives = if quantifier.greedy {
                        vec![taken, skipped]
                    } else {
                        vec![skipped, taken]
                    };
                    chain = Some(self.ast.add(
                        NodeKind::Group {
                            alternatives,
                            capture: None,
                        },
                        position,
                    ));
                }
                items.extend(chain);
            }
        }

        let sequence = self.ast.add(NodeKind::Sequence(items), position);
        self.ast.node_mut(id).kind = NodeKind::Group {
            alternatives: vec![sequence],
            capture: None,
        };
    }
}

/// Run the post-processor with `limits`
pub fn post_process(ast: &mut RegexAst, limits: &CompilationLimits) -> Result<PostProcessReport, Bailout> {
    AstPostProcessor::new(ast, limits).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parser::parse;
    use crate::engine::source::RegexSource;

    fn processed(pattern: &str, flags: &str) -> (RegexAst, PostProcessReport) {
        let source = RegexSource::parse(pattern, flags).unwrap();
        let mut ast = parse(&source).unwrap();
        let report = post_process(&mut ast, &CompilationLimits::default()).unwrap();
        (ast, report)
    }

    fn count_quantifiers(ast: &RegexAst) -> usize {
        ast.preorder(ast.root(), true)
            .into_iter()
            .filter(|&n| matches!(ast.kind(n), NodeKind::Quantified { .. }))
            .count()
    }

    #[test]
    fn test_empty_class_kills_root() {
        let (ast, _) = processed("a[]b", "");
        assert!(ast.is_dead(ast.root()));
    }

    #[test]
    fn test_dead_alternative_is_removed() {
        let (ast, report) = processed("a[]|b", "");
        assert!(!ast.is_dead(ast.root()));
        assert!(report.pruned >= 1);
        assert!(matches!(ast.kind(ast.root()), NodeKind::Group { alternatives, .. } if alternatives.len() == 1));
    }

    #[test]
    fn test_optional_dead_term_is_dropped() {
        let (ast, _) = processed("a[]*b", "");
        assert!(!ast.is_dead(ast.root()));
        let (ast, _) = processed("a[]+b", "");
        assert!(ast.is_dead(ast.root()));
        let (ast, _) = processed("ax{0}b", "");
        assert!(!ast.is_dead(ast.root()));
        assert_eq!(count_quantifiers(&ast), 0);
    }

    #[test]
    fn test_negative_look_ahead_over_dead_body() {
        let (ast, _) = processed("a(?![])", "");
        assert!(!ast.is_dead(ast.root()));
        let (ast, _) = processed("a(?=[])", "");
        assert!(ast.is_dead(ast.root()));
    }

    #[test]
    fn test_unroll_bounded_char_class() {
        let (ast, report) = processed("a{2,4}", "");
        assert_eq!(report.unrolled, 1);
        assert_eq!(count_quantifiers(&ast), 0);
    }

    #[test]
    fn test_unroll_thresholds() {
        let (ast, report) = processed("a{2,30}", "");
        assert_eq!(report.unrolled, 0);
        assert_eq!(count_quantifiers(&ast), 1);

        let (_, report) = processed("(ab){2,6}", "");
        assert_eq!(report.unrolled, 0);
        let (_, report) = processed("(ab){2,5}", "");
        assert_eq!(report.unrolled, 1);
    }

    #[test]
    fn test_unroll_unbounded_keeps_star() {
        let (ast, report) = processed("a{3,}", "");
        assert_eq!(report.unrolled, 1);
        assert_eq!(count_quantifiers(&ast), 1);
    }

    #[test]
    fn test_oversized_tree_bails_out() {
        let source = RegexSource::parse("abcdefgh", "").unwrap();
        let mut ast = parse(&source).unwrap();
        let limits = CompilationLimits::default().with_max_parse_tree_size(4);
        let err = post_process(&mut ast, &limits).unwrap_err();
        assert!(matches!(err, Bailout::ParseTreeTooLarge { limit: 4, .. }));
    }
}
