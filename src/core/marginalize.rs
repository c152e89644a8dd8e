//! Summing (or maximizing) variables out of a diagram.
//!
//! Bucket elimination only ever eliminates the deepest variable of a
//! message, so an eliminated variable's AND children hang over a single
//! shared child list (usually just the one terminal). The eliminated node
//! folds its AND weights into one value and turns redundant; full
//! reduction then collapses it away.
//!
//! A path that lost its node for the variable to reduction is constant in
//! that variable, so summing multiplies the path weight by the domain size
//! once, at the highest AND node whose pseudo-tree region owns the
//! variable but whose children no longer cover it.

use crate::core::manager::{NodeManager, Operation, Operator};
use crate::core::node::{push_child, AndNode, MetaId, ONE, ZERO};
use crate::graph::pseudo_tree::PseudoTree;
use crate::model::scope::{Scope, Var};

impl NodeManager {
    /// Sum the variables of `elim` out of `root`, deepest first.
    pub fn marginalize(&mut self, root: MetaId, elim: &Scope, pt: &PseudoTree) -> MetaId {
        self.eliminate(root, elim, pt, Operator::Marginalize)
    }

    /// Maximize the variables of `elim` out of `root`, deepest first.
    pub fn maximize(&mut self, root: MetaId, elim: &Scope, pt: &PseudoTree) -> MetaId {
        self.eliminate(root, elim, pt, Operator::Max)
    }

    fn eliminate(&mut self, mut root: MetaId, elim: &Scope, pt: &PseudoTree, op: Operator) -> MetaId {
        for &(v, card) in elim.ordering().iter().rev() {
            root = self.eliminate_var(root, v, card, pt, op);
            // Reduction collapses the now-redundant node so the next
            // variable sits at the frontier again.
            root = self.full_reduce(root);
        }
        root
    }

    fn eliminate_var(
        &mut self,
        root: MetaId,
        v: Var,
        card: u32,
        pt: &PseudoTree,
        op: Operator,
    ) -> MetaId {
        let root_var = self.node(root).var;
        if !pt.is_ancestor_or_self(root_var, v) {
            // The whole diagram is constant in v.
            return match op {
                Operator::Marginalize => self.scale(root, card as f64, v),
                Operator::Max => root,
                _ => unreachable!(),
            };
        }
        self.eliminate_rec(root, v, card, pt, op)
    }

    fn eliminate_rec(
        &mut self,
        id: MetaId,
        v: Var,
        card_v: u32,
        pt: &PseudoTree,
        op: Operator,
    ) -> MetaId {
        let key = Operation::with_var(op, id, v);
        if let Some(r) = self.cache_lookup(&key) {
            return r;
        }

        let n = self.node(id).clone();
        let result = if n.var == v && !n.is_dummy() {
            // Frontier: fold the AND weights into a single value.
            let mut shared: Option<Vec<MetaId>> = None;
            let mut acc: Option<f64> = None;
            for and in &n.children {
                if and.weight == 0.0 || and.children == [ZERO] {
                    acc = Some(match (op, acc) {
                        (Operator::Marginalize, prev) => prev.unwrap_or(0.0),
                        (_, prev) => prev.unwrap_or(0.0).max(0.0),
                    });
                    continue;
                }
                match &shared {
                    None => shared = Some(and.children.clone()),
                    Some(s) => assert_eq!(
                        *s, and.children,
                        "eliminated variable {} is not at the diagram frontier",
                        v.0
                    ),
                }
                acc = Some(match (op, acc) {
                    (Operator::Marginalize, prev) => prev.unwrap_or(0.0) + and.weight,
                    (_, prev) => prev.map_or(and.weight, |p| p.max(and.weight)),
                });
            }
            let new_weight = acc.unwrap_or(0.0);
            let and = match shared {
                Some(ch) if new_weight != 0.0 => AndNode::new(new_weight, ch),
                _ => AndNode::new(0.0, vec![ZERO]),
            };
            // All AND children equal: redundant on purpose, full reduction
            // turns the node into its children (or a terminal).
            self.create_meta_node(n.var, n.card, vec![and; n.card as usize], n.weight)
        } else {
            // Descend into the children covering v; if an AND responsible
            // for v's region no longer covers it, the sum over v is a
            // plain repetition.
            let mut new_ands = Vec::with_capacity(n.children.len());
            for and in &n.children {
                if and.weight == 0.0 || and.children == [ZERO] {
                    new_ands.push(AndNode::new(0.0, vec![ZERO]));
                    continue;
                }
                let mut weight = and.weight;
                let mut ch: Vec<MetaId> = Vec::new();
                let mut any_cover = false;
                let mut zero = false;
                for &c in &and.children {
                    let c_var = self.node(c).var;
                    if pt.is_ancestor_or_self(c_var, v) {
                        any_cover = true;
                        let c2 = self.eliminate_rec(c, v, card_v, pt, op);
                        if c2 == ZERO {
                            zero = true;
                            break;
                        }
                        push_child(&mut ch, c2);
                    } else {
                        push_child(&mut ch, c);
                    }
                }
                if zero {
                    new_ands.push(AndNode::new(0.0, vec![ZERO]));
                    continue;
                }
                if !any_cover && op == Operator::Marginalize {
                    weight *= card_v as f64;
                }
                if ch.is_empty() {
                    ch.push(ONE);
                }
                new_ands.push(AndNode::new(weight, ch));
            }
            self.create_meta_node(n.var, n.card, new_ands, n.weight)
        };

        self.cache_insert(key, result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test::{diagram_matches_table, pt_for, scope};
    use crate::model::scope::Assignment;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Scenario: marginalizing the deep variable of a product of two
    /// independent factors leaves the shallow factor.
    #[test]
    fn marginalize_leaves_other_factor() {
        init();
        let mut mgr = NodeManager::default();
        let sx = scope(&[(0, 2)]);
        let sy = scope(&[(1, 2)]);
        let pt = pt_for(&[sx.clone(), sy.clone()], &[0, 1], 2);

        let t1 = mgr.create_from_table(&sx, &[0.2, 0.8], 1.0);
        let t2 = mgr.create_from_table(&sy, &[0.3, 0.7], 1.0);
        let prod = mgr.apply(t2, &[t1], Operator::Prod, &pt);

        let marg = mgr.marginalize(prod, &sy, &pt);
        let marg = mgr.full_reduce(marg);
        diagram_matches_table(&mgr, marg, &sx, &[0.2, 0.8]);
    }

    /// Summing out a variable whose node was removed by reduction still
    /// multiplies by the domain size.
    #[test]
    fn marginalize_reduced_away_variable() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        let pt = pt_for(&[s.clone()], &[0, 1], 2);

        // Constant in variable 1: the diagram loses the node for it.
        let root = mgr.create_from_table(&s, &[0.5, 0.5, 0.25, 0.25], 1.0);
        let root = mgr.full_reduce(root);
        let sy = scope(&[(1, 2)]);
        let marg = mgr.marginalize(root, &sy, &pt);
        let marg = mgr.full_reduce(marg);
        diagram_matches_table(&mgr, marg, &scope(&[(0, 2)]), &[1.0, 0.5]);
    }

    /// Maximizing mirrors marginalization with the max fold.
    #[test]
    fn maximize_takes_best_value() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        let pt = pt_for(&[s.clone()], &[0, 1], 2);

        let root = mgr.create_from_table(&s, &[0.1, 0.9, 0.8, 0.2], 1.0);
        let sy = scope(&[(1, 2)]);
        let max = mgr.maximize(root, &sy, &pt);
        let max = mgr.full_reduce(max);
        diagram_matches_table(&mgr, max, &scope(&[(0, 2)]), &[0.9, 0.8]);
    }

    /// Eliminating every variable collapses the diagram to a terminal
    /// anchor whose weight is the partition function.
    #[test]
    fn full_elimination_yields_partition_function() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        let pt = pt_for(&[s.clone()], &[0, 1], 2);

        let root = mgr.create_from_table(&s, &[0.1, 0.2, 0.3, 0.4], 1.0);
        let m = mgr.marginalize(root, &s, &pt);
        let m = mgr.full_reduce(m);
        let a = Assignment::new(&scope(&[]));
        assert!((mgr.get_val(m, &a, false) - 1.0).abs() < 1e-10);
    }

    /// Zero branches contribute nothing to the sum.
    #[test]
    fn marginalize_with_zero_branch() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        let pt = pt_for(&[s.clone()], &[0, 1], 2);

        let root = mgr.create_from_table(&s, &[0.0, 0.4, 0.5, 0.0], 1.0);
        let root = mgr.full_reduce(root);
        let sy = scope(&[(1, 2)]);
        let marg = mgr.marginalize(root, &sy, &pt);
        let marg = mgr.full_reduce(marg);
        diagram_matches_table(&mgr, marg, &scope(&[(0, 2)]), &[0.4, 0.5]);
    }
}
