//! Full reduction: removes redundant meta nodes, collapses zero branches
//! and absorbs one terminals, re-interning everything on the way up.

use rustc_hash::FxHashMap as HashMap;

use crate::core::manager::{NodeManager, Operation, Operator};
use crate::core::node::{push_child, quantize, AndNode, MetaId, ONE, ZERO};

impl NodeManager {
    /// Fully reduce the function rooted at `root`.
    ///
    /// The recursion flattens a collapsing node into its sibling children,
    /// so the driver re-anchors a multi-node (or re-weighted) result under
    /// a cardinality-1 dummy to present a single meta node.
    pub fn full_reduce(&mut self, root: MetaId) -> MetaId {
        if self.is_terminal(root) {
            return root;
        }
        let key = Operation::unary(Operator::Reduce, root);
        if let Some(r) = self.cache_lookup(&key) {
            return r;
        }

        let mut memo = HashMap::default();
        let (nodes, w) = self.full_reduce_rec(root, &mut memo);

        let result = if nodes == [ZERO] {
            ZERO
        } else if nodes.len() == 1 && quantize(w) == 1.0 {
            nodes[0]
        } else {
            let var = self.node(root).var;
            self.create_meta_node(var, 1, vec![AndNode::new(w, nodes)], 1.0)
        };
        log::debug!(
            "full_reduce: #{} -> #{} ({:?})",
            root.0,
            result.0,
            self.size(result)
        );
        self.cache_insert(key, result);
        result
    }

    /// Returns the replacement children for the incident AND node plus a
    /// weight factor to multiply into it. The factor accumulates the
    /// weights of redundant nodes collapsed at this level; it is reset for
    /// every AND child.
    fn full_reduce_rec(
        &mut self,
        id: MetaId,
        memo: &mut HashMap<MetaId, (Vec<MetaId>, f64)>,
    ) -> (Vec<MetaId>, f64) {
        if self.is_terminal(id) {
            return (vec![id], 1.0);
        }
        if let Some(hit) = memo.get(&id) {
            return hit.clone();
        }

        let n = self.node(id).clone();
        let mut new_ands: Vec<AndNode> = Vec::with_capacity(n.children.len());
        for and in &n.children {
            if and.weight == 0.0 {
                new_ands.push(AndNode::new(0.0, vec![ZERO]));
                continue;
            }
            let mut w = and.weight;
            let mut ch: Vec<MetaId> = Vec::new();
            let mut zero = false;
            for &c in &and.children {
                let (repl, wc) = self.full_reduce_rec(c, memo);
                if repl == [ZERO] {
                    zero = true;
                    break;
                }
                w *= wc;
                for r in repl {
                    push_child(&mut ch, r);
                }
            }
            if zero || quantize(w) == 0.0 {
                new_ands.push(AndNode::new(0.0, vec![ZERO]));
                continue;
            }
            if ch.is_empty() {
                ch.push(ONE);
            }
            new_ands.push(AndNode::new(w, ch));
        }

        // A node whose AND children are all equal is redundant: its first
        // AND child's children take its place and its weights move to the
        // caller. Cardinality-1 anchors are vacuously redundant.
        let redundant = new_ands.iter().all(|a| *a == new_ands[0]);
        let out = if redundant {
            let first = &new_ands[0];
            if first.children == [ZERO] {
                (vec![ZERO], 0.0)
            } else {
                (first.children.clone(), n.weight * first.weight)
            }
        } else {
            let nid = self.create_meta_node(n.var, n.card, new_ands, n.weight);
            (vec![nid], 1.0)
        };
        memo.insert(id, out.clone());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test::{diagram_matches_table, scope};
    use crate::model::scope::{Assignment, Var};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// A constant table reduces all the way to a dummy over the one
    /// terminal carrying the constant.
    #[test]
    fn constant_table_collapses() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        let root = mgr.create_from_table(&s, &[0.5, 0.5, 0.5, 0.5], 1.0);
        let r = mgr.full_reduce(root);
        let n = mgr.node(r);
        assert!(n.is_dummy());
        assert_eq!(n.children[0].children, vec![ONE]);
        assert_eq!(n.children[0].weight, 0.5);
        diagram_matches_table(&mgr, r, &s, &[0.5, 0.5, 0.5, 0.5]);
    }

    /// Zero absorption: any AND child with a zero meta child ends up with
    /// weight 0 pointing at the shared zero terminal.
    #[test]
    fn zero_branches_point_at_shared_terminal() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        let root = mgr.create_from_table(&s, &[0.0, 0.5, 0.5, 0.0], 1.0);
        let r = mgr.full_reduce(root);
        let mut a = Assignment::new(&s);
        a.set_val(Var(0), 0);
        a.set_val(Var(1), 0);
        assert_eq!(mgr.get_val(r, &a, false), 0.0);
        for and in &mgr.node(r).children {
            let sub = mgr.node(and.children[0]);
            for sub_and in &sub.children {
                if sub_and.children.contains(&ZERO) {
                    assert_eq!(sub_and.weight, 0.0);
                    assert_eq!(sub_and.children, vec![ZERO]);
                }
            }
        }
        diagram_matches_table(&mgr, r, &s, &[0.0, 0.5, 0.5, 0.0]);
    }

    #[test]
    fn all_zero_table_reduces_to_zero_terminal() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        let root = mgr.create_from_table(&s, &[0.0; 4], 1.0);
        assert_eq!(mgr.full_reduce(root), ZERO);
    }

    /// Reducing twice yields the same interned identity.
    #[test]
    fn reduce_is_idempotent() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        let root = mgr.create_from_table(&s, &[0.1, 0.9, 0.5, 0.5], 1.0);
        let r1 = mgr.full_reduce(root);
        let r2 = mgr.full_reduce(r1);
        assert_eq!(r1, r2);

        // The same holds for a result that needed a dummy anchor.
        let root = mgr.create_from_table(&s, &[0.5; 4], 1.0);
        let r1 = mgr.full_reduce(root);
        let r2 = mgr.full_reduce(r1);
        assert_eq!(r1, r2);
    }

    /// Identical subdiagrams merge: a table whose halves agree loses the
    /// top variable entirely.
    #[test]
    fn redundant_top_variable_vanishes() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        let root = mgr.create_from_table(&s, &[0.3, 0.7, 0.3, 0.7], 1.0);
        let r = mgr.full_reduce(root);
        let n = mgr.node(r);
        assert_eq!(n.var, Var(1));
        diagram_matches_table(&mgr, r, &s, &[0.3, 0.7, 0.3, 0.7]);
    }
}
