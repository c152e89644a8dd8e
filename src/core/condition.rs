//! Conditioning a diagram on evidence, non-destructively.
//!
//! Assigned variables keep their place in the diagram: every branch of an
//! assigned node is replaced by the (recursively conditioned) branch of
//! the assigned value, which makes the node redundant and leaves its
//! removal to full reduction.

use rustc_hash::FxHashMap as HashMap;

use crate::core::manager::NodeManager;
use crate::core::node::{push_child, AndNode, MetaId, ONE, ZERO};
use crate::model::scope::Assignment;

impl NodeManager {
    pub fn condition(&mut self, root: MetaId, cond: &Assignment) -> MetaId {
        let mut memo = HashMap::default();
        self.condition_rec(root, cond, &mut memo)
    }

    fn condition_rec(
        &mut self,
        id: MetaId,
        cond: &Assignment,
        memo: &mut HashMap<MetaId, MetaId>,
    ) -> MetaId {
        if self.is_terminal(id) {
            return id;
        }
        if let Some(&r) = memo.get(&id) {
            return r;
        }

        let n = self.node(id).clone();
        let assigned = if n.card > 1 { cond.val_of(n.var) } else { None };

        let result = match assigned {
            Some(val) => {
                let and = self.condition_and(&n.children[val as usize], cond, memo);
                self.create_meta_node(n.var, n.card, vec![and; n.card as usize], n.weight)
            }
            None => {
                let new_ands: Vec<AndNode> = n
                    .children
                    .iter()
                    .map(|and| self.condition_and(and, cond, memo))
                    .collect();
                self.create_meta_node(n.var, n.card, new_ands, n.weight)
            }
        };
        memo.insert(id, result);
        result
    }

    fn condition_and(
        &mut self,
        and: &AndNode,
        cond: &Assignment,
        memo: &mut HashMap<MetaId, MetaId>,
    ) -> AndNode {
        if and.weight == 0.0 || and.children == [ZERO] {
            return AndNode::new(0.0, vec![ZERO]);
        }
        let mut ch: Vec<MetaId> = Vec::new();
        for &c in &and.children {
            let c2 = self.condition_rec(c, cond, memo);
            if c2 == ZERO {
                return AndNode::new(0.0, vec![ZERO]);
            }
            push_child(&mut ch, c2);
        }
        if ch.is_empty() {
            ch.push(ONE);
        }
        AndNode::new(and.weight, ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manager::Operator;
    use crate::core::test::{diagram_matches_table, pt_for, scope};
    use crate::model::scope::Var;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Conditioning the product of two independent binary factors on one
    /// of them leaves the other, scaled by the evidence branch.
    #[test]
    fn condition_product_on_one_variable() {
        init();
        let mut mgr = NodeManager::default();
        let sx = scope(&[(0, 2)]);
        let sy = scope(&[(1, 2)]);
        let pt = pt_for(&[sx.clone(), sy.clone()], &[0, 1], 2);

        let t1 = mgr.create_from_table(&sx, &[0.2, 0.8], 1.0);
        let t2 = mgr.create_from_table(&sy, &[0.3, 0.7], 1.0);
        let prod = mgr.apply(t1, &[t2], Operator::Prod, &pt);

        let mut ev = Assignment::new(&sx);
        ev.set_val(Var(0), 1);
        let cond = mgr.condition(prod, &ev);
        let cond = mgr.full_reduce(cond);
        diagram_matches_table(&mgr, cond, &sy, &[0.24, 0.56]);
    }

    /// Conditioning on a zero-probability branch zeroes the function.
    #[test]
    fn condition_on_zero_branch() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        let root = mgr.create_from_table(&s, &[0.0, 0.0, 0.5, 0.5], 1.0);
        let mut ev = Assignment::new(&scope(&[(0, 2)]));
        ev.set_val(Var(0), 0);
        let cond = mgr.condition(root, &ev);
        assert_eq!(mgr.full_reduce(cond), ZERO);
    }

    /// Unassigned variables are untouched.
    #[test]
    fn condition_without_matching_evidence() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2)]);
        let root = mgr.create_from_table(&s, &[0.2, 0.8], 1.0);
        let ev = Assignment::new(&scope(&[(5, 2)]));
        let cond = mgr.condition(root, &ev);
        assert_eq!(cond, root);
    }
}
