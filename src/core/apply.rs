//! The Apply operator, generalized over product/sum/max across a pseudo
//! tree.
//!
//! `apply(lhs, rhs, op, pt)` combines the function rooted at `lhs` with a
//! list of further roots. The result is rooted at the top-most variable
//! among all arguments: an rhs root testing a strict ancestor of `lhs`'s
//! variable takes over the recursion and `lhs` joins the argument list.
//! Arguments whose variable matches the driving root are consumed level
//! by level; anything else is pushed down the branch of the pseudo tree
//! its variable lives in, until a matching descendant is reached.
//! [NodeManager::get_param_sets] plans that routing: it splits the child
//! lists of both sides into independent sub-applications, one per
//! pseudo-tree subtree.

use rustc_hash::FxHashMap as HashMap;

use crate::core::manager::{NodeManager, Operation, Operator};
use crate::core::node::{push_child, AndNode, MetaId, ONE, ZERO};
use crate::graph::pseudo_tree::PseudoTree;
use crate::model::scope::Var;

impl Operator {
    /// Weight combination for the apply operators.
    fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            Operator::Prod => a * b,
            Operator::Sum => a + b,
            Operator::Max => a.max(b),
            _ => panic!("combine called on non-apply operator {:?}", self),
        }
    }
}

impl NodeManager {
    pub fn apply(&mut self, lhs: MetaId, rhs: &[MetaId], op: Operator, pt: &PseudoTree) -> MetaId {
        debug_assert!(matches!(
            op,
            Operator::Prod | Operator::Sum | Operator::Max
        ));

        // Terminal cases, cheap enough to keep out of the cache.
        match op {
            Operator::Prod => {
                if lhs == ZERO || rhs.contains(&ZERO) {
                    return ZERO;
                }
                if rhs.is_empty() {
                    return lhs;
                }
                if lhs == ONE {
                    if rhs.len() == 1 {
                        return rhs[0];
                    }
                    // Multiple arguments only meet a terminal lhs through
                    // the planner, which never pairs them this way.
                    panic!("product of a terminal with multiple roots");
                }
            }
            _ => {
                if self.is_terminal(lhs) || rhs.is_empty() {
                    return lhs;
                }
            }
        }

        let key = Operation::apply(op, lhs, rhs);
        if let Some(r) = self.cache_lookup(&key) {
            return r;
        }

        let ln = self.node(lhs).clone();

        // The result must be rooted at the top-most argument. If an rhs
        // root tests a strict ancestor of lhs's variable, it drives the
        // recursion and lhs joins the argument list; the cache key is the
        // same unordered set, so the swapped call memoizes for both.
        if let Some(i) = self.topmost_ancestor_arg(ln.var, rhs, pt) {
            let mut new_rhs = rhs.to_vec();
            let new_lhs = std::mem::replace(&mut new_rhs[i], lhs);
            return self.apply(new_lhs, &new_rhs, op, pt);
        }

        // Look through a dummy lhs when the first rhs root tests the same
        // variable for real: the real node drives the recursion and the
        // dummy's grand-children join the argument list.
        if ln.is_dummy() {
            let r0 = self.node(rhs[0]).clone();
            if r0.var == ln.var && !r0.is_dummy() && !r0.is_terminal() {
                let mut new_rhs = ln.children[0].children.clone();
                new_rhs.extend_from_slice(&rhs[1..]);
                let sub = self.apply(rhs[0], &new_rhs, op, pt);
                let anchor_weight = ln.weight * ln.children[0].weight;
                let result = if anchor_weight == 1.0 || sub == ZERO {
                    sub
                } else {
                    self.create_meta_node(
                        ln.var,
                        1,
                        vec![AndNode::new(ln.children[0].weight, vec![sub])],
                        ln.weight,
                    )
                };
                self.cache_insert(key, result);
                return result;
            }
        }

        // A single rhs root over the same variable is consumed in lockstep
        // with lhs; its children become the arguments pushed downward.
        let same_var = if rhs.len() == 1 {
            let r0 = self.node(rhs[0]).clone();
            if r0.var == ln.var && !r0.is_terminal() {
                Some(r0)
            } else {
                None
            }
        } else {
            None
        };

        let mut new_ands = Vec::with_capacity(ln.card as usize);
        for k in 0..ln.card as usize {
            let and = &ln.children[k];
            let mut weight = ln.weight * and.weight;

            let sub_rhs: Vec<MetaId> = match &same_var {
                Some(r0) => {
                    let k2 = if r0.card == 1 { 0 } else { k };
                    weight = op.combine(weight, r0.weight * r0.children[k2].weight);
                    r0.children[k2].children.clone()
                }
                None => rhs.to_vec(),
            };

            let groups = self.get_param_sets(pt, &and.children, &sub_rhs);
            let mut processed: Vec<MetaId> = Vec::new();
            let mut zero = false;
            for (head, followers) in groups {
                let sub = self.apply(head, &followers, op, pt);
                if sub == ZERO && op == Operator::Prod {
                    zero = true;
                    break;
                }
                push_child(&mut processed, sub);
            }

            if op == Operator::Prod && (zero || weight == 0.0) {
                new_ands.push(AndNode::new(0.0, vec![ZERO]));
                continue;
            }
            if processed.is_empty() {
                processed.push(ONE);
            }
            if op != Operator::Prod && processed.iter().any(|&m| !self.is_terminal(m)) {
                // Sum/max weights are only well-defined at the leaves; a
                // non-terminal sub-result means the weight was consumed
                // further down already.
                log::warn!(
                    "sum/max over non-leaf weights below variable {}; local weight dropped",
                    ln.var.0
                );
                weight = 1.0;
            }
            new_ands.push(AndNode::new(weight, processed));
        }

        let result = self.create_meta_node(ln.var, ln.card, new_ands, 1.0);
        self.cache_insert(key, result);
        result
    }

    /// Index of the rhs root testing the highest strict ancestor of
    /// `var`, if any. Such candidates all lie on `var`'s root path, so
    /// they are totally ordered by the ancestor relation.
    fn topmost_ancestor_arg(&self, var: Var, rhs: &[MetaId], pt: &PseudoTree) -> Option<usize> {
        let mut best: Option<(usize, Var)> = None;
        for (i, &r) in rhs.iter().enumerate() {
            let rv = self.node(r).var;
            if rv == var || !pt.is_ancestor_or_self(rv, var) {
                continue;
            }
            let higher = match best {
                None => true,
                Some((_, bv)) => rv != bv && pt.is_ancestor_or_self(rv, bv),
            };
            if higher {
                best = Some((i, rv));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Partition two root lists into independent apply groups.
    ///
    /// Each node is mapped to the highest pseudo-tree ancestor (including
    /// itself) that the opposite side tests; nodes mapping to the same
    /// head variable form a group, with the head taken from whichever side
    /// tests that variable and all opposite-side members following it.
    /// Every input root ends up in exactly one group.
    pub(crate) fn get_param_sets(
        &self,
        pt: &PseudoTree,
        lhs: &[MetaId],
        rhs: &[MetaId],
    ) -> Vec<(MetaId, Vec<MetaId>)> {
        // A single terminal argument pairs with the single lhs root as is.
        if lhs.len() == 1 && rhs.len() == 1 && self.is_terminal(rhs[0]) {
            return vec![(lhs[0], rhs.to_vec())];
        }

        let lhs_map: HashMap<Var, MetaId> = lhs.iter().map(|&m| (self.node(m).var, m)).collect();
        let rhs_map: HashMap<Var, MetaId> = rhs.iter().map(|&m| (self.node(m).var, m)).collect();

        let highest = |other: &HashMap<Var, MetaId>, from: Var| -> Var {
            let mut found = from;
            let mut cur = Some(from);
            while let Some(u) = cur {
                if other.contains_key(&u) {
                    found = u;
                }
                cur = pt.parent(u);
            }
            found
        };

        // Group members per head variable, sides kept apart; insertion
        // order of the input lists fixes the output order.
        let mut order: Vec<Var> = Vec::new();
        let mut groups: HashMap<Var, (Vec<MetaId>, Vec<MetaId>)> = HashMap::default();
        for &m in lhs {
            let h = highest(&rhs_map, self.node(m).var);
            if !groups.contains_key(&h) {
                order.push(h);
                groups.insert(h, (Vec::new(), Vec::new()));
            }
            groups.get_mut(&h).unwrap().0.push(m);
        }
        for &m in rhs {
            let h = highest(&lhs_map, self.node(m).var);
            if !groups.contains_key(&h) {
                order.push(h);
                groups.insert(h, (Vec::new(), Vec::new()));
            }
            groups.get_mut(&h).unwrap().1.push(m);
        }

        let mut out = Vec::with_capacity(order.len());
        for h in order {
            let (ls, rs) = groups.remove(&h).unwrap();
            if let Some(i) = ls.iter().position(|&m| self.node(m).var == h) {
                debug_assert_eq!(ls.len(), 1, "overlapping subtrees on one side");
                out.push((ls[i], rs));
            } else {
                let i = rs
                    .iter()
                    .position(|&m| self.node(m).var == h)
                    .expect("group head not present on either side");
                debug_assert_eq!(rs.len(), 1, "overlapping subtrees on one side");
                out.push((rs[i], ls));
            }
        }
        out
    }
}
