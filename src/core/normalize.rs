//! Weight normalization: pushes all weight multiplicatively toward the
//! root, bottom-up. Afterwards the AND weights under every non-terminal
//! node sum to one and the root weight carries the partition function.

use rustc_hash::FxHashMap as HashMap;

use crate::core::manager::NodeManager;
use crate::core::node::{push_child, AndNode, MetaId, ONE, ZERO};

impl NodeManager {
    pub fn normalize(&mut self, root: MetaId) -> MetaId {
        let mut memo = HashMap::default();
        self.normalize_rec(root, &mut memo)
    }

    /// The returned node carries its local normalization constant in its
    /// weight; the caller extracts it into the incident AND weight and
    /// keeps a weight-1 copy of the child.
    fn normalize_rec(&mut self, id: MetaId, memo: &mut HashMap<MetaId, MetaId>) -> MetaId {
        if self.is_terminal(id) {
            return id;
        }
        if let Some(&r) = memo.get(&id) {
            return r;
        }

        let n = self.node(id).clone();
        let mut new_ands: Vec<AndNode> = Vec::with_capacity(n.children.len());
        for and in &n.children {
            if and.weight == 0.0 || and.children == [ZERO] {
                new_ands.push(AndNode::new(0.0, vec![ZERO]));
                continue;
            }
            let mut w = and.weight;
            let mut ch: Vec<MetaId> = Vec::new();
            let mut zero = false;
            for &c in &and.children {
                let c2 = self.normalize_rec(c, memo);
                if c2 == ZERO {
                    zero = true;
                    break;
                }
                w *= self.node(c2).weight;
                let stripped = if c2 == ONE { ONE } else { self.strip_weight(c2) };
                push_child(&mut ch, stripped);
            }
            if zero || w == 0.0 {
                new_ands.push(AndNode::new(0.0, vec![ZERO]));
                continue;
            }
            if ch.is_empty() {
                ch.push(ONE);
            }
            new_ands.push(AndNode::new(w, ch));
        }

        let z: f64 = new_ands.iter().map(|a| a.weight).sum();
        let result = if z == 0.0 {
            ZERO
        } else {
            let scaled = new_ands
                .into_iter()
                .map(|a| AndNode::new(a.weight / z, a.children))
                .collect();
            self.create_meta_node(n.var, n.card, scaled, n.weight * z)
        };
        memo.insert(id, result);
        result
    }

    fn strip_weight(&mut self, id: MetaId) -> MetaId {
        let n = self.node(id).clone();
        self.create_meta_node(n.var, n.card, n.children, 1.0)
    }
}
