//! The node store: hash-consed unique table plus operation cache.
//!
//! All diagram building and manipulation goes through a [NodeManager].
//! Nodes are immutable once interned and addressed by dense [MetaId]s, so
//! operation-cache keys hash deterministically across runs (no dependence
//! on allocator behavior). Nothing is ever evicted; the store lives as
//! long as the compile does.

use std::fmt;

use itertools::Itertools;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

use crate::core::node::{AndNode, MetaId, MetaNode, ONE, ZERO};
use crate::model::scope::{Assignment, Scope, Var};

/// Operators memoized in the operation cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Prod,
    Sum,
    Max,
    Reduce,
    Marginalize,
}

/// Operation-cache key: operator, auxiliary variable and the unordered set
/// of argument nodes. Arguments are kept sorted by id so that commutative
/// applications hash equal regardless of argument order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    op: Operator,
    var: Var,
    params: Vec<MetaId>,
}

impl Operation {
    pub fn new(op: Operator, var: Var, mut params: Vec<MetaId>) -> Self {
        params.sort_unstable();
        Operation { op, var, params }
    }

    pub fn unary(op: Operator, arg: MetaId) -> Self {
        Operation::new(op, Var(0), vec![arg])
    }

    pub fn with_var(op: Operator, arg: MetaId, var: Var) -> Self {
        Operation::new(op, var, vec![arg])
    }

    pub fn apply(op: Operator, lhs: MetaId, rhs: &[MetaId]) -> Self {
        let mut params = Vec::with_capacity(rhs.len() + 1);
        params.push(lhs);
        params.extend_from_slice(rhs);
        Operation::new(op, Var(0), params)
    }
}

/// Container combining the node list, the unique table and the operation
/// cache.
pub struct NodeManager {
    /// Node list; a [MetaId] indexes into it
    nodes: Vec<MetaNode>,
    /// Unique table: structural node -> id
    unique: HashMap<MetaNode, MetaId>,
    /// Memoized operation results
    op_cache: HashMap<Operation, MetaId>,
}

impl fmt::Debug for NodeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NodeManager [{} nodes, unique table size {}, cache size {}]",
            self.nodes.len(),
            self.unique.len(),
            self.op_cache.len()
        )
    }
}

impl Default for NodeManager {
    fn default() -> Self {
        let mut man = NodeManager {
            nodes: Vec::new(),
            unique: HashMap::default(),
            op_cache: HashMap::default(),
        };

        man.bootstrap();
        man
    }
}

impl NodeManager {
    /// Initialize the store with the zero and one terminal singletons.
    fn bootstrap(&mut self) {
        let zero = self.intern(MetaNode::zero());
        let one = self.intern(MetaNode::one());
        assert_eq!(zero, ZERO);
        assert_eq!(one, ONE);
    }

    pub fn node(&self, id: MetaId) -> &MetaNode {
        &self.nodes[id.0]
    }

    pub fn is_terminal(&self, id: MetaId) -> bool {
        id == ZERO || id == ONE
    }

    pub fn is_dummy(&self, id: MetaId) -> bool {
        self.node(id).is_dummy()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn intern(&mut self, node: MetaNode) -> MetaId {
        if let Some(&id) = self.unique.get(&node) {
            return id;
        }
        let id = MetaId(self.nodes.len());
        self.unique.insert(node.clone(), id);
        self.nodes.push(node);
        id
    }

    //------------------------------------------------------------------------//
    // Node creation

    /// Search for a structurally equal node, create if it doesn't exist.
    pub fn create_meta_node(
        &mut self,
        var: Var,
        card: u32,
        children: Vec<AndNode>,
        weight: f64,
    ) -> MetaId {
        assert!(var.0 >= 0, "creating a meta node with a reserved variable");
        assert_eq!(
            card as usize,
            children.len(),
            "meta node child count does not match cardinality"
        );
        self.intern(MetaNode::new(var, card, children, weight))
    }

    /// Table-to-diagram construction. The first variable of the scope's
    /// ordering becomes the root; its value splits the table into
    /// contiguous chunks. Cardinality-1 variables produce dummy layers.
    pub fn create_from_table(&mut self, vars: &Scope, values: &[f64], weight: f64) -> MetaId {
        assert!(
            vars.num_vars() > 0,
            "table construction requires a non-empty scope"
        );
        assert_eq!(
            vars.card() as usize,
            values.len(),
            "table size does not match scope cardinality"
        );
        let (v0, c0) = vars.ordering()[0];

        let mut children = Vec::with_capacity(c0 as usize);
        if vars.num_vars() == 1 {
            for &val in values {
                let terminal = if val == 0.0 { ZERO } else { ONE };
                children.push(AndNode::new(val, vec![terminal]));
            }
        } else {
            let mut rest = vars.clone();
            rest.remove_var(v0);
            let chunk = values.len() / c0 as usize;
            for piece in values.chunks(chunk) {
                let sub = self.create_from_table(&rest, piece, 1.0);
                children.push(AndNode::new(1.0, vec![sub]));
            }
        }
        self.create_meta_node(v0, c0, children, weight)
    }

    /// Re-intern a node with its weight multiplied by `factor`. Terminals
    /// are wrapped in a dummy anchor for `anchor_var` instead, since their
    /// weights are fixed.
    pub(crate) fn scale(&mut self, id: MetaId, factor: f64, anchor_var: Var) -> MetaId {
        if factor == 1.0 || id == ZERO {
            return id;
        }
        if id == ONE {
            return self.create_meta_node(anchor_var, 1, vec![AndNode::new(factor, vec![ONE])], 1.0);
        }
        let n = self.node(id).clone();
        self.intern(MetaNode::new(n.var, n.card, n.children, n.weight * factor))
    }

    //------------------------------------------------------------------------//
    // Operation cache

    pub(crate) fn cache_lookup(&self, op: &Operation) -> Option<MetaId> {
        self.op_cache.get(op).copied()
    }

    pub(crate) fn cache_insert(&mut self, op: Operation, result: MetaId) {
        self.op_cache.insert(op, result);
    }

    /// Drop all memoized operation results (the unique table is kept).
    pub fn clear_cache(&mut self) {
        self.op_cache.clear();
    }

    //------------------------------------------------------------------------//
    // Evaluation

    /// Value of the function rooted at `id` under a full assignment.
    /// With `log_out` the multiplications along the path become additions
    /// of logarithms.
    pub fn get_val(&self, id: MetaId, a: &Assignment, log_out: bool) -> f64 {
        if log_out {
            self.get_val_log(id, a)
        } else {
            self.get_val_lin(id, a)
        }
    }

    fn get_val_lin(&self, id: MetaId, a: &Assignment) -> f64 {
        if id == ZERO {
            return 0.0;
        }
        if id == ONE {
            return 1.0;
        }
        let n = self.node(id);
        let k = if n.card == 1 {
            0
        } else {
            a.val_of(n.var)
                .unwrap_or_else(|| panic!("assignment misses variable {}", n.var.0))
                as usize
        };
        let and = &n.children[k];
        let mut acc = n.weight * and.weight;
        if acc == 0.0 {
            return 0.0;
        }
        for &c in &and.children {
            acc *= self.get_val_lin(c, a);
        }
        acc
    }

    fn get_val_log(&self, id: MetaId, a: &Assignment) -> f64 {
        if id == ZERO {
            return f64::NEG_INFINITY;
        }
        if id == ONE {
            return 0.0;
        }
        let n = self.node(id);
        let k = if n.card == 1 {
            0
        } else {
            a.val_of(n.var)
                .unwrap_or_else(|| panic!("assignment misses variable {}", n.var.0))
                as usize
        };
        let and = &n.children[k];
        let mut acc = n.weight.ln() + and.weight.ln();
        for &c in &and.children {
            acc += self.get_val_log(c, a);
        }
        acc
    }

    //------------------------------------------------------------------------//
    // Diagnostics

    /// Collect all nodes that are part of the function rooted at `id`.
    fn collect_nodes(&self, id: MetaId) -> HashSet<MetaId> {
        let mut seen = HashSet::default();
        let mut stack = vec![id];
        while let Some(x) = stack.pop() {
            if !seen.insert(x) {
                continue;
            }
            for and in &self.node(x).children {
                stack.extend_from_slice(&and.children);
            }
        }
        seen
    }

    /// Number of distinct meta and AND nodes reachable from `id`.
    pub fn size(&self, id: MetaId) -> (usize, usize) {
        let metas = self.collect_nodes(id);
        let mut num_and = 0;
        for &m in &metas {
            let node = self.node(m);
            let distinct: HashSet<&AndNode> = node.children.iter().collect();
            num_and += distinct.len();
        }
        (metas.len(), num_and)
    }

    /// Debug-only textual dump of the function rooted at `id`. One line
    /// per distinct meta node, children referenced by id. Not a stable
    /// format and not machine-reloadable.
    pub fn dump(&self, id: MetaId) -> String {
        let mut out = String::new();
        let mut seen = HashSet::default();
        self.dump_rec(id, &mut seen, &mut out);
        out
    }

    fn dump_rec(&self, id: MetaId, seen: &mut HashSet<MetaId>, out: &mut String) {
        if !seen.insert(id) {
            return;
        }
        let n = self.node(id);
        out.push_str(&format!(
            "#{} {}:{}, {}, [{}]\n",
            id.0,
            n.var.0,
            n.card,
            n.weight,
            n.children
                .iter()
                .map(|and| format!(
                    "{} [{}]",
                    and.weight,
                    and.children.iter().map(|c| format!("#{}", c.0)).join(" ")
                ))
                .join(" | ")
        ));
        for and in &n.children {
            for &c in &and.children {
                self.dump_rec(c, seen, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test::{diagram_matches_table, scope};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn terminal_singletons() {
        init();
        let mgr = NodeManager::default();
        assert_eq!(mgr.num_nodes(), 2);
        assert!(mgr.node(ZERO).is_terminal());
        assert!(mgr.node(ONE).is_terminal());
        assert_eq!(mgr.node(ZERO).weight, 0.0);
        assert_eq!(mgr.node(ONE).weight, 1.0);
    }

    #[test]
    fn interning_is_canonical() {
        init();
        let mut mgr = NodeManager::default();
        let a = mgr.create_meta_node(Var(0), 2, vec![
            AndNode::new(0.2, vec![ONE]),
            AndNode::new(0.8, vec![ONE]),
        ], 1.0);
        let b = mgr.create_meta_node(Var(0), 2, vec![
            AndNode::new(0.2, vec![ONE]),
            AndNode::new(0.8, vec![ONE]),
        ], 1.0);
        assert_eq!(a, b);
        assert_eq!(mgr.num_nodes(), 3);

        // A weight differing only by floating-point noise interns equal.
        let c = mgr.create_meta_node(Var(0), 2, vec![
            AndNode::new(0.1 + 0.1, vec![ONE]),
            AndNode::new(0.8, vec![ONE]),
        ], 1.0);
        assert_eq!(a, c);
    }

    #[test]
    fn table_construction_round_trips() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 3)]);
        let values = [0.1, 0.0, 0.3, 0.4, 0.5, 0.6];
        let root = mgr.create_from_table(&s, &values, 1.0);
        diagram_matches_table(&mgr, root, &s, &values);
    }

    #[test]
    fn table_construction_shares_identical_subtables() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        // Both halves are the same subtable over variable 1.
        let root = mgr.create_from_table(&s, &[0.3, 0.7, 0.3, 0.7], 1.0);
        let n = mgr.node(root);
        assert_eq!(n.children[0], n.children[1]);
    }

    #[test]
    fn dummy_layer_for_card_one_variable() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 1), (1, 2)]);
        let root = mgr.create_from_table(&s, &[0.4, 0.6], 1.0);
        let n = mgr.node(root);
        assert!(n.is_dummy());
        assert_eq!(n.children.len(), 1);
        diagram_matches_table(&mgr, root, &s, &[0.4, 0.6]);
    }

    #[test]
    fn log_evaluation() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2)]);
        let root = mgr.create_from_table(&s, &[0.25, 0.0], 1.0);
        let mut a = Assignment::new(&s);
        a.set_val(Var(0), 0);
        assert!((mgr.get_val(root, &a, true) - 0.25f64.ln()).abs() < 1e-12);
        a.set_val(Var(0), 1);
        assert_eq!(mgr.get_val(root, &a, true), f64::NEG_INFINITY);
    }

    #[test]
    fn size_counts_shared_nodes_once() {
        init();
        let mut mgr = NodeManager::default();
        let s = scope(&[(0, 2), (1, 2)]);
        let root = mgr.create_from_table(&s, &[0.3, 0.7, 0.3, 0.7], 1.0);
        // Root, one shared child over variable 1, plus the two terminals.
        let (num_meta, num_and) = mgr.size(root);
        assert_eq!(num_meta, 3);
        assert_eq!(num_and, 3);
    }
}
