//! Diagram-based bucket elimination.
//!
//! Every variable owns a bucket; a factor lands in the bucket of the
//! deepest (earliest-eliminated) variable of its scope. Buckets are then
//! processed in elimination order: the bucket's functions are multiplied
//! into a message which either travels up to the pseudo-tree parent
//! (compilation) or has the bucket variable summed out first (probability
//! of evidence).

use crate::compile::function::AomddFunction;
use crate::core::manager::NodeManager;
use crate::core::node::MetaId;
use crate::graph::pseudo_tree::PseudoTree;
use crate::model::scope::{Assignment, Scope, Var};
use crate::model::table::TableFunction;

#[derive(Debug, Clone, Default)]
pub struct Bucket {
    functions: Vec<AomddFunction>,
}

impl Bucket {
    pub fn add_function(&mut self, f: AomddFunction) {
        self.functions.push(f);
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn functions(&self) -> &[AomddFunction] {
        &self.functions
    }

    /// Multiply all functions of the bucket into one message. Insertion
    /// order does not matter for the rooting: apply re-roots each product
    /// at the top-most variable of its operands.
    pub fn flatten(&self, mgr: &mut NodeManager, pt: &PseudoTree) -> Option<AomddFunction> {
        let mut it = self.functions.iter();
        let mut message = it.next()?.clone();
        for f in it {
            message.multiply(mgr, pt, f);
        }
        Some(message)
    }
}

pub struct CompileBucketTree<'a> {
    pt: &'a PseudoTree,
    /// Root-first ordering, including the dummy slot for forests.
    ordering: Vec<Var>,
    buckets: Vec<Bucket>,
    evidence: Assignment,
}

impl<'a> CompileBucketTree<'a> {
    /// Lift every factor into a diagram and place it in the bucket of the
    /// deepest variable of its scope. Factor scopes must already be
    /// sorted root-first (see `Model::set_ordering`).
    pub fn new(
        mgr: &mut NodeManager,
        functions: &[TableFunction],
        pt: &'a PseudoTree,
        ordering: &[Var],
        evidence: Assignment,
    ) -> Self {
        let mut full_ordering = ordering.to_vec();
        let mut num_buckets = ordering.len();
        if pt.has_dummy() {
            full_ordering.insert(0, pt.dummy_var());
            num_buckets += 1;
        }

        let mut buckets = vec![Bucket::default(); num_buckets];
        for tf in functions {
            assert!(
                tf.scope().num_vars() > 0,
                "cannot bucket a constant factor"
            );
            let f = AomddFunction::from_table(mgr, tf.scope().clone(), tf.values(), true);
            let (deepest, _) = *tf.scope().ordering().last().unwrap();
            buckets[deepest.0 as usize].add_function(f);
        }

        CompileBucketTree {
            pt,
            ordering: full_ordering,
            buckets,
            evidence,
        }
    }

    /// Compile the full product diagram: multiply each bucket and pass the
    /// message to the pseudo-tree parent, without eliminating anything.
    /// Evidence is not applied here; callers condition the result.
    pub fn compile(&self, mgr: &mut NodeManager) -> AomddFunction {
        let mut buckets = self.buckets.clone();
        let mut compiled = AomddFunction::constant_one();

        for i in (0..self.ordering.len()).rev() {
            let v = self.ordering[i];
            let bucket = std::mem::take(&mut buckets[v.0 as usize]);
            let Some(mut message) = bucket.flatten(mgr, self.pt) else {
                continue;
            };
            message.set_scope_ordering(&self.ordering);
            log::debug!(
                "bucket {}: message scope size {}, diagram size {:?}",
                v.0,
                message.scope().num_vars(),
                message.size(mgr)
            );
            match self.pt.parent(v) {
                Some(p) => buckets[p.0 as usize].add_function(message),
                None => compiled = message,
            }
        }
        compiled
    }

    /// Probability of evidence: condition, then eliminate every bucket
    /// variable on the way up. The diagram collapses to a scalar.
    pub fn prob(&self, mgr: &mut NodeManager, log_out: bool) -> f64 {
        let mut buckets = vec![Bucket::default(); self.buckets.len()];
        let mut p = 1.0;
        let empty = Assignment::new(&Scope::new());

        let accumulate = |mgr: &NodeManager, p: &mut f64, root: MetaId| {
            *p *= mgr.get_val(root, &empty, false);
        };

        for bucket in &self.buckets {
            for f in bucket.functions() {
                let mut f = f.clone();
                if self.evidence.num_vars() > 0 {
                    f.condition(mgr, &self.evidence);
                }
                if f.scope().is_empty() {
                    accumulate(mgr, &mut p, f.root());
                } else {
                    let (deepest, _) = *f.scope().ordering().last().unwrap();
                    buckets[deepest.0 as usize].add_function(f);
                }
            }
        }

        for i in (0..self.ordering.len()).rev() {
            let v = self.ordering[i];
            let bucket = std::mem::take(&mut buckets[v.0 as usize]);
            let Some(mut message) = bucket.flatten(mgr, self.pt) else {
                continue;
            };
            if let Some(card) = message.scope().try_card_of(v) {
                let mut elim = Scope::new();
                elim.add_var(v, card);
                message.marginalize(mgr, self.pt, &elim);
            }
            message.set_scope_ordering(&self.ordering);
            if message.scope().is_empty() {
                accumulate(mgr, &mut p, message.root());
            } else {
                let parent = self
                    .pt
                    .parent(v)
                    .expect("non-root bucket message without a parent");
                buckets[parent.0 as usize].add_function(message);
            }
        }

        if log_out {
            p.ln()
        } else {
            p
        }
    }
}
