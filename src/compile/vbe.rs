//! Vanilla (dense-table) bucket elimination, used as a baseline and for
//! cross-checking the diagram-based path.

use crate::model::scope::{Assignment, Scope, Var};
use crate::model::table::TableFunction;

pub struct BucketTree {
    /// Root-first ordering (no dummy: dense elimination needs no anchor).
    ordering: Vec<Var>,
    buckets: Vec<Vec<TableFunction>>,
    /// Product of the scalar messages emitted so far.
    consts: f64,
}

impl BucketTree {
    pub fn new(functions: &[TableFunction], ordering: &[Var], evidence: &Assignment) -> Self {
        let mut bt = BucketTree {
            ordering: ordering.to_vec(),
            buckets: vec![Vec::new(); ordering.len()],
            consts: 1.0,
        };
        for tf in functions {
            let mut f = tf.clone();
            f.condition(evidence);
            bt.place(f);
        }
        bt
    }

    fn place(&mut self, f: TableFunction) {
        if f.scope().is_empty() {
            self.consts *= f.values()[0];
        } else {
            let (deepest, _) = *f.scope().ordering().last().unwrap();
            self.buckets[deepest.0 as usize].push(f);
        }
    }

    /// Eliminate every bucket variable; the remaining scalar is P(e).
    pub fn prob(mut self, log_out: bool) -> f64 {
        for i in (0..self.ordering.len()).rev() {
            let v = self.ordering[i];
            let bucket = std::mem::take(&mut self.buckets[v.0 as usize]);
            let Some((first, rest)) = bucket.split_first() else {
                continue;
            };
            let mut message = first.clone();
            for f in rest {
                message.multiply(f);
            }
            if let Some(card) = message.scope().try_card_of(v) {
                let mut elim = Scope::new();
                elim.add_var(v, card);
                message.marginalize(&elim);
            }
            message.set_ordering(&self.ordering);
            self.place(message);
        }
        if log_out {
            self.consts.ln()
        } else {
            self.consts
        }
    }
}
