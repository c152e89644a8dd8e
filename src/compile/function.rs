//! A factor represented by a decision diagram: a scope plus a root node,
//! with the symbolic operations delegated to the [NodeManager].

use itertools::Itertools;

use crate::core::manager::{NodeManager, Operator};
use crate::core::node::{MetaId, ONE};
use crate::graph::pseudo_tree::PseudoTree;
use crate::model::scope::{Assignment, Scope, Var};

#[derive(Debug, Clone)]
pub struct AomddFunction {
    domain: Scope,
    root: MetaId,
}

impl AomddFunction {
    /// The constant-one factor over the empty scope.
    pub fn constant_one() -> Self {
        AomddFunction {
            domain: Scope::new(),
            root: ONE,
        }
    }

    /// Lift a dense table into a diagram. The scope ordering decides the
    /// variable nesting, so it should be root-first with respect to the
    /// pseudo tree the function will be combined under.
    pub fn from_table(
        mgr: &mut NodeManager,
        domain: Scope,
        values: &[f64],
        reduce: bool,
    ) -> Self {
        let mut root = mgr.create_from_table(&domain, values, 1.0);
        if reduce {
            root = mgr.full_reduce(root);
        }
        AomddFunction { domain, root }
    }

    pub fn root(&self) -> MetaId {
        self.root
    }

    pub fn scope(&self) -> &Scope {
        &self.domain
    }

    /// Re-sort the scope ordering; the diagram itself is unaffected.
    pub fn set_scope_ordering(&mut self, global: &[Var]) {
        self.domain.set_ordering(global);
    }

    pub fn multiply(&mut self, mgr: &mut NodeManager, pt: &PseudoTree, rhs: &AomddFunction) {
        self.root = mgr.apply(self.root, &[rhs.root], Operator::Prod, pt);
        self.domain = self
            .domain
            .union(&rhs.domain)
            .expect("multiplying functions with inconsistent cardinalities");
        self.root = mgr.full_reduce(self.root);
    }

    /// Sum out the given variables; ones absent from the scope are
    /// ignored.
    pub fn marginalize(&mut self, mgr: &mut NodeManager, pt: &PseudoTree, elim: &Scope) {
        let elim_here = self
            .domain
            .intersect(elim)
            .expect("marginalizing with inconsistent cardinalities");
        self.root = mgr.marginalize(self.root, &elim_here, pt);
        self.root = mgr.full_reduce(self.root);
        self.domain = self.domain.difference(&elim_here).unwrap();
    }

    /// Max out the given variables; ones absent from the scope are
    /// ignored.
    pub fn maximize(&mut self, mgr: &mut NodeManager, pt: &PseudoTree, elim: &Scope) {
        let elim_here = self
            .domain
            .intersect(elim)
            .expect("maximizing with inconsistent cardinalities");
        self.root = mgr.maximize(self.root, &elim_here, pt);
        self.root = mgr.full_reduce(self.root);
        self.domain = self.domain.difference(&elim_here).unwrap();
    }

    /// Restrict to the evidence in `cond`; assigned variables leave the
    /// scope.
    pub fn condition(&mut self, mgr: &mut NodeManager, cond: &Assignment) {
        self.root = mgr.condition(self.root, cond);
        self.root = mgr.full_reduce(self.root);
        let assigned: Vec<Var> = self
            .domain
            .vars()
            .filter(|&v| cond.is_assigned(v))
            .collect();
        for v in assigned {
            self.domain.remove_var(v);
        }
    }

    /// Push all weight toward the root; the root weight becomes the
    /// partition function.
    pub fn normalize(&mut self, mgr: &mut NodeManager) {
        self.root = mgr.normalize(self.root);
    }

    pub fn get_val(&self, mgr: &NodeManager, a: &Assignment, log_out: bool) -> f64 {
        mgr.get_val(self.root, a, log_out)
    }

    /// Number of distinct (meta, AND) nodes in the diagram.
    pub fn size(&self, mgr: &NodeManager) -> (usize, usize) {
        mgr.size(self.root)
    }

    /// Debug dump of scope and diagram (see [NodeManager::dump]).
    pub fn save(&self, mgr: &NodeManager) -> String {
        format!(
            "scope: ({})\n{}",
            self.domain.vars().map(|v| v.0).join(" "),
            mgr.dump(self.root)
        )
    }

    /// The function as a dense table over its scope.
    pub fn print_as_table(&self, mgr: &NodeManager) -> String {
        let mut out = String::new();
        let mut a = Assignment::new(&self.domain);
        a.set_all(0);
        loop {
            out.push_str(&format!("{}: {}\n", a, self.get_val(mgr, &a, false)));
            if !a.iterate() {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test::{pt_for, random_table, scope};
    use crate::model::table::TableFunction;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn assert_matches_oracle(
        mgr: &NodeManager,
        f: &AomddFunction,
        oracle: &TableFunction,
        full: &Scope,
    ) {
        let mut a = Assignment::new(full);
        a.set_all(0);
        loop {
            let got = f.get_val(mgr, &a, false);
            let want = oracle.get_val(&a, false);
            assert!(
                (got - want).abs() < 1e-10,
                "mismatch at [{}]: diagram {} vs oracle {}",
                a,
                got,
                want
            );
            if !a.iterate() {
                break;
            }
        }
    }

    /// Round trip for random tables: lifted diagrams agree with the dense
    /// oracle on every assignment.
    #[test]
    fn random_tables_round_trip() {
        init();
        let mut rng = StdRng::seed_from_u64(0xA0);
        for _ in 0..20 {
            let mut mgr = NodeManager::default();
            let s = scope(&[(0, 2), (1, 3), (2, 2)]);
            let values = random_table(&mut rng, 12);
            let f = AomddFunction::from_table(&mut mgr, s.clone(), &values, true);
            let oracle = TableFunction::with_values(s.clone(), values);
            assert_matches_oracle(&mgr, &f, &oracle, &s);
        }
    }

    /// Iterated multiplication equals the product of the raw tables.
    #[test]
    fn multiply_matches_dense_product() {
        init();
        let mut rng = StdRng::seed_from_u64(0xA1);
        let s1 = scope(&[(0, 2), (1, 2)]);
        let s2 = scope(&[(1, 2), (2, 3)]);
        let s3 = scope(&[(0, 2)]);
        let pt = pt_for(&[s1.clone(), s2.clone(), s3.clone()], &[0, 1, 2], 3);

        for _ in 0..10 {
            let mut mgr = NodeManager::default();
            let v1 = random_table(&mut rng, 4);
            let v2 = random_table(&mut rng, 6);
            let v3 = random_table(&mut rng, 2);

            let mut f = AomddFunction::from_table(&mut mgr, s1.clone(), &v1, true);
            let f2 = AomddFunction::from_table(&mut mgr, s2.clone(), &v2, true);
            let f3 = AomddFunction::from_table(&mut mgr, s3.clone(), &v3, true);
            f.multiply(&mut mgr, &pt, &f2);
            f.multiply(&mut mgr, &pt, &f3);

            let mut oracle = TableFunction::with_values(s1.clone(), v1);
            oracle.multiply(&TableFunction::with_values(s2.clone(), v2));
            oracle.multiply(&TableFunction::with_values(s3.clone(), v3));

            let full = s1.union(&s2).unwrap();
            assert_matches_oracle(&mgr, &f, &oracle, &full);
        }
    }

    /// Multiplying with the deeper-rooted function as the receiver still
    /// nests the product by the pseudo tree; summing the deep variables
    /// back out then finds a frontier at every eliminated node.
    #[test]
    fn multiply_deeper_rooted_receiver() {
        init();
        let mut rng = StdRng::seed_from_u64(0xA5);
        let s12 = scope(&[(1, 2), (2, 2)]);
        let s02 = scope(&[(0, 2), (2, 2)]);
        let pt = pt_for(&[s12.clone(), s02.clone()], &[0, 1, 2], 3);

        for _ in 0..10 {
            let mut mgr = NodeManager::default();
            let v1 = random_table(&mut rng, 4);
            let v2 = random_table(&mut rng, 4);
            let mut f = AomddFunction::from_table(&mut mgr, s12.clone(), &v1, true);
            let g = AomddFunction::from_table(&mut mgr, s02.clone(), &v2, true);
            f.multiply(&mut mgr, &pt, &g);

            let mut oracle = TableFunction::with_values(s12.clone(), v1);
            oracle.multiply(&TableFunction::with_values(s02.clone(), v2));
            let full = scope(&[(0, 2), (1, 2), (2, 2)]);
            assert_matches_oracle(&mgr, &f, &oracle, &full);

            let elim = scope(&[(1, 2), (2, 2)]);
            f.marginalize(&mut mgr, &pt, &elim);
            oracle.marginalize(&elim);
            assert_matches_oracle(&mgr, &f, &oracle, &scope(&[(0, 2)]));
        }
    }

    /// Marginalizing the diagram equals marginalizing the dense table.
    #[test]
    fn marginalize_matches_dense_sum() {
        init();
        let mut rng = StdRng::seed_from_u64(0xA2);
        let s = scope(&[(0, 2), (1, 3), (2, 2)]);
        let pt = pt_for(&[s.clone()], &[0, 1, 2], 3);
        let elim = scope(&[(1, 3), (2, 2)]);

        for _ in 0..10 {
            let mut mgr = NodeManager::default();
            let values = random_table(&mut rng, 12);
            let mut f = AomddFunction::from_table(&mut mgr, s.clone(), &values, true);
            f.marginalize(&mut mgr, &pt, &elim);
            assert_eq!(f.scope().num_vars(), 1);

            let mut oracle = TableFunction::with_values(s.clone(), values);
            oracle.marginalize(&elim);
            assert_matches_oracle(&mgr, &f, &oracle, &scope(&[(0, 2)]));
        }
    }

    /// Conditioning the diagram equals conditioning the dense table.
    #[test]
    fn condition_matches_dense_restriction() {
        init();
        let mut rng = StdRng::seed_from_u64(0xA3);
        let s = scope(&[(0, 2), (1, 3)]);
        for _ in 0..10 {
            let mut mgr = NodeManager::default();
            let values = random_table(&mut rng, 6);
            let mut f = AomddFunction::from_table(&mut mgr, s.clone(), &values, true);

            let mut ev = Assignment::new(&scope(&[(1, 3)]));
            ev.set_val(Var(1), 2);
            f.condition(&mut mgr, &ev);
            assert_eq!(f.scope().num_vars(), 1);

            let mut oracle = TableFunction::with_values(s.clone(), values);
            oracle.condition(&ev);
            assert_matches_oracle(&mgr, &f, &oracle, &scope(&[(0, 2)]));
        }
    }

    /// Normalization keeps values and exposes the partition function at
    /// the root.
    #[test]
    fn normalize_keeps_values() {
        init();
        let mut rng = StdRng::seed_from_u64(0xA4);
        let s = scope(&[(0, 2), (1, 2)]);
        for _ in 0..10 {
            let mut mgr = NodeManager::default();
            let values = random_table(&mut rng, 4);
            if values.iter().all(|&v| v == 0.0) {
                continue;
            }
            let mut f = AomddFunction::from_table(&mut mgr, s.clone(), &values, true);
            f.normalize(&mut mgr);

            let root = mgr.node(f.root());
            if !root.is_terminal() {
                let sum: f64 = root.children.iter().map(|a| a.weight).sum();
                assert!((sum - 1.0).abs() < 1e-10);
            }

            let oracle = TableFunction::with_values(s.clone(), values);
            assert_matches_oracle(&mgr, &f, &oracle, &s);
        }
    }
}
