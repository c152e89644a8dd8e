//! Dense multidimensional factor tables.
//!
//! The table layout follows the scope ordering: the first variable is the
//! most significant digit, so the last variable of the ordering changes
//! fastest between consecutive entries (row-major in the UAI sense).
//! Tables serve as the construction input for diagrams, as the vanilla
//! bucket elimination backend and as the cross-checking oracle in tests.

use itertools::Itertools;

use crate::model::scope::{Assignment, Scope, Var};

#[derive(Debug, Clone, Default)]
pub struct TableFunction {
    domain: Scope,
    values: Vec<f64>,
}

impl TableFunction {
    /// All-zero table over the given domain.
    pub fn new(domain: Scope) -> Self {
        let card = domain.card() as usize;
        TableFunction {
            domain,
            values: vec![0.0; card],
        }
    }

    pub fn with_values(domain: Scope, values: Vec<f64>) -> Self {
        assert_eq!(
            domain.card() as usize,
            values.len(),
            "table size does not match scope cardinality"
        );
        TableFunction { domain, values }
    }

    pub fn scope(&self) -> &Scope {
        &self.domain
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn order(&self) -> Vec<Var> {
        self.domain.vars().collect()
    }

    /// Value under an assignment covering (at least) this table's scope.
    pub fn get_val(&self, a: &Assignment, log_out: bool) -> f64 {
        let idx = a
            .index_under(&self.order())
            .expect("assignment does not cover table scope");
        let v = self.values[idx];
        if log_out {
            v.ln()
        } else {
            v
        }
    }

    pub fn set_val(&mut self, a: &Assignment, val: f64) -> bool {
        match a.index_under(&self.order()) {
            Some(idx) => {
                self.values[idx] = val;
                true
            }
            None => false,
        }
    }

    /// Reorder the scope and re-index the values accordingly.
    pub fn set_ordering(&mut self, global: &[Var]) {
        let mut new_scope = self.domain.clone();
        new_scope.set_ordering(global);
        let new_order: Vec<Var> = new_scope.vars().collect();

        let mut new_values = vec![0.0; self.values.len()];
        if self.domain.num_vars() > 0 {
            let mut a = Assignment::new(&self.domain);
            a.set_all(0);
            loop {
                new_values[a.index_under(&new_order).unwrap()] = self.values[a.index().unwrap()];
                if !a.iterate() {
                    break;
                }
            }
        } else if !self.values.is_empty() {
            new_values[0] = self.values[0];
        }
        self.domain = new_scope;
        self.values = new_values;
    }

    /// Pointwise product; the domain grows to the union of both scopes.
    pub fn multiply(&mut self, rhs: &TableFunction) {
        let domain = self
            .domain
            .union(&rhs.domain)
            .expect("multiplying tables with inconsistent cardinalities");
        let mut values = Vec::with_capacity(domain.card() as usize);
        let mut a = Assignment::new(&domain);
        a.set_all(0);
        loop {
            values.push(self.get_val(&a, false) * rhs.get_val(&a, false));
            if !a.iterate() {
                break;
            }
        }
        self.domain = domain;
        self.values = values;
    }

    /// Sum out the given variables.
    pub fn marginalize(&mut self, elim: &Scope) {
        self.eliminate(elim, 0.0, |acc, v| acc + v);
    }

    /// Max out the given variables.
    pub fn maximize(&mut self, elim: &Scope) {
        self.eliminate(elim, f64::NEG_INFINITY, f64::max);
    }

    fn eliminate(&mut self, elim: &Scope, init: f64, combine: fn(f64, f64) -> f64) {
        if self.domain.num_vars() == 0 {
            return;
        }
        let kept = self
            .domain
            .difference(elim)
            .expect("eliminating with inconsistent cardinalities");
        let kept_order: Vec<Var> = kept.vars().collect();
        let mut values = vec![init; kept.card() as usize];
        let mut a = Assignment::new(&self.domain);
        a.set_all(0);
        loop {
            let idx = a.index_under(&kept_order).unwrap();
            values[idx] = combine(values[idx], self.values[a.index().unwrap()]);
            if !a.iterate() {
                break;
            }
        }
        self.domain = kept;
        self.values = values;
    }

    /// Restrict to the evidence in `cond` (irreversible).
    pub fn condition(&mut self, cond: &Assignment) {
        let mut kept = self.domain.clone();
        for v in self.domain.vars() {
            if cond.is_assigned(v) {
                kept.remove_var(v);
            }
        }
        let mut values = Vec::with_capacity(kept.card() as usize);
        let mut full = Assignment::new(&self.domain);
        full.set_all(0);
        full.set_assign(cond);
        if kept.num_vars() > 0 {
            let mut a = Assignment::new(&kept);
            a.set_all(0);
            loop {
                full.set_assign(&a);
                values.push(self.values[full.index().unwrap()]);
                if !a.iterate() {
                    break;
                }
            }
        } else {
            values.push(self.values[full.index().unwrap()]);
        }
        self.domain = kept;
        self.values = values;
    }

    pub fn save(&self) -> String {
        format!(
            "({}) [{}]",
            self.domain.vars().map(|v| v.0).join(" "),
            self.values.iter().map(|v| v.to_string()).join(" ")
        )
    }

    pub fn print_as_table(&self) -> String {
        let mut out = String::new();
        let mut a = Assignment::new(&self.domain);
        a.set_all(0);
        loop {
            out.push_str(&format!("{}: {}\n", a, self.get_val(&a, false)));
            if !a.iterate() {
                break;
            }
        }
        out
    }
}
