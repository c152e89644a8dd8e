//! Variable-interaction (primal) graph of a factor network: one vertex per
//! variable, an edge between every pair of variables sharing a factor
//! scope.

use itertools::Itertools;
use rustc_hash::FxHashSet as HashSet;

use crate::model::scope::{Scope, Var};

#[derive(Debug, Clone)]
pub struct Graph {
    adj: Vec<HashSet<usize>>,
}

impl Graph {
    pub fn new(num_vars: usize, scopes: &[Scope]) -> Self {
        let mut g = Graph {
            adj: vec![HashSet::default(); num_vars],
        };
        for scope in scopes {
            for (a, b) in scope.vars().tuple_combinations() {
                g.add_edge(a, b);
            }
        }
        g
    }

    pub fn num_vars(&self) -> usize {
        self.adj.len()
    }

    pub fn add_edge(&mut self, a: Var, b: Var) {
        if a == b {
            return;
        }
        self.adj[a.0 as usize].insert(b.0 as usize);
        self.adj[b.0 as usize].insert(a.0 as usize);
    }

    pub fn neighbors(&self, v: Var) -> impl Iterator<Item = Var> + '_ {
        self.adj[v.0 as usize].iter().map(|&u| Var(u as i32))
    }

    pub(crate) fn adjacency(&self) -> &[HashSet<usize>] {
        &self.adj
    }
}
