//! Pseudo tree over the variables of a factor network.
//!
//! Built by triangulating the primal graph along the elimination ordering:
//! eliminating a variable connects its not-yet-eliminated neighbors, and
//! the variable's parent becomes the earliest-eliminated of those. Every
//! factor scope then lies on a single root-to-leaf path, which is what the
//! apply and marginalize recursions rely on. A disconnected network yields
//! a forest, anchored under a synthetic cardinality-1 dummy root.

use rustc_hash::FxHashMap as HashMap;

use crate::graph::primal::Graph;
use crate::model::scope::Var;

#[derive(Debug, Clone)]
pub struct PseudoTree {
    /// Parent per variable; index `num_vars` is the dummy slot.
    parent: Vec<Option<Var>>,
    children: Vec<Vec<Var>>,
    root: Var,
    num_vars: usize,
    has_dummy: bool,
    induced_width: usize,
    height: usize,
}

impl PseudoTree {
    /// `ordering` lists all variables root-first (reverse elimination
    /// order): the last entry is eliminated first.
    pub fn new(graph: &Graph, ordering: &[Var]) -> Self {
        let n = graph.num_vars();
        assert_eq!(ordering.len(), n, "ordering does not cover all variables");

        let pos: HashMap<Var, usize> = ordering.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        let mut adj: Vec<Vec<usize>> = graph
            .adjacency()
            .iter()
            .map(|s| s.iter().copied().collect())
            .collect();
        // Deterministic regardless of hash-set iteration order.
        for l in adj.iter_mut() {
            l.sort_unstable();
            l.dedup();
        }

        let mut parent: Vec<Option<Var>> = vec![None; n + 1];
        let mut induced_width = 0;

        for i in (0..n).rev() {
            let v = ordering[i];
            let vi = v.0 as usize;
            let later: Vec<usize> = adj[vi]
                .iter()
                .copied()
                .filter(|&u| pos[&Var(u as i32)] < i)
                .collect();
            induced_width = induced_width.max(later.len());

            // Triangulate: eliminating v connects its remaining neighbors.
            for (a, &ua) in later.iter().enumerate() {
                for &ub in &later[a + 1..] {
                    if !adj[ua].contains(&ub) {
                        adj[ua].push(ub);
                        adj[ub].push(ua);
                    }
                }
            }

            // Parent: the later neighbor that is eliminated earliest.
            parent[vi] = later
                .iter()
                .max_by_key(|&&u| pos[&Var(u as i32)])
                .map(|&u| Var(u as i32));
        }

        let roots: Vec<Var> = (0..n)
            .map(|v| Var(v as i32))
            .filter(|&v| parent[v.0 as usize].is_none())
            .collect();
        let (root, has_dummy) = if roots.len() == 1 {
            (roots[0], false)
        } else {
            let dummy = Var(n as i32);
            for &r in &roots {
                parent[r.0 as usize] = Some(dummy);
            }
            (dummy, true)
        };

        let mut children: Vec<Vec<Var>> = vec![Vec::new(); n + 1];
        for v in 0..n {
            if let Some(p) = parent[v] {
                children[p.0 as usize].push(Var(v as i32));
            }
        }

        let mut pt = PseudoTree {
            parent,
            children,
            root,
            num_vars: n,
            has_dummy,
            induced_width,
            height: 0,
        };
        pt.height = pt.subtree_height(pt.root);
        pt
    }

    fn subtree_height(&self, v: Var) -> usize {
        self.children(v)
            .iter()
            .map(|&c| 1 + self.subtree_height(c))
            .max()
            .unwrap_or(0)
    }

    pub fn parent(&self, v: Var) -> Option<Var> {
        if v.0 < 0 || v.0 as usize > self.num_vars {
            return None;
        }
        self.parent[v.0 as usize]
    }

    pub fn children(&self, v: Var) -> &[Var] {
        static EMPTY: [Var; 0] = [];
        if v.0 < 0 || v.0 as usize > self.num_vars {
            return &EMPTY;
        }
        &self.children[v.0 as usize]
    }

    pub fn root(&self) -> Var {
        self.root
    }

    /// The synthetic root variable, if the network is a forest.
    pub fn has_dummy(&self) -> bool {
        self.has_dummy
    }

    pub fn dummy_var(&self) -> Var {
        Var(self.num_vars as i32)
    }

    pub fn induced_width(&self) -> usize {
        self.induced_width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether `anc` is `v` or lies on the path from `v` to the root.
    /// Reserved (terminal) variables are never related to anything.
    pub fn is_ancestor_or_self(&self, anc: Var, v: Var) -> bool {
        if anc.0 < 0 || v.0 < 0 {
            return false;
        }
        let mut cur = Some(v);
        while let Some(u) = cur {
            if u == anc {
                return true;
            }
            cur = self.parent(u);
        }
        false
    }
}
