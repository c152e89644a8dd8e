//! Graphviz export of a pseudo tree.

use crate::graph::pseudo_tree::PseudoTree;

/// Generate a DOT digraph for the pseudo tree.
pub fn pseudo_tree_dot(pt: &PseudoTree) -> String {
    let mut graph = String::new();
    graph += "digraph G {\n";
    if pt.has_dummy() {
        graph += format!("\"{}\" [label=\"dummy\" shape = \"box\"];\n", pt.root().0).as_str();
    }

    let mut edges = String::new();
    let mut stack = vec![pt.root()];
    while let Some(v) = stack.pop() {
        for &c in pt.children(v) {
            edges += format!("\"{}\" -> \"{}\"\n", v.0, c.0).as_str();
            stack.push(c);
        }
    }

    graph += edges.as_str();
    graph += "}\n";
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::primal::Graph;
    use crate::model::scope::{Scope, Var};

    #[test]
    fn dot_contains_all_edges() {
        let mut s1 = Scope::new();
        s1.add_var(Var(0), 2);
        s1.add_var(Var(1), 2);
        let g = Graph::new(2, &[s1]);
        let pt = PseudoTree::new(&g, &[Var(0), Var(1)]);
        let dot = pseudo_tree_dot(&pt);
        assert!(dot.starts_with("digraph G {"));
        assert!(dot.contains("\"0\" -> \"1\""));
    }
}
