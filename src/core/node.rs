//! Type definitions for the elements of the diagram: OR nodes ([MetaNode],
//! addressed by [MetaId]) and their AND children ([AndNode]).
//!
//! A meta node tests one variable and has exactly `card` AND children, one
//! per value. Each AND child carries a weight and one meta child per
//! pseudo-tree subtree below the tested variable. Weights are canonicalized
//! at construction (see [quantize]) so that hashing and equality agree on
//! floating-point-equivalent nodes.

use std::hash::{Hash, Hasher};

use crate::model::scope::Var;

/// Diagram node handle: an index into the [NodeManager]'s node list.
/// Special values: 0 and 1 for the terminal nodes.
///
/// [NodeManager]: crate::core::manager::NodeManager
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaId(pub usize);

/// Terminal node "zero"
pub const ZERO: MetaId = MetaId(0);
/// Terminal node "one"
pub const ONE: MetaId = MetaId(1);

/// Reserved variable of the zero terminal.
pub const ZERO_VAR: Var = Var(-1);
/// Reserved variable of the one terminal.
pub const ONE_VAR: Var = Var(-2);

/// Round a weight to 12 significant decimal digits.
///
/// Interned nodes store quantized weights only, so `f64::to_bits` is a
/// sound hashing key and results that differ by floating-point noise
/// (well below the 1e-10 comparison tolerance used elsewhere) intern to
/// the same node.
pub fn quantize(w: f64) -> f64 {
    if w == 0.0 || !w.is_finite() {
        // Maps -0.0 to 0.0.
        return if w == 0.0 { 0.0 } else { w };
    }
    let abs = w.abs();
    if !(1e-280..1e280).contains(&abs) {
        return w;
    }
    let exp = abs.log10().floor() as i32;
    let scale = 10f64.powi(11 - exp);
    (w * scale).round() / scale
}

/// AND child of a meta node: a weight for one (variable, value) pair plus
/// one meta child per pseudo-tree subtree hanging below the variable.
#[derive(Debug, Clone)]
pub struct AndNode {
    pub weight: f64,
    pub children: Vec<MetaId>,
}

impl AndNode {
    pub fn new(weight: f64, children: Vec<MetaId>) -> Self {
        AndNode {
            weight: quantize(weight),
            children,
        }
    }
}

impl PartialEq for AndNode {
    fn eq(&self, that: &Self) -> bool {
        self.weight.to_bits() == that.weight.to_bits() && self.children == that.children
    }
}

impl Eq for AndNode {}

impl Hash for AndNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.weight.to_bits().hash(state);
        self.children.hash(state);
    }
}

/// OR node labeled with a variable. Equality and hashing are structural
/// over (var, card, weight, AND children); meta children inside the AND
/// nodes compare by id, which is pointer identity once hash-consed.
#[derive(Debug, Clone)]
pub struct MetaNode {
    pub var: Var,
    pub card: u32,
    pub weight: f64,
    pub children: Vec<AndNode>,
}

impl MetaNode {
    pub fn new(var: Var, card: u32, children: Vec<AndNode>, weight: f64) -> Self {
        MetaNode {
            var,
            card,
            weight: quantize(weight),
            children,
        }
    }

    /// The singleton zero terminal value.
    pub fn zero() -> Self {
        MetaNode {
            var: ZERO_VAR,
            card: 1,
            weight: 0.0,
            children: Vec::new(),
        }
    }

    /// The singleton one terminal value.
    pub fn one() -> Self {
        MetaNode {
            var: ONE_VAR,
            card: 1,
            weight: 1.0,
            children: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.var.0 < 0
    }

    /// Cardinality-1 anchor node (not a terminal).
    pub fn is_dummy(&self) -> bool {
        self.card == 1 && !self.is_terminal()
    }
}

impl PartialEq for MetaNode {
    fn eq(&self, that: &Self) -> bool {
        self.var == that.var
            && self.card == that.card
            && self.weight.to_bits() == that.weight.to_bits()
            && self.children == that.children
    }
}

impl Eq for MetaNode {}

impl Hash for MetaNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.var.hash(state);
        self.card.hash(state);
        self.weight.to_bits().hash(state);
        self.children.hash(state);
    }
}

/// Append a meta child, absorbing the one terminal: a one is only kept as
/// the sole element of a child list.
pub(crate) fn push_child(children: &mut Vec<MetaId>, id: MetaId) {
    if id == ONE {
        if children.is_empty() {
            children.push(ONE);
        }
        return;
    }
    if children.last() == Some(&ONE) {
        children.pop();
    }
    children.push(id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_agrees_with_tolerance() {
        let a: f64 = 0.1 + 0.2;
        let b: f64 = 0.3;
        assert_ne!(a.to_bits(), b.to_bits());
        assert_eq!(quantize(a).to_bits(), quantize(b).to_bits());
        assert_eq!(quantize(-0.0).to_bits(), 0.0f64.to_bits());
        assert_eq!(quantize(0.644), 0.644);
    }

    #[test]
    fn structural_equality_ignores_noise() {
        let a = MetaNode::new(Var(3), 2, vec![AndNode::new(0.1 + 0.2, vec![ONE])], 1.0);
        let b = MetaNode::new(Var(3), 2, vec![AndNode::new(0.3, vec![ONE])], 1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn one_absorption() {
        let mut ch = Vec::new();
        push_child(&mut ch, ONE);
        assert_eq!(ch, vec![ONE]);
        push_child(&mut ch, MetaId(7));
        assert_eq!(ch, vec![MetaId(7)]);
        push_child(&mut ch, ONE);
        assert_eq!(ch, vec![MetaId(7)]);
    }
}
