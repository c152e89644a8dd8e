//! Ordered variable scopes and (partial) assignments over them.
//!
//! A [Scope] is an ordered list of discrete variables with their domain
//! sizes. The ordering is significant: it defines the linearization of
//! tuples, with the first variable contributing the most significant digit
//! and the last variable changing fastest under [Assignment::iterate].

use std::fmt;

use num_bigint::BigUint;
use num_traits::One;

/// Variable number. Special values below zero are reserved for the
/// diagram terminals and never appear inside a scope.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(pub i32);

/// Sentinel for an unset assignment value.
pub const ERROR_VAL: i32 = -1;

/// Two scopes disagree on the domain size of a shared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardinalityError {
    pub var: Var,
    pub left: u32,
    pub right: u32,
}

impl fmt::Display for CardinalityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "inconsistent cardinality for variable {}: {} vs {}",
            self.var.0, self.left, self.right
        )
    }
}

impl std::error::Error for CardinalityError {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    /// Variables in ordering position, each with its cardinality.
    vars: Vec<(Var, u32)>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    /// Add a variable if it does not already exist
    pub fn add_var(&mut self, var: Var, card: u32) -> bool {
        assert!(card >= 1, "variable {} with empty domain", var.0);
        if self.var_exists(var) {
            return false;
        }
        self.vars.push((var, card));
        true
    }

    /// Remove the variable
    pub fn remove_var(&mut self, var: Var) -> bool {
        match self.position(var) {
            Some(i) => {
                self.vars.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    pub fn var_exists(&self, var: Var) -> bool {
        self.position(var).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    fn position(&self, var: Var) -> Option<usize> {
        self.vars.iter().position(|&(v, _)| v == var)
    }

    /// Cardinality of a single variable. Panics if the variable is not in
    /// the scope; see [Scope::try_card_of] for the checked variant.
    pub fn card_of(&self, var: Var) -> u32 {
        self.try_card_of(var)
            .unwrap_or_else(|| panic!("variable {} not in scope", var.0))
    }

    pub fn try_card_of(&self, var: Var) -> Option<u32> {
        self.position(var).map(|i| self.vars[i].1)
    }

    /// Cardinality of the whole scope (product of domain sizes). Panics on
    /// u64 overflow; [Scope::card_exact] never does.
    pub fn card(&self) -> u64 {
        self.vars.iter().fold(1u64, |acc, &(_, c)| {
            acc.checked_mul(c as u64)
                .expect("scope cardinality overflows u64")
        })
    }

    pub fn card_exact(&self) -> BigUint {
        self.vars
            .iter()
            .fold(BigUint::one(), |acc, &(_, c)| acc * BigUint::from(c))
    }

    pub fn log_card(&self) -> f64 {
        self.vars.iter().map(|&(_, c)| (c as f64).ln()).sum()
    }

    /// Ordering positions with cardinalities, most significant first.
    pub fn ordering(&self) -> &[(Var, u32)] {
        &self.vars
    }

    pub fn vars(&self) -> impl Iterator<Item = Var> + Clone + '_ {
        self.vars.iter().map(|&(v, _)| v)
    }

    /// Check whether another scope has consistent cardinalities to this scope
    pub fn has_consistent_card(&self, rhs: &Scope) -> bool {
        self.check_consistent_card(rhs).is_ok()
    }

    fn check_consistent_card(&self, rhs: &Scope) -> Result<(), CardinalityError> {
        for &(v, c) in &self.vars {
            if let Some(rc) = rhs.try_card_of(v) {
                if rc != c {
                    return Err(CardinalityError {
                        var: v,
                        left: c,
                        right: rc,
                    });
                }
            }
        }
        Ok(())
    }

    /// Union: left operand's variables first, right-only variables appended
    /// in their original order.
    pub fn union(&self, rhs: &Scope) -> Result<Scope, CardinalityError> {
        self.check_consistent_card(rhs)?;
        let mut out = self.clone();
        for &(v, c) in &rhs.vars {
            out.add_var(v, c);
        }
        Ok(out)
    }

    pub fn intersect(&self, rhs: &Scope) -> Result<Scope, CardinalityError> {
        self.check_consistent_card(rhs)?;
        Ok(Scope {
            vars: self
                .vars
                .iter()
                .filter(|&&(v, _)| rhs.var_exists(v))
                .copied()
                .collect(),
        })
    }

    pub fn difference(&self, rhs: &Scope) -> Result<Scope, CardinalityError> {
        self.check_consistent_card(rhs)?;
        Ok(Scope {
            vars: self
                .vars
                .iter()
                .filter(|&&(v, _)| !rhs.var_exists(v))
                .copied()
                .collect(),
        })
    }

    /// Reorder the scope to follow the relative order of `global`.
    /// Variables absent from `global` keep their current relative order at
    /// the end.
    pub fn set_ordering(&mut self, global: &[Var]) {
        let key = |v: Var| {
            global
                .iter()
                .position(|&g| g == v)
                .unwrap_or(global.len())
        };
        self.vars.sort_by_key(|&(v, _)| key(v));
    }
}

/// A scope plus one chosen value per variable ([ERROR_VAL] when unset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    scope: Scope,
    vals: Vec<i32>,
}

impl Assignment {
    pub fn new(scope: &Scope) -> Self {
        Assignment {
            scope: scope.clone(),
            vals: vec![ERROR_VAL; scope.num_vars()],
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn num_vars(&self) -> usize {
        self.scope.num_vars()
    }

    pub fn card(&self) -> u64 {
        self.scope.card()
    }

    pub fn add_var(&mut self, var: Var, card: u32) -> bool {
        if self.scope.add_var(var, card) {
            self.vals.push(ERROR_VAL);
            true
        } else {
            false
        }
    }

    pub fn remove_var(&mut self, var: Var) -> bool {
        match self.scope.position(var) {
            Some(i) => {
                self.scope.vars.remove(i);
                self.vals.remove(i);
                true
            }
            None => false,
        }
    }

    /// Set a variable's value. Returns false (without side effects) if the
    /// variable does not exist or the value is outside its domain.
    pub fn set_val(&mut self, var: Var, val: u32) -> bool {
        match self.scope.position(var) {
            Some(i) if val < self.scope.vars[i].1 => {
                self.vals[i] = val as i32;
                true
            }
            _ => false,
        }
    }

    /// Set all variables to the specified value.
    pub fn set_all(&mut self, val: u32) {
        for (i, &(_, card)) in self.scope.vars.iter().enumerate() {
            debug_assert!(val < card);
            self.vals[i] = val as i32;
        }
    }

    pub fn unset_val(&mut self, var: Var) -> bool {
        match self.scope.position(var) {
            Some(i) => {
                self.vals[i] = ERROR_VAL;
                true
            }
            None => false,
        }
    }

    pub fn unset_all(&mut self) {
        for v in self.vals.iter_mut() {
            *v = ERROR_VAL;
        }
    }

    /// Copy the values of all shared variables from `other`.
    pub fn set_assign(&mut self, other: &Assignment) {
        for (i, &(v, _)) in self.scope.vars.iter().enumerate() {
            if let Some(val) = other.val_of(v) {
                self.vals[i] = val as i32;
            }
        }
    }

    pub fn val_of(&self, var: Var) -> Option<u32> {
        let i = self.scope.position(var)?;
        let v = self.vals[i];
        if v == ERROR_VAL {
            None
        } else {
            Some(v as u32)
        }
    }

    pub fn is_assigned(&self, var: Var) -> bool {
        self.val_of(var).is_some()
    }

    /// Linearization under the scope's own ordering: the first variable is
    /// the most significant digit. None if any variable is unset.
    pub fn index(&self) -> Option<usize> {
        let mut idx = 0usize;
        for (i, &(_, card)) in self.scope.vars.iter().enumerate() {
            let v = self.vals[i];
            if v == ERROR_VAL {
                return None;
            }
            idx = idx * card as usize + v as usize;
        }
        Some(idx)
    }

    /// Linearization under an arbitrary ordering over the same variables.
    pub fn index_under(&self, order: &[Var]) -> Option<usize> {
        let mut idx = 0usize;
        for &v in order {
            let card = self.scope.try_card_of(v)?;
            idx = idx * card as usize + self.val_of(v)? as usize;
        }
        Some(idx)
    }

    /// Advance the tuple, stepping the last variable of the ordering
    /// fastest. Returns false when wrapping past the last tuple or when an
    /// unset value is encountered.
    pub fn iterate(&mut self) -> bool {
        for i in (0..self.vals.len()).rev() {
            let card = self.scope.vars[i].1 as i32;
            if self.vals[i] == ERROR_VAL {
                return false;
            }
            if self.vals[i] + 1 < card {
                self.vals[i] += 1;
                return true;
            }
            self.vals[i] = 0;
        }
        false
    }

    /// Reorder the underlying scope, keeping values attached to their
    /// variables.
    pub fn set_ordering(&mut self, global: &[Var]) {
        let mut pairs: Vec<((Var, u32), i32)> = self
            .scope
            .vars
            .iter()
            .copied()
            .zip(self.vals.iter().copied())
            .collect();
        let key = |v: Var| {
            global
                .iter()
                .position(|&g| g == v)
                .unwrap_or(global.len())
        };
        pairs.sort_by_key(|&((v, _), _)| key(v));
        self.scope.vars = pairs.iter().map(|&(vc, _)| vc).collect();
        self.vals = pairs.iter().map(|&(_, val)| val).collect();
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, &(v, _)) in self.scope.vars.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            if self.vals[i] == ERROR_VAL {
                write!(f, "x{}=?", v.0)?;
            } else {
                write!(f, "x{}={}", v.0, self.vals[i])?;
            }
        }
        Ok(())
    }
}
