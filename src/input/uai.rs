//! UAI factor-network parser.
//!
//! Format: a type token; the variable count; one cardinality per
//! variable; the factor count; per factor its scope size and variable
//! ids; then per factor its table size and that many doubles, row-major
//! under the declared scope ordering (the last declared variable changes
//! fastest).

use std::fs;
use std::path::Path;

use crate::input::{ParseError, Tokens};
use crate::model::scope::{Scope, Var};
use crate::model::table::TableFunction;

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub num_vars: usize,
    pub domains: Vec<u32>,
    pub functions: Vec<TableFunction>,
    pub complete_scope: Scope,
}

impl Model {
    pub fn parse_uai(path: impl AsRef<Path>) -> Result<Model, ParseError> {
        let content = fs::read_to_string(path).map_err(ParseError::Io)?;
        let mut tok = Tokens::new(&content);

        // Type token (MARKOV/BAYES); nothing downstream depends on it.
        let _network_type = tok.next_str()?;

        let num_vars = tok.next_usize()?;
        let mut domains = Vec::with_capacity(num_vars);
        for _ in 0..num_vars {
            domains.push(tok.next_u32()?);
        }

        let num_functions = tok.next_usize()?;
        let mut scopes = Vec::with_capacity(num_functions);
        let mut complete_scope = Scope::new();
        for _ in 0..num_functions {
            let scope_size = tok.next_usize()?;
            let mut scope = Scope::new();
            for _ in 0..scope_size {
                let v = tok.next_i32()?;
                if v < 0 || v as usize >= num_vars {
                    return Err(ParseError::UnknownVariable(v));
                }
                scope.add_var(Var(v), domains[v as usize]);
            }
            complete_scope = complete_scope
                .union(&scope)
                .expect("cardinalities come from one domain list");
            scopes.push(scope);
        }

        let mut functions = Vec::with_capacity(num_functions);
        for (i, scope) in scopes.into_iter().enumerate() {
            let table_size = tok.next_usize()?;
            if table_size as u64 != scope.card() {
                return Err(ParseError::InconsistentTable {
                    factor: i,
                    expected: scope.card(),
                    found: table_size as u64,
                });
            }
            let mut values = Vec::with_capacity(table_size);
            for _ in 0..table_size {
                values.push(tok.next_f64()?);
            }
            functions.push(TableFunction::with_values(scope, values));
        }

        Ok(Model {
            num_vars,
            domains,
            functions,
            complete_scope,
        })
    }

    pub fn scopes(&self) -> Vec<Scope> {
        self.functions.iter().map(|f| f.scope().clone()).collect()
    }

    /// Re-sort every factor scope (and its table) to follow the global
    /// root-first ordering.
    pub fn set_ordering(&mut self, ordering: &[Var]) {
        for f in self.functions.iter_mut() {
            f.set_ordering(ordering);
        }
        self.complete_scope.set_ordering(ordering);
    }
}
