//! Elimination-ordering and evidence file parsers.
//!
//! Both formats skip their first line (a free-form title), then give a
//! count followed by that many entries.

use std::fs;
use std::path::Path;

use crate::input::{ParseError, Tokens};
use crate::model::scope::Var;

/// Parse an elimination ordering. The file lists variables in elimination
/// order (first listed, first eliminated); the returned vector is
/// root-first, so the last entry is eliminated first.
pub fn parse_order(path: impl AsRef<Path>) -> Result<Vec<Var>, ParseError> {
    let content = fs::read_to_string(path).map_err(ParseError::Io)?;
    let body = skip_first_line(&content);
    let mut tok = Tokens::new(body);

    let n = tok.next_usize()?;
    let mut ordering = Vec::with_capacity(n);
    for _ in 0..n {
        ordering.push(Var(tok.next_i32()?));
    }
    ordering.reverse();
    Ok(ordering)
}

/// Parse evidence pairs `(variable, value)`.
pub fn parse_evidence(path: impl AsRef<Path>) -> Result<Vec<(Var, u32)>, ParseError> {
    let content = fs::read_to_string(path).map_err(ParseError::Io)?;
    let body = skip_first_line(&content);
    let mut tok = Tokens::new(body);

    let n = tok.next_usize()?;
    let mut evidence = Vec::with_capacity(n);
    for _ in 0..n {
        let var = Var(tok.next_i32()?);
        let val = tok.next_u32()?;
        evidence.push((var, val));
    }
    Ok(evidence)
}

fn skip_first_line(content: &str) -> &str {
    match content.find('\n') {
        Some(i) => &content[i + 1..],
        None => "",
    }
}
