//! Boundary parsers for the UAI problem, ordering and evidence files.

use std::fmt;

pub mod order;
pub mod uai;

#[derive(Debug)]
pub enum ParseError {
    Io(std::io::Error),
    /// The file ended while more tokens were expected.
    UnexpectedEof,
    /// A token could not be parsed as the expected kind of number.
    InvalidToken(String),
    /// A factor table's declared size disagrees with its scope.
    InconsistentTable {
        factor: usize,
        expected: u64,
        found: u64,
    },
    /// A factor references a variable outside the declared range.
    UnknownVariable(i32),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Io(e) => write!(f, "cannot read file: {}", e),
            ParseError::UnexpectedEof => write!(f, "unexpected end of file"),
            ParseError::InvalidToken(t) => write!(f, "invalid token: {:?}", t),
            ParseError::InconsistentTable {
                factor,
                expected,
                found,
            } => write!(
                f,
                "table {} declares {} entries, scope has cardinality {}",
                factor, found, expected
            ),
            ParseError::UnknownVariable(v) => write!(f, "unknown variable {}", v),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Whitespace token stream over a file's contents.
pub(crate) struct Tokens<'a> {
    it: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    pub fn new(content: &'a str) -> Self {
        Tokens {
            it: content.split_whitespace(),
        }
    }

    pub fn next_str(&mut self) -> Result<&'a str, ParseError> {
        self.it.next().ok_or(ParseError::UnexpectedEof)
    }

    pub fn next_usize(&mut self) -> Result<usize, ParseError> {
        let t = self.next_str()?;
        t.parse().map_err(|_| ParseError::InvalidToken(t.into()))
    }

    pub fn next_u32(&mut self) -> Result<u32, ParseError> {
        let t = self.next_str()?;
        t.parse().map_err(|_| ParseError::InvalidToken(t.into()))
    }

    pub fn next_i32(&mut self) -> Result<i32, ParseError> {
        let t = self.next_str()?;
        t.parse().map_err(|_| ParseError::InvalidToken(t.into()))
    }

    pub fn next_f64(&mut self) -> Result<f64, ParseError> {
        let t = self.next_str()?;
        t.parse().map_err(|_| ParseError::InvalidToken(t.into()))
    }
}
