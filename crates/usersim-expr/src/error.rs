use thiserror::Error;

use crate::value::Sort;

/// Errors raised while compiling or sort-checking a formula.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("Syntax error in `{formula}` at {line}:{column}: {message}")]
    Parse {
        formula: String,
        message: String,
        line: usize,
        column: usize,
    },

    #[error("{call}() takes {expected} argument(s), got {found}")]
    Arity {
        call: String,
        expected: usize,
        found: usize,
    },

    #[error("Sort mismatch in `{expr}`: expected {expected}, found {found}")]
    Sort {
        expr: String,
        expected: Sort,
        found: Sort,
    },

    #[error("Invalid numeric literal: {0}")]
    Literal(String),
}

pub type Result<T> = std::result::Result<T, ExprError>;
