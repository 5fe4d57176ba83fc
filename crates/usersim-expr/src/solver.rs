//! Solver interface.
//!
//! Every solver can evaluate a grounded expression. Searching for an
//! assignment that would make a failing expression true is optional: a
//! solver that cannot do it answers [`SearchOutcome::Unsupported`] and the
//! caller simply omits its hint.

use std::collections::BTreeMap;

use crate::env::FactEnv;
use crate::expr::Expr;
use crate::value::{FactValue, Value};

/// Variable name to proposed value.
pub type Assignment = BTreeMap<String, FactValue>;

/// Result of a model search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// These values, layered over the environment, make the expression true.
    /// Only variables whose value changes are listed.
    Satisfiable(Assignment),
    /// No assignment of the referenced variables can satisfy the expression.
    Unsatisfiable,
    /// The search gave up without deciding.
    Inconclusive(String),
    /// This solver does not search.
    Unsupported,
}

impl SearchOutcome {
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            SearchOutcome::Satisfiable(assignment) => Some(assignment),
            _ => None,
        }
    }
}

/// Abstract solver interface.
pub trait Solver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Evaluates a grounded expression.
    fn evaluate(&self, expr: &Expr, env: &FactEnv) -> Value {
        expr.eval(env)
    }

    /// Whether [`Solver::find_satisfying_assignment`] does anything.
    fn supports_search(&self) -> bool {
        false
    }

    /// Searches for values of the variables `expr` references that make it
    /// true, starting from the values in `env`.
    fn find_satisfying_assignment(&self, _expr: &Expr, _env: &FactEnv) -> SearchOutcome {
        SearchOutcome::Unsupported
    }
}

/// Evaluation only.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroundSolver;

impl Solver for GroundSolver {
    fn name(&self) -> &str {
        "ground"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_solver_evaluates_without_search() {
        let solver = GroundSolver;
        let e = Expr::var("x").gt(1);
        let env = FactEnv::new().with_fact("x", 0);
        assert_eq!(solver.evaluate(&e, &env), Value::Bool(false));
        assert!(!solver.supports_search());
        assert_eq!(
            solver.find_satisfying_assignment(&e, &env),
            SearchOutcome::Unsupported
        );
    }
}
