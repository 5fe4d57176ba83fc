//! # usersim Expression Algebra
//!
//! Formulas that describe what a persona requires of an application's
//! observable behaviour, and the machinery to evaluate them against measured
//! facts.
//!
//! ## Components
//!
//! | Module | Provides |
//! |--------|----------|
//! | `number` | exact rationals over `i128` |
//! | `value` | fact values, evaluation values, sorts |
//! | `env` | the grounded fact environment with its sentinel |
//! | `expr` | expression trees, evaluation, canonical rendering |
//! | `parser` | the text formula syntax |
//! | `solver` | the [`Solver`] interface |
//! | `search` | [`BoundarySearch`], a bounded model finder |
//! | `tokens` | identifier scanning over rendered formulas |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use usersim_expr::{parse_formula, FactEnv};
//!
//! let rule = parse_formula("Implies(p99_ms >= 0, p99_ms <= 500)")?;
//! let env = FactEnv::new().with_fact("p99_ms", 740);
//! assert!(!rule.holds(&env));
//! assert!(rule.antecedent().unwrap().holds(&env));
//! ```
//!
//! ## Notes
//!
//! - Evaluation never panics and never consults anything but the environment
//! - Unobserved facts read as the sentinel (default `-1`) or as `false`
//! - Comparisons are exact; there is no float tolerance anywhere

mod env;
mod error;
mod expr;
mod number;
mod parser;
mod search;
mod solver;
mod value;

pub mod tokens;

pub use env::{sanitize_fact_name, FactEnv, DEFAULT_SENTINEL};
pub use error::{ExprError, Result};
pub use expr::{and, implies, ite, named, not, or, ArithOp, CmpOp, Expr, Node};
pub use number::Number;
pub use parser::parse_formula;
pub use search::{BoundarySearch, DEFAULT_SEARCH_BUDGET};
pub use solver::{Assignment, GroundSolver, SearchOutcome, Solver};
pub use value::{FactValue, Sort, Value};
